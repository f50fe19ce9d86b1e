//! bnd-com — COM-style object model core for binding generators.
//!
//! Collects interface, struct, enum and access point declarations, normalizes
//! their names, resolves every type reference and vtable slot, and writes a
//! model manifest that language backends turn into bindings.
//!
//! # Quick start
//!
//! Generate a manifest from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, loads declaration files, writes the manifest.
//! bnd_com::run(Path::new("bnd-com.toml"), None).unwrap();
//! ```
//!
//! Or build the model in code:
//!
//! ```no_run
//! use bnd_com::naming::NameRules;
//! use bnd_com::source::{MethodSpec, SourceModel};
//!
//! let mut model = SourceModel::new(NameRules::new(["ID3D11", "D3D11_"]));
//! model.declare_root_interface().unwrap();
//! let device = model.new_interface("ID3D11Device", Some("IUnknown"), None).unwrap();
//! model.new_method(device, MethodSpec::new("GetCreationFlags")).unwrap();
//! let resolved = model.resolve().unwrap();
//! assert_eq!(resolved.interface("ID3D11Device").unwrap().methods[0].slot, 3);
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod config;
pub mod emit;
pub mod error;
pub mod extract;
pub mod model;
pub mod naming;
pub mod resolve;
pub mod source;
pub mod types;

pub use error::ModelError;
pub use resolve::ResolvedModel;
pub use source::SourceModel;

/// Run the full pipeline: load config, load declarations, resolve, and write
/// the manifest.
///
/// `config_path` is the path to a `bnd-com.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the manifest was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let bytes = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    std::fs::write(&output_path, &bytes)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(path = %output_path.display(), "wrote model manifest");

    Ok(output_path)
}

/// Generate manifest bytes from a config file without writing to disk.
pub fn generate(config_path: &Path) -> Result<Vec<u8>> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate manifest bytes from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which declaration file paths in
/// the config are resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<Vec<u8>> {
    let model = build_model(cfg, base_dir)?;

    let bytes = emit::emit_manifest(&cfg.output.name, &model)?;

    info!(size = bytes.len(), "generated model manifest");

    Ok(bytes)
}

/// Build and resolve the model described by a config, without emitting.
pub fn build_model(cfg: &config::Config, base_dir: &Path) -> Result<ResolvedModel> {
    info!(
        model = %cfg.output.name,
        sources = cfg.source.len(),
        "loaded configuration"
    );

    let mut model = SourceModel::from_config(cfg).context("applying config to model")?;
    if cfg.model.declare_root {
        model
            .declare_root_interface()
            .with_context(|| format!("declaring root interface `{}`", cfg.model.root_interface))?;
    }

    extract::extract_sources(&mut model, cfg, base_dir)?;

    info!(
        interfaces = model.interfaces().len(),
        structs = model.structs().len(),
        enums = model.enums().len(),
        access_points = model.access_points().len(),
        types = model.type_map().len(),
        "source model complete"
    );

    // Every unresolved reference is reported at once, naming the referrer.
    model.resolve().context("resolving model")
}
