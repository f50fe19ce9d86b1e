//! Configuration types for `bnd-com.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::source::IUNKNOWN;

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    /// Additional directories to search when resolving declaration file
    /// paths.  Each entry is tried in order after `base_dir` (the TOML
    /// file's parent directory); relative entries are joined onto it.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    /// Native name → type expression, e.g. `D3D11_RECT = "RECT"`.
    #[serde(default)]
    pub type_aliases: BTreeMap<String, String>,
    /// Declaration files, loaded in order.
    #[serde(default)]
    pub source: Vec<SourceConfig>,
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Model name written into the manifest.
    pub name: String,
    /// Output file path (e.g. `Direct3D11.model.toml`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("output.model.toml")
}

/// Name normalization settings.
#[derive(Debug, Default, Deserialize)]
pub struct NamingConfig {
    /// Prefixes stripped from element names (`ID3D11`, `D3D11_`, ...).
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Hungarian prefixes stripped from parameter names (`pp`, `p`, ...).
    #[serde(default)]
    pub parameter_prefixes: Vec<String>,
    /// Upper-case segments kept verbatim (`DXGI`, `GUID`, ...).
    #[serde(default)]
    pub acronyms: Vec<String>,
    /// Display names escaped with a trailing `_`.
    #[serde(default)]
    pub reserved_words: Vec<String>,
}

/// Object model settings.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Root of the reference-counted interface hierarchy.
    #[serde(default = "default_root_interface")]
    pub root_interface: String,
    /// Declare the root interface and its three methods automatically.
    #[serde(default = "default_true")]
    pub declare_root: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            root_interface: default_root_interface(),
            declare_root: true,
        }
    }
}

fn default_root_interface() -> String {
    IUNKNOWN.to_string()
}

fn default_true() -> bool {
    true
}

/// A single declaration file.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
}

/// Resolve a declaration file path by searching `base_dir` first, then each
/// `include_paths` entry (relative entries are taken from `base_dir` too).
/// Absolute paths are returned as-is.  If the file is not found anywhere,
/// falls back to `base_dir.join(path)` so that the caller reports the error
/// against the expected location.
pub fn resolve_source(path: &Path, base_dir: &Path, include_paths: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = base_dir.join(path);
    if candidate.exists() {
        return candidate;
    }
    for inc in include_paths {
        let candidate = base_dir.join(inc).join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    base_dir.join(path)
}

/// Load and parse a `bnd-com.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
