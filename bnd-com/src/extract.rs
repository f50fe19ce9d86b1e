//! Extraction: declaration files → source model construction calls.
//!
//! A declaration file is TOML with `[[interface]]`, `[[struct]]`, `[[enum]]`
//! and `[[access_point]]` tables. Type references are plain C spellings
//! (`const D3D11_BUFFER_DESC*`) and may point at declarations in any file;
//! they are only checked once the whole model is resolved.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::model::{CallConv, Direction, Ownership};
use crate::source::{AccessPointSpec, EnumSpec, FieldSpec, MethodSpec, ParamSpec, SourceModel};
use crate::types::{Guid, NativeType, Primitive};

/// Root of a declaration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclFile {
    #[serde(default)]
    pub interface: Vec<InterfaceDecl>,
    #[serde(default, rename = "struct")]
    pub structs: Vec<StructDecl>,
    #[serde(default, rename = "enum")]
    pub enums: Vec<EnumDecl>,
    #[serde(default)]
    pub access_point: Vec<AccessPointDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDecl {
    pub name: String,
    pub base: Option<String>,
    pub guid: Option<String>,
    #[serde(default)]
    pub method: Vec<MethodDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDecl {
    pub name: String,
    pub slot: Option<u32>,
    #[serde(default = "default_return")]
    pub returns: String,
    pub return_ownership: Option<Ownership>,
    #[serde(default)]
    pub call_conv: CallConv,
    #[serde(default)]
    pub param: Vec<ParamDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub optional: bool,
    pub ownership: Option<Ownership>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructDecl {
    pub name: String,
    #[serde(default)]
    pub field: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDecl {
    pub name: String,
    pub underlying: Option<String>,
    #[serde(default)]
    pub flags: bool,
    #[serde(default)]
    pub value: Vec<EnumValueDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValueDecl {
    pub name: String,
    pub value: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessPointDecl {
    pub name: String,
    pub library: String,
    pub entry_point: Option<String>,
    #[serde(default)]
    pub call_conv: CallConv,
    #[serde(default = "default_return")]
    pub returns: String,
    #[serde(default)]
    pub param: Vec<ParamDecl>,
}

fn default_return() -> String {
    "HRESULT".to_string()
}

/// Counts of what one declaration file contributed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub interfaces: usize,
    pub methods: usize,
    pub structs: usize,
    pub enums: usize,
    pub access_points: usize,
}

/// Load every `[[source]]` file of the config into `model`, in order.
pub fn extract_sources(model: &mut SourceModel, cfg: &Config, base_dir: &Path) -> Result<()> {
    for source in &cfg.source {
        let path = config::resolve_source(&source.path, base_dir, &cfg.include_paths);
        let decls = load_decl_file(&path)?;
        extract_file(model, decls, &path)
            .with_context(|| format!("building model from {}", path.display()))?;
    }
    Ok(())
}

/// Read and parse one declaration file.
pub fn load_decl_file(path: &Path) -> Result<DeclFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read declaration file {}", path.display()))?;
    parse_decls(&content)
        .with_context(|| format!("failed to parse declaration file {}", path.display()))
}

/// Parse declaration TOML from a string.
pub fn parse_decls(content: &str) -> Result<DeclFile> {
    Ok(toml::from_str(content)?)
}

/// Feed one parsed declaration file into the model.
///
/// Order within a file: enums, structs, interfaces (each followed by its
/// methods), access points. References across files and to later
/// declarations are left for resolution.
pub fn extract_file(model: &mut SourceModel, decls: DeclFile, origin: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    for en in decls.enums {
        let name = en.name.clone();
        let spec = enum_spec(en).with_context(|| format!("enum `{name}`"))?;
        model.new_enum(spec).with_context(|| format!("enum `{name}`"))?;
        stats.enums += 1;
    }

    for s in decls.structs {
        let fields = s
            .field
            .into_iter()
            .map(|f| Ok(FieldSpec::new(f.name, parse_type(&f.ty)?)))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("struct `{}`", s.name))?;
        model
            .new_struct(&s.name, fields)
            .with_context(|| format!("struct `{}`", s.name))?;
        stats.structs += 1;
    }

    for iface in decls.interface {
        let guid = iface
            .guid
            .as_deref()
            .map(str::parse::<Guid>)
            .transpose()
            .with_context(|| format!("interface `{}`", iface.name))?;
        let id = model
            .new_interface(&iface.name, iface.base.as_deref(), guid)
            .with_context(|| format!("interface `{}`", iface.name))?;
        stats.interfaces += 1;
        for m in iface.method {
            let context = format!("method `{}::{}`", iface.name, m.name);
            let spec = method_spec(m).with_context(|| context.clone())?;
            model.new_method(id, spec).with_context(|| context)?;
            stats.methods += 1;
        }
    }

    for ap in decls.access_point {
        let name = ap.name.clone();
        let params = param_specs(ap.param).with_context(|| format!("access point `{name}`"))?;
        let spec = AccessPointSpec {
            name: ap.name,
            library: ap.library,
            entry_point: ap.entry_point,
            call_conv: ap.call_conv,
            return_type: parse_type(&ap.returns).with_context(|| format!("access point `{name}`"))?,
            params,
        };
        model
            .new_access_point(spec)
            .with_context(|| format!("access point `{name}`"))?;
        stats.access_points += 1;
    }

    info!(
        file = %origin.display(),
        interfaces = stats.interfaces,
        methods = stats.methods,
        structs = stats.structs,
        enums = stats.enums,
        access_points = stats.access_points,
        "declaration file extraction complete"
    );
    Ok(stats)
}

fn parse_type(text: &str) -> Result<NativeType> {
    Ok(text.parse::<NativeType>()?)
}

fn method_spec(m: MethodDecl) -> Result<MethodSpec> {
    debug!(method = %m.name, params = m.param.len(), "extracting method");
    Ok(MethodSpec {
        name: m.name,
        slot: m.slot,
        call_conv: m.call_conv,
        return_type: parse_type(&m.returns)?,
        return_ownership: m.return_ownership,
        params: param_specs(m.param)?,
    })
}

fn param_specs(params: Vec<ParamDecl>) -> Result<Vec<ParamSpec>> {
    params
        .into_iter()
        .map(|p| {
            let ty = parse_type(&p.ty).with_context(|| format!("param `{}`", p.name))?;
            Ok(ParamSpec {
                name: p.name,
                ty,
                direction: p.direction,
                optional: p.optional,
                ownership: p.ownership,
            })
        })
        .collect()
}

fn enum_spec(en: EnumDecl) -> Result<EnumSpec> {
    let mut spec = EnumSpec::new(en.name);
    if let Some(text) = en.underlying {
        match parse_type(&text)? {
            NativeType::Primitive(p) if is_integral(p) => spec.underlying = p,
            other => bail!("enum underlying type must be an integer, got `{other}`"),
        }
    }
    if en.flags {
        spec = spec.flags();
    }
    for v in en.value {
        spec = spec.value(v.name, v.value);
    }
    Ok(spec)
}

fn is_integral(p: Primitive) -> bool {
    matches!(
        p,
        Primitive::I8
            | Primitive::U8
            | Primitive::I16
            | Primitive::U16
            | Primitive::I32
            | Primitive::U32
            | Primitive::I64
            | Primitive::U64
    )
}
