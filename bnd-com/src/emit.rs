//! Emitter: resolved model → model manifest TOML bytes.
//!
//! The manifest is the hand-off format for language backends. It carries the
//! type map plus every resolved element with final vtable slots and
//! marshalling decisions, so a backend never has to repeat resolution.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::resolve::{
    ResolvedAccessPoint, ResolvedEnum, ResolvedInterface, ResolvedModel, ResolvedStruct,
};
use crate::types::TypeMap;

/// Manifest format version written into every file.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    model: Header<'a>,
    types: &'a TypeMap,
    #[serde(rename = "enum")]
    enums: &'a [ResolvedEnum],
    #[serde(rename = "struct")]
    structs: &'a [ResolvedStruct],
    interface: &'a [ResolvedInterface],
    access_point: &'a [ResolvedAccessPoint],
}

#[derive(Debug, Serialize)]
struct Header<'a> {
    name: &'a str,
    version: u32,
    root_interface: &'a str,
}

/// Serialize a resolved model into a manifest.
pub fn emit_manifest(name: &str, model: &ResolvedModel) -> Result<Vec<u8>> {
    for en in model.enums() {
        debug!(name = %en.name, values = en.values.len(), "emitted enum");
    }
    for s in model.structs() {
        debug!(name = %s.name, fields = s.fields.len(), "emitted struct");
    }
    for iface in model.interfaces() {
        debug!(
            name = %iface.name,
            base = iface.base.as_deref().unwrap_or("-"),
            methods = iface.methods.len(),
            first_slot = iface.inherited_methods,
            "emitted interface"
        );
    }
    for ap in model.access_points() {
        debug!(name = %ap.name, library = %ap.library, "emitted access point");
    }

    let manifest = Manifest {
        model: Header {
            name,
            version: MANIFEST_VERSION,
            root_interface: model.root_interface(),
        },
        types: model.type_map(),
        enums: model.enums(),
        structs: model.structs(),
        interface: model.interfaces(),
        access_point: model.access_points(),
    };
    let text = toml::to_string_pretty(&manifest)
        .with_context(|| format!("serializing manifest `{name}`"))?;
    Ok(text.into_bytes())
}
