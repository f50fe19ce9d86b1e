//! Resolution: source model → fully resolved, read-only model.
//!
//! Runs once, after every declaration has been constructed. Each native type
//! reference is looked up in the complete type map, every interface gets its
//! final vtable layout, and every interface-typed parameter gets the
//! ownership the emitter needs for AddRef/Release. All problems found are
//! reported together.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ModelError, Result};
use crate::model::*;
use crate::source::{ModelParts, SourceModel};
use crate::types::{Guid, NativeType, Primitive, TypeKind, TypeMap};

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Resolved model types
// ---------------------------------------------------------------------------

/// A native type with every name looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedType {
    Primitive {
        primitive: Primitive,
    },
    Named {
        native: String,
        nice_name: String,
        type_kind: TypeKind,
    },
    Ptr {
        pointee: Box<ResolvedType>,
        is_const: bool,
    },
    Array {
        element: Box<ResolvedType>,
        len: usize,
    },
}

impl ResolvedType {
    /// Number of pointer levels and the innermost non-pointer type.
    pub fn peel_pointers(&self) -> (usize, &ResolvedType) {
        let mut depth = 0;
        let mut ty = self;
        while let ResolvedType::Ptr { pointee, .. } = ty {
            depth += 1;
            ty = pointee;
        }
        (depth, ty)
    }

    fn is_interface(&self) -> bool {
        matches!(
            self,
            ResolvedType::Named {
                type_kind: TypeKind::Interface,
                ..
            }
        )
    }
}

/// How a value crosses the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marshal {
    /// Copied by value (scalars, enums, structs).
    Value,
    /// Raw pointer, no lifetime management.
    Pointer,
    /// A single interface reference.
    Interface { ownership: Ownership },
    /// A caller-provided array of interface references (`I**` in-param).
    InterfaceArray { ownership: Ownership },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParam {
    pub name: String,
    pub nice_name: String,
    pub ty: ResolvedType,
    pub direction: Direction,
    pub optional: bool,
    pub marshal: Marshal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMethod {
    pub name: String,
    pub nice_name: String,
    /// Final vtable slot, counting inherited methods.
    pub slot: u32,
    pub call_conv: CallConv,
    pub return_type: ResolvedType,
    pub return_marshal: Marshal,
    pub params: Vec<ResolvedParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedInterface {
    pub name: String,
    pub nice_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_nice_name: Option<String>,
    /// Base chain ends at the root interface: instances are AddRef/Release managed.
    pub ref_counted: bool,
    /// Slots taken by the base chain; the first own method sits here.
    pub inherited_methods: u32,
    pub methods: Vec<ResolvedMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub name: String,
    pub nice_name: String,
    pub ty: ResolvedType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStruct {
    pub name: String,
    pub nice_name: String,
    pub fields: Vec<ResolvedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnumValue {
    pub name: String,
    pub nice_name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnum {
    pub name: String,
    pub nice_name: String,
    pub underlying: Primitive,
    pub flags: bool,
    pub values: Vec<ResolvedEnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAccessPoint {
    pub name: String,
    pub nice_name: String,
    pub library: String,
    pub entry_point: String,
    pub call_conv: CallConv,
    pub return_type: ResolvedType,
    pub return_marshal: Marshal,
    pub params: Vec<ResolvedParam>,
}

/// A declared type, looked up by native name.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedElement<'a> {
    Interface(&'a ResolvedInterface),
    Struct(&'a ResolvedStruct),
    Enum(&'a ResolvedEnum),
}

impl ResolvedElement<'_> {
    pub fn name(&self) -> &str {
        match self {
            ResolvedElement::Interface(i) => &i.name,
            ResolvedElement::Struct(s) => &s.name,
            ResolvedElement::Enum(e) => &e.name,
        }
    }

    pub fn nice_name(&self) -> &str {
        match self {
            ResolvedElement::Interface(i) => &i.nice_name,
            ResolvedElement::Struct(s) => &s.nice_name,
            ResolvedElement::Enum(e) => &e.nice_name,
        }
    }
}

/// The finished model handed to emitters. Immutable; safe to share across
/// threads.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    type_map: TypeMap,
    root_interface: String,
    interfaces: Vec<ResolvedInterface>,
    structs: Vec<ResolvedStruct>,
    enums: Vec<ResolvedEnum>,
    access_points: Vec<ResolvedAccessPoint>,
    index: HashMap<String, (TypeKind, usize)>,
}

impl ResolvedModel {
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn root_interface(&self) -> &str {
        &self.root_interface
    }

    pub fn interfaces(&self) -> &[ResolvedInterface] {
        &self.interfaces
    }

    pub fn structs(&self) -> &[ResolvedStruct] {
        &self.structs
    }

    pub fn enums(&self) -> &[ResolvedEnum] {
        &self.enums
    }

    pub fn access_points(&self) -> &[ResolvedAccessPoint] {
        &self.access_points
    }

    pub fn element(&self, native: &str) -> Option<ResolvedElement<'_>> {
        let &(kind, idx) = self.index.get(native)?;
        Some(match kind {
            TypeKind::Interface => ResolvedElement::Interface(&self.interfaces[idx]),
            TypeKind::Struct => ResolvedElement::Struct(&self.structs[idx]),
            TypeKind::Enum => ResolvedElement::Enum(&self.enums[idx]),
        })
    }

    pub fn interface(&self, native: &str) -> Option<&ResolvedInterface> {
        match self.element(native)? {
            ResolvedElement::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn structure(&self, native: &str) -> Option<&ResolvedStruct> {
        match self.element(native)? {
            ResolvedElement::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn enumeration(&self, native: &str) -> Option<&ResolvedEnum> {
        match self.element(native)? {
            ResolvedElement::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn access_point(&self, native: &str) -> Option<&ResolvedAccessPoint> {
        self.access_points.iter().find(|a| a.name == native)
    }

    /// The complete vtable of an interface, root methods first.
    pub fn vtable(&self, native: &str) -> Option<Vec<&ResolvedMethod>> {
        let mut chain = Vec::new();
        let mut current = Some(self.interface(native)?);
        while let Some(iface) = current {
            chain.push(iface);
            current = iface.base.as_deref().and_then(|b| self.interface(b));
        }
        Some(
            chain
                .iter()
                .rev()
                .flat_map(|iface| iface.methods.iter())
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

struct Resolver<'m> {
    type_map: &'m TypeMap,
    aliases: &'m BTreeMap<String, NativeType>,
    root_interface: &'m str,
    interfaces: &'m [Interface],
    interface_index: HashMap<&'m str, usize>,
}

pub(crate) fn resolve(model: SourceModel) -> Result<ResolvedModel> {
    let ModelParts {
        type_map,
        aliases,
        root_interface,
        interfaces,
        structs,
        enums,
        access_points,
    } = model.into_parts();

    let resolver = Resolver {
        type_map: &type_map,
        aliases: &aliases,
        root_interface: &root_interface,
        interfaces: &interfaces,
        interface_index: interfaces
            .iter()
            .enumerate()
            .map(|(i, iface)| (iface.name(), i))
            .collect(),
    };

    let mut errors = Vec::new();
    let mut out_interfaces = Vec::with_capacity(interfaces.len());
    for iface in &interfaces {
        match resolver.interface(iface) {
            Ok(r) => out_interfaces.push(r),
            Err(e) => errors.extend(e),
        }
    }
    let mut out_structs = Vec::with_capacity(structs.len());
    for s in &structs {
        match resolver.structure(s) {
            Ok(r) => out_structs.push(r),
            Err(e) => errors.extend(e),
        }
    }
    let mut out_access_points = Vec::with_capacity(access_points.len());
    for ap in &access_points {
        match resolver.access_point(ap) {
            Ok(r) => out_access_points.push(r),
            Err(e) => errors.extend(e),
        }
    }
    let out_enums: Vec<ResolvedEnum> = enums.iter().map(resolve_enum).collect();

    if let Some(err) = ModelError::collect(errors) {
        return Err(err);
    }

    let mut index = HashMap::new();
    for (i, r) in out_interfaces.iter().enumerate() {
        index.insert(r.name.clone(), (TypeKind::Interface, i));
    }
    for (i, r) in out_structs.iter().enumerate() {
        index.insert(r.name.clone(), (TypeKind::Struct, i));
    }
    for (i, r) in out_enums.iter().enumerate() {
        index.insert(r.name.clone(), (TypeKind::Enum, i));
    }

    info!(
        interfaces = out_interfaces.len(),
        structs = out_structs.len(),
        enums = out_enums.len(),
        access_points = out_access_points.len(),
        types = type_map.len(),
        "model resolved"
    );

    Ok(ResolvedModel {
        type_map,
        root_interface,
        interfaces: out_interfaces,
        structs: out_structs,
        enums: out_enums,
        access_points: out_access_points,
        index,
    })
}

impl Resolver<'_> {
    fn interface(&self, iface: &Interface) -> std::result::Result<ResolvedInterface, Vec<ModelError>> {
        let (inherited, ref_counted) = self.walk_base_chain(iface).map_err(|e| vec![e])?;
        let base_nice_name = iface
            .base()
            .and_then(|b| self.type_map.get(b))
            .map(|e| e.nice_name.clone());

        let mut errors = Vec::new();
        let mut methods = Vec::with_capacity(iface.methods().len());
        for (i, method) in iface.methods().iter().enumerate() {
            let slot = inherited + i as u32;
            if let Some(declared) = method.declared_slot()
                && declared != slot
            {
                let holder = declared
                    .checked_sub(inherited)
                    .and_then(|j| iface.methods().get(j as usize))
                    .filter(|h| h.name() != method.name());
                errors.push(ModelError::VtableSlotConflict {
                    interface: iface.name().to_string(),
                    method: method.name().to_string(),
                    slot: declared,
                    expected: slot,
                    holder: holder.map(|h| h.name().to_string()),
                });
                continue;
            }
            let owner = format!("method `{}::{}`", iface.name(), method.name());
            match self.signature(&owner, method.return_type(), method.return_ownership, method.params()) {
                Ok((return_type, return_marshal, params)) => methods.push(ResolvedMethod {
                    name: method.name().to_string(),
                    nice_name: method.nice_name().to_string(),
                    slot,
                    call_conv: method.call_conv(),
                    return_type,
                    return_marshal,
                    params,
                }),
                Err(e) => errors.extend(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        debug!(
            name = %iface,
            inherited,
            methods = methods.len(),
            ref_counted,
            "resolved interface"
        );
        Ok(ResolvedInterface {
            name: iface.name().to_string(),
            nice_name: iface.nice_name().to_string(),
            guid: iface.guid(),
            base: iface.base().map(str::to_string),
            base_nice_name,
            ref_counted,
            inherited_methods: inherited,
            methods,
        })
    }

    /// Inherited slot count and whether the chain reaches the root interface.
    fn walk_base_chain(&self, iface: &Interface) -> Result<(u32, bool)> {
        let mut inherited = 0u32;
        let mut reaches_root = iface.name() == self.root_interface;
        let mut chain = vec![iface.name().to_string()];
        let mut current = iface;
        while let Some(base) = current.base() {
            if chain.iter().any(|c| c == base) {
                chain.push(base.to_string());
                return Err(ModelError::InheritanceCycle {
                    interface: iface.name().to_string(),
                    chain,
                });
            }
            let entry = self
                .type_map
                .entry(base)
                .map_err(|e| e.referenced_by(format!("base of interface `{}`", current.name())))?;
            let idx = match (entry.kind, self.interface_index.get(base)) {
                (TypeKind::Interface, Some(&idx)) => idx,
                _ => {
                    return Err(ModelError::BaseNotInterface {
                        interface: current.name().to_string(),
                        base: base.to_string(),
                    });
                }
            };
            let base_iface = &self.interfaces[idx];
            inherited += base_iface.methods().len() as u32;
            reaches_root |= base == self.root_interface;
            chain.push(base.to_string());
            current = base_iface;
        }
        Ok((inherited, reaches_root))
    }

    fn structure(&self, s: &Struct) -> std::result::Result<ResolvedStruct, Vec<ModelError>> {
        let mut errors = Vec::new();
        let mut fields = Vec::with_capacity(s.fields().len());
        for field in s.fields() {
            let referrer = format!("field `{}` of struct `{}`", field.name(), s.name());
            let resolved = self.resolve_type(field.ty(), &referrer).and_then(|ty| {
                if ty.is_interface() {
                    Err(ModelError::InterfaceByValue {
                        element: referrer.clone(),
                        name: field.ty().to_string(),
                    })
                } else {
                    Ok(ty)
                }
            });
            match resolved {
                Ok(ty) => fields.push(ResolvedField {
                    name: field.name().to_string(),
                    nice_name: field.nice_name().to_string(),
                    ty,
                }),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ResolvedStruct {
            name: s.name().to_string(),
            nice_name: s.nice_name().to_string(),
            fields,
        })
    }

    fn access_point(
        &self,
        ap: &AccessPoint,
    ) -> std::result::Result<ResolvedAccessPoint, Vec<ModelError>> {
        let owner = format!("access point `{}`", ap.name());
        let (return_type, return_marshal, params) =
            self.signature(&owner, ap.return_type(), None, ap.params())?;
        Ok(ResolvedAccessPoint {
            name: ap.name().to_string(),
            nice_name: ap.nice_name().to_string(),
            library: ap.library().to_string(),
            entry_point: ap.entry_point().to_string(),
            call_conv: ap.call_conv(),
            return_type,
            return_marshal,
            params,
        })
    }

    /// Resolve a return type and parameter list, collecting every error.
    fn signature(
        &self,
        owner: &str,
        return_type: &NativeType,
        return_ownership: Option<Ownership>,
        params: &[Param],
    ) -> std::result::Result<(ResolvedType, Marshal, Vec<ResolvedParam>), Vec<ModelError>> {
        let mut errors = Vec::new();

        let ret_referrer = format!("return type of {owner}");
        let ret = self.resolve_type(return_type, &ret_referrer).and_then(|ty| {
            let marshal = classify(&ty, Direction::Out, true, return_ownership, &ret_referrer)?;
            Ok((ty, marshal))
        });
        let ret = match ret {
            Ok(r) => Some(r),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let mut out = Vec::with_capacity(params.len());
        for p in params {
            let referrer = format!("param `{}` of {owner}", p.name());
            let resolved = self.resolve_type(p.ty(), &referrer).and_then(|ty| {
                let marshal = classify(&ty, p.direction(), false, p.ownership(), &referrer)?;
                Ok((ty, marshal))
            });
            match resolved {
                Ok((ty, marshal)) => out.push(ResolvedParam {
                    name: p.name().to_string(),
                    nice_name: p.nice_name().to_string(),
                    ty,
                    direction: p.direction(),
                    optional: p.is_optional(),
                    marshal,
                }),
                Err(e) => errors.push(e),
            }
        }

        match ret {
            Some((ty, marshal)) if errors.is_empty() => Ok((ty, marshal, out)),
            _ => Err(errors),
        }
    }

    fn resolve_type(&self, ty: &NativeType, referrer: &str) -> Result<ResolvedType> {
        self.resolve_type_at(ty, referrer, 0)
    }

    fn resolve_type_at(&self, ty: &NativeType, referrer: &str, depth: usize) -> Result<ResolvedType> {
        Ok(match ty {
            NativeType::Primitive(p) => ResolvedType::Primitive { primitive: *p },
            NativeType::Named(name) => {
                // Declared types take precedence over aliases.
                if let Some(entry) = self.type_map.get(name) {
                    ResolvedType::Named {
                        native: name.clone(),
                        nice_name: entry.nice_name.clone(),
                        type_kind: entry.kind,
                    }
                } else if let Some(target) = self.aliases.get(name) {
                    if depth >= MAX_ALIAS_DEPTH {
                        return Err(ModelError::InvalidTypeExpression {
                            text: name.clone(),
                            reason: "type alias cycle".into(),
                        });
                    }
                    self.resolve_type_at(target, referrer, depth + 1)?
                } else {
                    return Err(ModelError::UnknownType {
                        name: name.clone(),
                        referenced_by: Some(referrer.to_string()),
                    });
                }
            }
            NativeType::Ptr { pointee, is_const } => ResolvedType::Ptr {
                pointee: Box::new(self.resolve_type_at(pointee, referrer, depth)?),
                is_const: *is_const,
            },
            NativeType::Array { element, len } => ResolvedType::Array {
                element: Box::new(self.resolve_type_at(element, referrer, depth)?),
                len: *len,
            },
        })
    }
}

/// Decide how a parameter or return value crosses the boundary.
///
/// `I*` in-params are borrowed, `I*` returns and `I**` out-params are owned
/// (the callee AddRef'd them), `I**` in-params are borrowed arrays.
fn classify(
    ty: &ResolvedType,
    direction: Direction,
    is_return: bool,
    ownership: Option<Ownership>,
    referrer: &str,
) -> Result<Marshal> {
    let (depth, inner) = ty.peel_pointers();
    let marshal = if inner.is_interface() {
        match depth {
            0 => {
                return Err(ModelError::InterfaceByValue {
                    element: referrer.to_string(),
                    name: match inner {
                        ResolvedType::Named { native, .. } => native.clone(),
                        _ => String::new(),
                    },
                });
            }
            1 if is_return => Marshal::Interface {
                ownership: ownership.unwrap_or(Ownership::Owned),
            },
            1 => Marshal::Interface {
                ownership: ownership.unwrap_or(Ownership::Borrowed),
            },
            2 if direction != Direction::In => Marshal::Interface {
                ownership: ownership.unwrap_or(Ownership::Owned),
            },
            2 => Marshal::InterfaceArray {
                ownership: ownership.unwrap_or(Ownership::Borrowed),
            },
            _ => Marshal::Pointer,
        }
    } else if let (2, ResolvedType::Primitive { primitive: Primitive::Void }, Some(o)) =
        (depth, inner, ownership)
    {
        // `void**` out-params such as QueryInterface's `ppvObject`.
        Marshal::Interface { ownership: o }
    } else {
        if ownership.is_some() {
            warn!(element = referrer, "ownership override ignored on non-interface type");
        }
        if depth > 0 { Marshal::Pointer } else { Marshal::Value }
    };
    Ok(marshal)
}

fn resolve_enum(en: &Enum) -> ResolvedEnum {
    ResolvedEnum {
        name: en.name().to_string(),
        nice_name: en.nice_name().to_string(),
        underlying: en.underlying(),
        flags: en.is_flags(),
        values: en
            .values()
            .iter()
            .map(|v| ResolvedEnumValue {
                name: v.name().to_string(),
                nice_name: v.nice_name().to_string(),
                value: v.value(),
            })
            .collect(),
    }
}
