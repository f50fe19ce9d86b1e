//! Object model elements: the nodes a generation run is made of.
//!
//! Every element kind shares an [`Ident`] (native name plus derived display
//! name). Names are fixed at construction: elements are only ever created by
//! [`SourceModel`](crate::source::SourceModel), which computes the display
//! name once and rejects empty results, so no element can expose a stale or
//! empty nice name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::naming::NameRules;
use crate::types::{Guid, NativeType, Primitive, TypeKind};

/// The closed set of element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Interface,
    Method,
    Parameter,
    Struct,
    Field,
    Enum,
    EnumValue,
    AccessPoint,
}

impl ElementKind {
    /// The type map kind, for element kinds that denote a type.
    pub fn type_kind(self) -> Option<TypeKind> {
        match self {
            ElementKind::Interface => Some(TypeKind::Interface),
            ElementKind::Struct => Some(TypeKind::Struct),
            ElementKind::Enum => Some(TypeKind::Enum),
            _ => None,
        }
    }

    /// Derive the display name for a native name of this kind.
    ///
    /// `parent` is the owning element's native name; enum values use it to
    /// drop the repeated enum prefix (`D3D11_USAGE_DEFAULT` → `Default`).
    pub fn build_nice_name(self, rules: &NameRules, native: &str, parent: Option<&str>) -> String {
        let nice = match self {
            ElementKind::Parameter => rules.parameter_name(native),
            ElementKind::EnumValue => parent
                .and_then(|p| strip_enum_prefix(native, p))
                .map(|rest| rules.pascal_case_from_underscores(rest))
                .unwrap_or_else(|| rules.nice_name(native)),
            _ => rules.nice_name(native),
        };
        rules.escape_reserved(nice)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementKind::Interface => "interface",
            ElementKind::Method => "method",
            ElementKind::Parameter => "parameter",
            ElementKind::Struct => "struct",
            ElementKind::Field => "field",
            ElementKind::Enum => "enum",
            ElementKind::EnumValue => "enum value",
            ElementKind::AccessPoint => "access point",
        })
    }
}

/// `D3D11_USAGE_DEFAULT` under `D3D11_USAGE` → `DEFAULT`. Returns `None` when
/// the value does not repeat the enum name, or when stripping would leave a
/// name that starts with a digit (`D3D_FEATURE_LEVEL_9_1`).
fn strip_enum_prefix<'a>(native: &'a str, enum_name: &str) -> Option<&'a str> {
    let rest = native.strip_prefix(enum_name)?.strip_prefix('_')?;
    match rest.chars().next() {
        Some(c) if !c.is_ascii_digit() => Some(rest),
        _ => None,
    }
}

/// Native name and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    name: String,
    nice_name: String,
}

impl Ident {
    /// Build the identity for a new element, failing on an empty native or
    /// display name.
    pub(crate) fn new(
        kind: ElementKind,
        rules: &NameRules,
        native: &str,
        parent: Option<&str>,
    ) -> Result<Self> {
        let nice_name = kind.build_nice_name(rules, native, parent);
        if native.is_empty() || nice_name.is_empty() {
            return Err(ModelError::EmptyName {
                kind,
                name: native.to_string(),
            });
        }
        Ok(Self {
            name: native.to_string(),
            nice_name,
        })
    }

    /// Same native name, explicit display name. Used when a sibling already
    /// claimed the derived one.
    pub(crate) fn with_nice_name(mut self, nice_name: String) -> Self {
        self.nice_name = nice_name;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nice_name(&self) -> &str {
        &self.nice_name
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Capabilities shared by every element.
pub trait Element {
    fn ident(&self) -> &Ident;
    fn kind(&self) -> ElementKind;

    fn name(&self) -> &str {
        self.ident().name()
    }

    fn nice_name(&self) -> &str {
        self.ident().nice_name()
    }
}

/// Elements that denote an addressable native type and may be registered
/// into the type map.
pub trait TypeElement: Element {
    fn type_kind(&self) -> TypeKind;
}

macro_rules! impl_element {
    ($ty:ty, $kind:expr) => {
        impl Element for $ty {
            fn ident(&self) -> &Ident {
                &self.ident
            }

            fn kind(&self) -> ElementKind {
                $kind
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.ident, f)
            }
        }
    };
    ($ty:ty, $kind:expr, $type_kind:expr) => {
        impl_element!($ty, $kind);

        impl TypeElement for $ty {
            fn type_kind(&self) -> TypeKind {
                $type_kind
            }
        }
    };
}

impl_element!(Interface, ElementKind::Interface, TypeKind::Interface);
impl_element!(Method, ElementKind::Method);
impl_element!(Param, ElementKind::Parameter);
impl_element!(Struct, ElementKind::Struct, TypeKind::Struct);
impl_element!(Field, ElementKind::Field);
impl_element!(Enum, ElementKind::Enum, TypeKind::Enum);
impl_element!(EnumValue, ElementKind::EnumValue);
impl_element!(AccessPoint, ElementKind::AccessPoint);

// ---------------------------------------------------------------------------
// Interop attributes
// ---------------------------------------------------------------------------

/// Calling convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallConv {
    /// Platform default (cdecl on most platforms).
    Cdecl,
    /// stdcall (Windows x86). COM methods use this.
    #[default]
    Stdcall,
    /// Fastcall.
    Fastcall,
}

/// Parameter direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
}

/// Who releases an interface reference crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// The receiver got an AddRef'd reference and must release it exactly once.
    Owned,
    /// The reference is only lent for the duration of the call.
    Borrowed,
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// A COM-style interface.
#[derive(Debug, Clone)]
pub struct Interface {
    pub(crate) ident: Ident,
    pub(crate) guid: Option<Guid>,
    /// Native name of the base interface.
    pub(crate) base: Option<String>,
    pub(crate) methods: Vec<Method>,
}

impl Interface {
    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Own methods in vtable order (inherited methods excluded).
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }
}

/// A vtable method.
#[derive(Debug, Clone)]
pub struct Method {
    pub(crate) ident: Ident,
    /// Slot given in the declaration; `None` means "next one".
    pub(crate) declared_slot: Option<u32>,
    pub(crate) call_conv: CallConv,
    pub(crate) return_type: NativeType,
    pub(crate) return_ownership: Option<Ownership>,
    pub(crate) params: Vec<Param>,
}

impl Method {
    pub fn declared_slot(&self) -> Option<u32> {
        self.declared_slot
    }

    pub fn call_conv(&self) -> CallConv {
        self.call_conv
    }

    pub fn return_type(&self) -> &NativeType {
        &self.return_type
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// A method or access point parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub(crate) ident: Ident,
    pub(crate) ty: NativeType,
    pub(crate) direction: Direction,
    pub(crate) optional: bool,
    /// Explicit override of the derived ownership.
    pub(crate) ownership: Option<Ownership>,
}

impl Param {
    pub fn ty(&self) -> &NativeType {
        &self.ty
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn ownership(&self) -> Option<Ownership> {
        self.ownership
    }
}

/// A native struct.
#[derive(Debug, Clone)]
pub struct Struct {
    pub(crate) ident: Ident,
    pub(crate) fields: Vec<Field>,
}

impl Struct {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// A single struct field.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) ident: Ident,
    pub(crate) ty: NativeType,
}

impl Field {
    pub fn ty(&self) -> &NativeType {
        &self.ty
    }
}

/// A native enum.
#[derive(Debug, Clone)]
pub struct Enum {
    pub(crate) ident: Ident,
    pub(crate) underlying: Primitive,
    pub(crate) flags: bool,
    pub(crate) values: Vec<EnumValue>,
}

impl Enum {
    pub fn underlying(&self) -> Primitive {
        self.underlying
    }

    /// Whether the values combine as bit flags.
    pub fn is_flags(&self) -> bool {
        self.flags
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }
}

/// A single enum value.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub(crate) ident: Ident,
    pub(crate) value: i64,
}

impl EnumValue {
    pub fn value(&self) -> i64 {
        self.value
    }
}

/// An exported factory function (e.g. `D3D11CreateDevice`).
#[derive(Debug, Clone)]
pub struct AccessPoint {
    pub(crate) ident: Ident,
    pub(crate) library: String,
    pub(crate) entry_point: String,
    pub(crate) call_conv: CallConv,
    pub(crate) return_type: NativeType,
    pub(crate) params: Vec<Param>,
}

impl AccessPoint {
    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn call_conv(&self) -> CallConv {
        self.call_conv
    }

    pub fn return_type(&self) -> &NativeType {
        &self.return_type
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}
