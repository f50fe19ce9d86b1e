//! Structured model errors.
//!
//! Every variant carries the native names involved so the driver can point
//! the user at the offending declaration. None of these are recoverable: a
//! model that failed to build or resolve is never emitted.

use thiserror::Error;

use crate::model::ElementKind;

/// Result alias for model construction and resolution.
pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Normalization left nothing (e.g. the name was only a prefix).
    #[error("{kind} `{name}` has an empty display name after normalization")]
    EmptyName { kind: ElementKind, name: String },

    /// Same native type name registered with two different mappings.
    #[error("duplicate type `{name}`: already registered as `{existing}`, cannot register as `{conflicting}`")]
    DuplicateType {
        name: String,
        existing: String,
        conflicting: String,
    },

    /// Two different native types normalize to the same display name.
    #[error("display name `{nice_name}` of `{name}` is already taken by `{existing}`")]
    NiceNameCollision {
        nice_name: String,
        name: String,
        existing: String,
    },

    /// Two siblings (or two top-level non-type declarations) share a native name.
    #[error("duplicate {kind} `{name}` in `{parent}`")]
    DuplicateElement {
        kind: ElementKind,
        parent: String,
        name: String,
    },

    #[error("unknown type `{name}`{}", referrer(.referenced_by))]
    UnknownType {
        name: String,
        referenced_by: Option<String>,
    },

    /// A declared vtable slot is a duplicate or leaves a gap.
    #[error(
        "vtable slot conflict in `{interface}`: method `{method}` declares slot {slot}, expected {expected}{}",
        holder_suffix(.holder)
    )]
    VtableSlotConflict {
        interface: String,
        method: String,
        slot: u32,
        expected: u32,
        /// Method already occupying `slot`, if any.
        holder: Option<String>,
    },

    /// An interface handle issued by a different `SourceModel`.
    #[error("interface handle #{index} was not issued by this model")]
    ForeignInterface { index: usize },

    #[error("interface `{interface}` inherits from itself (chain: {})", .chain.join(" -> "))]
    InheritanceCycle {
        interface: String,
        chain: Vec<String>,
    },

    #[error("interface `{interface}` names `{base}` as its base, which is not an interface")]
    BaseNotInterface { interface: String, base: String },

    /// COM interfaces only ever cross the boundary by pointer.
    #[error("interface `{name}` passed by value in {element}")]
    InterfaceByValue { element: String, name: String },

    #[error("invalid type expression `{text}`: {reason}")]
    InvalidTypeExpression { text: String, reason: String },

    #[error("invalid GUID `{text}`")]
    InvalidGuid { text: String },

    #[error("{} model error(s):{}", .0.len(), bullet_list(.0))]
    Many(Vec<ModelError>),
}

impl ModelError {
    /// Attach the referencing element to an `UnknownType` error. Other
    /// variants pass through unchanged.
    pub fn referenced_by(self, element: impl Into<String>) -> Self {
        match self {
            ModelError::UnknownType { name, .. } => ModelError::UnknownType {
                name,
                referenced_by: Some(element.into()),
            },
            other => other,
        }
    }

    /// Collapse a list of errors: one error stays itself, several become `Many`.
    pub fn collect(mut errors: Vec<ModelError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ModelError::Many(errors)),
        }
    }

    /// Flattened view over this error and any nested `Many` lists.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &ModelError> + '_> {
        match self {
            ModelError::Many(errors) => Box::new(errors.iter().flat_map(|e| e.iter())),
            other => Box::new(std::iter::once(other)),
        }
    }
}

fn referrer(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(element) => format!(" referenced by {element}"),
        None => String::new(),
    }
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(method) => format!(" (already used by `{method}`)"),
        None => String::new(),
    }
}

fn bullet_list(errors: &[ModelError]) -> String {
    errors.iter().map(|e| format!("\n  • {e}")).collect()
}
