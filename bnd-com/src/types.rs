//! Type map and native type expressions.
//!
//! The [`TypeMap`] is filled while elements are constructed and consulted
//! once the whole model exists. Lookups during construction are fine (forward
//! references), but only the resolution phase treats a miss as an error.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{ModelError, Result};

/// What kind of declaration a registered native type name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Interface,
    Struct,
    Enum,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeKind::Interface => "interface",
            TypeKind::Struct => "struct",
            TypeKind::Enum => "enum",
        })
    }
}

/// A single type map entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeEntry {
    pub nice_name: String,
    pub kind: TypeKind,
}

/// Native type name → display name and kind.
///
/// At most one entry per native name. Re-registering an identical entry is
/// a no-op; anything else is a [`ModelError::DuplicateType`]. Display names
/// are unique too, so two native types can never be emitted under one name.
#[derive(Debug, Default, Clone)]
pub struct TypeMap {
    types: BTreeMap<String, TypeEntry>,
    /// Display name → owning native name.
    by_nice: HashMap<String, String>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, native: &str, nice_name: &str, kind: TypeKind) -> Result<()> {
        if let Some(existing) = self.types.get(native) {
            if existing.nice_name == nice_name && existing.kind == kind {
                return Ok(());
            }
            return Err(ModelError::DuplicateType {
                name: native.to_string(),
                existing: format!("{} {}", existing.kind, existing.nice_name),
                conflicting: format!("{kind} {nice_name}"),
            });
        }
        if let Some(owner) = self.by_nice.get(nice_name) {
            return Err(ModelError::NiceNameCollision {
                nice_name: nice_name.to_string(),
                name: native.to_string(),
                existing: owner.clone(),
            });
        }
        self.by_nice
            .insert(nice_name.to_string(), native.to_string());
        self.types.insert(
            native.to_string(),
            TypeEntry {
                nice_name: nice_name.to_string(),
                kind,
            },
        );
        Ok(())
    }

    /// Display name for a registered native type.
    pub fn resolve(&self, native: &str) -> Result<&str> {
        self.entry(native).map(|e| e.nice_name.as_str())
    }

    /// Full entry for a registered native type.
    pub fn entry(&self, native: &str) -> Result<&TypeEntry> {
        self.types.get(native).ok_or_else(|| ModelError::UnknownType {
            name: native.to_string(),
            referenced_by: None,
        })
    }

    /// Non-failing lookup, used while the model is still being built.
    pub fn get(&self, native: &str) -> Option<&TypeEntry> {
        self.types.get(native)
    }

    pub fn contains(&self, native: &str) -> bool {
        self.types.contains_key(native)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Entries in native-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeEntry)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for TypeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Built-in native scalar types. These never go through the type map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Void,
    /// C++ `bool` (1 byte).
    Bool,
    /// Win32 `BOOL` (4 bytes).
    Bool32,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    ISize,
    USize,
    Char16,
    HResult,
    Guid,
}

impl Primitive {
    /// Map a native spelling to a primitive, if it is one.
    pub fn from_native(name: &str) -> Option<Self> {
        let p = match name {
            "void" | "VOID" => Primitive::Void,
            "bool" => Primitive::Bool,
            "BOOL" => Primitive::Bool32,
            "char" | "CHAR" | "INT8" | "signed char" => Primitive::I8,
            "BYTE" | "UCHAR" | "UINT8" | "unsigned char" => Primitive::U8,
            "short" | "SHORT" | "INT16" => Primitive::I16,
            "USHORT" | "WORD" | "UINT16" | "unsigned short" => Primitive::U16,
            "int" | "INT" | "INT32" | "LONG" | "long" => Primitive::I32,
            "UINT" | "UINT32" | "DWORD" | "ULONG" | "unsigned int" | "unsigned long"
            | "unsigned" => Primitive::U32,
            "INT64" | "LONGLONG" | "long long" => Primitive::I64,
            "UINT64" | "ULONGLONG" | "unsigned long long" => Primitive::U64,
            "float" | "FLOAT" => Primitive::F32,
            "double" | "DOUBLE" => Primitive::F64,
            "SSIZE_T" | "INT_PTR" | "LONG_PTR" | "ptrdiff_t" => Primitive::ISize,
            "SIZE_T" | "UINT_PTR" | "ULONG_PTR" | "size_t" => Primitive::USize,
            "WCHAR" | "wchar_t" => Primitive::Char16,
            "HRESULT" => Primitive::HResult,
            "GUID" | "IID" | "CLSID" => Primitive::Guid,
            _ => return None,
        };
        Some(p)
    }
}

// ---------------------------------------------------------------------------
// Native type expressions
// ---------------------------------------------------------------------------

/// A native type as written in a declaration, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Primitive(Primitive),
    /// Interface, struct, enum or alias, looked up at resolution time.
    Named(String),
    /// `is_const` qualifies the pointee (`const T*`).
    Ptr {
        pointee: Box<NativeType>,
        is_const: bool,
    },
    /// Fixed-size array: `T[N]`.
    Array { element: Box<NativeType>, len: usize },
}

impl NativeType {
    pub fn named(name: impl Into<String>) -> Self {
        NativeType::Named(name.into())
    }

    pub fn ptr(pointee: NativeType) -> Self {
        NativeType::Ptr {
            pointee: Box::new(pointee),
            is_const: false,
        }
    }

    pub fn const_ptr(pointee: NativeType) -> Self {
        NativeType::Ptr {
            pointee: Box::new(pointee),
            is_const: true,
        }
    }

    /// Number of pointer levels and the innermost non-pointer type.
    pub fn peel_pointers(&self) -> (usize, &NativeType) {
        let mut depth = 0;
        let mut ty = self;
        while let NativeType::Ptr { pointee, .. } = ty {
            depth += 1;
            ty = pointee;
        }
        (depth, ty)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Primitive(p) => write!(f, "{p:?}"),
            NativeType::Named(name) => f.write_str(name),
            NativeType::Ptr { pointee, is_const } => {
                if *is_const {
                    write!(f, "const {pointee}*")
                } else {
                    write!(f, "{pointee}*")
                }
            }
            NativeType::Array { element, len } => write!(f, "{element}[{len}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Star,
    Open,
    Close,
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        match c {
            c if c.is_whitespace() => rest = &rest[c.len_utf8()..],
            '*' => {
                tokens.push(Token::Star);
                rest = &rest[1..];
            }
            '[' => {
                tokens.push(Token::Open);
                rest = &rest[1..];
            }
            ']' => {
                tokens.push(Token::Close);
                rest = &rest[1..];
            }
            c if c.is_alphanumeric() || c == '_' => {
                let end = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                tokens.push(Token::Word(&rest[..end]));
                rest = &rest[end..];
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(tokens)
}

impl FromStr for NativeType {
    type Err = ModelError;

    /// Parse `[const] Name [const] {* [const]} [\[N\]]`.
    fn from_str(text: &str) -> Result<Self> {
        let invalid = |reason: String| ModelError::InvalidTypeExpression {
            text: text.to_string(),
            reason,
        };
        let tokens = tokenize(text).map_err(invalid)?;
        let mut iter = tokens.into_iter().peekable();

        let mut const_pending = false;
        let mut words = Vec::new();
        while let Some(Token::Word(w)) = iter.peek() {
            if *w == "const" {
                const_pending = true;
            } else {
                words.push(*w);
            }
            iter.next();
        }
        if words.is_empty() {
            return Err(invalid("missing type name".into()));
        }
        let base_name = words.join(" ");
        let mut ty = match Primitive::from_native(&base_name) {
            Some(p) => NativeType::Primitive(p),
            None if words.len() == 1 => NativeType::Named(base_name),
            None => return Err(invalid(format!("unknown type `{base_name}`"))),
        };

        while let Some(token) = iter.next() {
            match token {
                Token::Star => {
                    ty = NativeType::Ptr {
                        pointee: Box::new(ty),
                        is_const: const_pending,
                    };
                    const_pending = false;
                }
                Token::Word("const") => const_pending = true,
                Token::Open => {
                    let len = match (iter.next(), iter.next()) {
                        (Some(Token::Word(n)), Some(Token::Close)) => n
                            .parse::<usize>()
                            .map_err(|_| invalid(format!("bad array length `{n}`")))?,
                        _ => return Err(invalid("malformed array suffix".into())),
                    };
                    if iter.peek().is_some() {
                        return Err(invalid("array suffix must come last".into()));
                    }
                    ty = NativeType::Array {
                        element: Box::new(ty),
                        len,
                    };
                }
                Token::Word(w) => return Err(invalid(format!("unexpected `{w}`"))),
                Token::Close => return Err(invalid("unbalanced `]`".into())),
            }
        }
        // `T* const` qualifies the parameter itself, which has no place in
        // the model.
        if const_pending && matches!(ty, NativeType::Ptr { .. }) {
            return Err(invalid("`const` must be followed by `*`".into()));
        }
        Ok(ty)
    }
}

// ---------------------------------------------------------------------------
// GUIDs
// ---------------------------------------------------------------------------

/// A COM interface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl FromStr for Guid {
    type Err = ModelError;

    /// Registry form `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, braces optional.
    fn from_str(text: &str) -> Result<Self> {
        let invalid = || ModelError::InvalidGuid {
            text: text.to_string(),
        };
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);
        let groups: Vec<&str> = inner.split('-').collect();
        let lens: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if lens != [8, 4, 4, 4, 12] || !inner.chars().all(|c| c == '-' || c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let data1 = u32::from_str_radix(groups[0], 16).map_err(|_| invalid())?;
        let data2 = u16::from_str_radix(groups[1], 16).map_err(|_| invalid())?;
        let data3 = u16::from_str_radix(groups[2], 16).map_err(|_| invalid())?;
        let tail = format!("{}{}", groups[3], groups[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
