//! Source model: the root of one generation run and its construction API.
//!
//! A [`SourceModel`] owns the name rules, the type map and every declared
//! element. Builders call the `new_*` methods in whatever order the
//! declarations arrive; forward references are fine until
//! [`SourceModel::resolve`] consumes the model.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::model::*;
use crate::naming::NameRules;
use crate::resolve::{self, ResolvedModel};
use crate::types::{Guid, NativeType, Primitive, TypeMap};

/// Canonical root of every reference-counted interface chain.
pub const IUNKNOWN: &str = "IUnknown";

/// `IID_IUnknown`.
pub const IID_IUNKNOWN: Guid = Guid {
    data1: 0,
    data2: 0,
    data3: 0,
    data4: [0xC0, 0, 0, 0, 0, 0, 0, 0x46],
};

/// Handle to an interface declared in a particular [`SourceModel`].
///
/// Handles carry the identity of the model that issued them; passing one to
/// another model is a [`ModelError::ForeignInterface`] error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId {
    model: u64,
    index: usize,
}

static NEXT_MODEL: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// Construction inputs
// ---------------------------------------------------------------------------

/// Input for [`SourceModel::new_method`].
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub name: String,
    /// Explicit vtable slot; `None` takes the next free one.
    pub slot: Option<u32>,
    pub call_conv: CallConv,
    pub return_type: NativeType,
    pub return_ownership: Option<Ownership>,
    pub params: Vec<ParamSpec>,
}

impl MethodSpec {
    /// A `stdcall` method returning `HRESULT` with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: None,
            call_conv: CallConv::Stdcall,
            return_type: NativeType::Primitive(Primitive::HResult),
            return_ownership: None,
            params: Vec::new(),
        }
    }

    pub fn slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn returns(mut self, ty: NativeType) -> Self {
        self.return_type = ty;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

/// Input for one parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: NativeType,
    pub direction: Direction,
    pub optional: bool,
    pub ownership: Option<Ownership>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: NativeType) -> Self {
        Self {
            name: name.into(),
            ty,
            direction: Direction::In,
            optional: false,
            ownership: None,
        }
    }

    pub fn out(mut self) -> Self {
        self.direction = Direction::Out;
        self
    }

    pub fn in_out(mut self) -> Self {
        self.direction = Direction::InOut;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = Some(ownership);
        self
    }
}

/// Input for one struct field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: NativeType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: NativeType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Input for [`SourceModel::new_enum`].
#[derive(Debug, Clone)]
pub struct EnumSpec {
    pub name: String,
    pub underlying: Primitive,
    pub flags: bool,
    pub values: Vec<EnumValueSpec>,
}

impl EnumSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            underlying: Primitive::I32,
            flags: false,
            values: Vec::new(),
        }
    }

    pub fn flags(mut self) -> Self {
        self.flags = true;
        self
    }

    /// Append a value; `None` continues from the previous value (C rules).
    pub fn value(mut self, name: impl Into<String>, value: Option<i64>) -> Self {
        self.values.push(EnumValueSpec {
            name: name.into(),
            value,
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnumValueSpec {
    pub name: String,
    pub value: Option<i64>,
}

/// Input for [`SourceModel::new_access_point`].
#[derive(Debug, Clone)]
pub struct AccessPointSpec {
    pub name: String,
    pub library: String,
    /// Exported symbol; defaults to `name`.
    pub entry_point: Option<String>,
    pub call_conv: CallConv,
    pub return_type: NativeType,
    pub params: Vec<ParamSpec>,
}

// ---------------------------------------------------------------------------
// SourceModel
// ---------------------------------------------------------------------------

/// Root container for one generation run.
#[derive(Debug)]
pub struct SourceModel {
    token: u64,
    rules: NameRules,
    type_map: TypeMap,
    aliases: BTreeMap<String, NativeType>,
    root_interface: String,
    interfaces: Vec<Interface>,
    interface_index: HashMap<String, usize>,
    structs: Vec<Struct>,
    enums: Vec<Enum>,
    access_points: Vec<AccessPoint>,
}

impl SourceModel {
    pub fn new(rules: NameRules) -> Self {
        Self {
            token: NEXT_MODEL.fetch_add(1, Ordering::Relaxed),
            rules,
            type_map: TypeMap::new(),
            aliases: builtin_aliases(),
            root_interface: IUNKNOWN.to_string(),
            interfaces: Vec::new(),
            interface_index: HashMap::new(),
            structs: Vec::new(),
            enums: Vec::new(),
            access_points: Vec::new(),
        }
    }

    /// Name rules, root interface and type aliases from a loaded config.
    /// Declarations are not loaded here; see [`crate::extract`].
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut model = Self::new(NameRules::from_config(&cfg.naming))
            .with_root_interface(&cfg.model.root_interface);
        for (name, text) in &cfg.type_aliases {
            model.add_type_alias(name, text.parse()?);
        }
        Ok(model)
    }

    pub fn with_root_interface(mut self, name: &str) -> Self {
        self.root_interface = name.to_string();
        self
    }

    /// Make `name` stand for `ty` wherever it is referenced.
    pub fn add_type_alias(&mut self, name: &str, ty: NativeType) {
        self.aliases.insert(name.to_string(), ty);
    }

    pub fn rules(&self) -> &NameRules {
        &self.rules
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn aliases(&self) -> &BTreeMap<String, NativeType> {
        &self.aliases
    }

    pub fn root_interface(&self) -> &str {
        &self.root_interface
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn structs(&self) -> &[Struct] {
        &self.structs
    }

    pub fn enums(&self) -> &[Enum] {
        &self.enums
    }

    pub fn access_points(&self) -> &[AccessPoint] {
        &self.access_points
    }

    pub fn interface_id(&self, name: &str) -> Option<InterfaceId> {
        self.interface_index.get(name).map(|&index| self.handle(index))
    }

    /// The interface behind `id`, or `None` if another model issued it.
    pub fn interface(&self, id: InterfaceId) -> Option<&Interface> {
        self.index_of(id).ok().map(|i| &self.interfaces[i])
    }

    fn handle(&self, index: usize) -> InterfaceId {
        InterfaceId {
            model: self.token,
            index,
        }
    }

    fn index_of(&self, id: InterfaceId) -> Result<usize> {
        if id.model == self.token && id.index < self.interfaces.len() {
            Ok(id.index)
        } else {
            Err(ModelError::ForeignInterface { index: id.index })
        }
    }

    /// Register a type-denoting element. Identical re-registration is a no-op.
    pub fn register_type(&mut self, element: &impl TypeElement) -> Result<()> {
        self.type_map
            .register(element.name(), element.nice_name(), element.type_kind())
    }

    /// Declare an interface. `base` may name an interface declared later.
    pub fn new_interface(
        &mut self,
        name: &str,
        base: Option<&str>,
        guid: Option<Guid>,
    ) -> Result<InterfaceId> {
        let ident = Ident::new(ElementKind::Interface, &self.rules, name, None)?;
        if let Some(&existing) = self.interface_index.get(name) {
            return Err(duplicate_type(&self.interfaces[existing], &ident));
        }
        let iface = Interface {
            ident,
            guid,
            base: base.map(str::to_string),
            methods: Vec::new(),
        };
        self.register_type(&iface)?;
        debug!(name, nice = iface.nice_name(), base, "declared interface");

        let index = self.interfaces.len();
        self.interface_index.insert(name.to_string(), index);
        self.interfaces.push(iface);
        Ok(self.handle(index))
    }

    /// Append a method to an interface's vtable.
    ///
    /// A declared slot is only checked here against what cannot change
    /// later: the interface's own earlier methods. Bases may still gain
    /// methods, so the check against the full layout happens at resolution.
    pub fn new_method(&mut self, iface: InterfaceId, spec: MethodSpec) -> Result<()> {
        let index = self.index_of(iface)?;
        let inherited = self.inherited_method_count(iface);
        let owner = &self.interfaces[index];

        let ident = Ident::new(ElementKind::Method, &self.rules, &spec.name, Some(owner.name()))?;
        let nice = self.rules.disambiguate(ident.nice_name(), |candidate| {
            owner.methods.iter().any(|m| m.nice_name() == candidate)
        });
        if nice != ident.nice_name() {
            trace!(interface = %owner, method = %spec.name, nice = %nice, "renamed overloaded method");
        }
        let ident = ident.with_nice_name(nice);

        if let Some(slot) = spec.slot {
            check_declared_slot(owner, &spec.name, slot)?;
        }

        let params = build_params(&self.rules, &spec.name, spec.params)?;
        let method = Method {
            ident,
            declared_slot: spec.slot,
            call_conv: spec.call_conv,
            return_type: spec.return_type,
            return_ownership: spec.return_ownership,
            params,
        };
        debug!(
            interface = %owner,
            method = %method,
            slot = ?inherited.and_then(|k| k.checked_add(owner.methods.len() as u32)),
            params = method.params.len(),
            "declared method"
        );
        self.interfaces[index].methods.push(method);
        Ok(())
    }

    pub fn new_struct(&mut self, name: &str, fields: Vec<FieldSpec>) -> Result<()> {
        let ident = Ident::new(ElementKind::Struct, &self.rules, name, None)?;
        if let Some(existing) = self.structs.iter().find(|s| s.name() == name) {
            return Err(duplicate_type(existing, &ident));
        }
        let mut built: Vec<Field> = Vec::with_capacity(fields.len());
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.name.clone()) {
                return Err(ModelError::DuplicateElement {
                    kind: ElementKind::Field,
                    parent: name.to_string(),
                    name: field.name,
                });
            }
            let fid = Ident::new(ElementKind::Field, &self.rules, &field.name, Some(name))?;
            let nice = self.rules.disambiguate(fid.nice_name(), |candidate| {
                built.iter().any(|f| f.nice_name() == candidate)
            });
            built.push(Field {
                ident: fid.with_nice_name(nice),
                ty: field.ty,
            });
        }
        let s = Struct {
            ident,
            fields: built,
        };
        self.register_type(&s)?;
        debug!(name = %s, nice = s.nice_name(), fields = s.fields.len(), "declared struct");
        self.structs.push(s);
        Ok(())
    }

    pub fn new_enum(&mut self, spec: EnumSpec) -> Result<()> {
        let ident = Ident::new(ElementKind::Enum, &self.rules, &spec.name, None)?;
        if let Some(existing) = self.enums.iter().find(|e| e.name() == spec.name) {
            return Err(duplicate_type(existing, &ident));
        }
        let mut values: Vec<EnumValue> = Vec::with_capacity(spec.values.len());
        let mut seen = HashSet::new();
        let mut next = 0i64;
        for v in spec.values {
            if !seen.insert(v.name.clone()) {
                return Err(ModelError::DuplicateElement {
                    kind: ElementKind::EnumValue,
                    parent: spec.name.clone(),
                    name: v.name,
                });
            }
            let vid = Ident::new(ElementKind::EnumValue, &self.rules, &v.name, Some(&spec.name))?;
            let nice = self.rules.disambiguate(vid.nice_name(), |candidate| {
                values.iter().any(|e| e.nice_name() == candidate)
            });
            let value = v.value.unwrap_or(next);
            next = value.wrapping_add(1);
            values.push(EnumValue {
                ident: vid.with_nice_name(nice),
                value,
            });
        }
        let en = Enum {
            ident,
            underlying: spec.underlying,
            flags: spec.flags,
            values,
        };
        self.register_type(&en)?;
        debug!(name = %en, nice = en.nice_name(), values = en.values.len(), "declared enum");
        self.enums.push(en);
        Ok(())
    }

    pub fn new_access_point(&mut self, spec: AccessPointSpec) -> Result<()> {
        let ident = Ident::new(ElementKind::AccessPoint, &self.rules, &spec.name, None)?;
        if self.access_points.iter().any(|a| a.name() == spec.name) {
            return Err(ModelError::DuplicateElement {
                kind: ElementKind::AccessPoint,
                parent: "model".to_string(),
                name: spec.name,
            });
        }
        let nice = self.rules.disambiguate(ident.nice_name(), |candidate| {
            self.access_points.iter().any(|a| a.nice_name() == candidate)
        });
        let params = build_params(&self.rules, &spec.name, spec.params)?;
        let entry_point = spec.entry_point.unwrap_or_else(|| spec.name.clone());
        let ap = AccessPoint {
            ident: ident.with_nice_name(nice),
            library: spec.library,
            entry_point,
            call_conv: spec.call_conv,
            return_type: spec.return_type,
            params,
        };
        debug!(name = %ap, library = %ap.library, "declared access point");
        self.access_points.push(ap);
        Ok(())
    }

    /// Declare the root interface with the three `IUnknown` methods.
    pub fn declare_root_interface(&mut self) -> Result<InterfaceId> {
        let name = self.root_interface.clone();
        let guid = (name == IUNKNOWN).then_some(IID_IUNKNOWN);
        let id = self.new_interface(&name, None, guid)?;

        let ulong = NativeType::Primitive(Primitive::U32);
        self.new_method(
            id,
            MethodSpec::new("QueryInterface")
                .param(ParamSpec::new("riid", NativeType::named("REFIID")))
                .param(
                    ParamSpec::new(
                        "ppvObject",
                        NativeType::ptr(NativeType::ptr(NativeType::Primitive(Primitive::Void))),
                    )
                    .out()
                    .ownership(Ownership::Owned),
                ),
        )?;
        self.new_method(id, MethodSpec::new("AddRef").returns(ulong.clone()))?;
        self.new_method(id, MethodSpec::new("Release").returns(ulong))?;
        Ok(id)
    }

    /// Number of vtable slots the base chain currently holds, or `None`
    /// while part of the chain is undeclared (or cyclic) or `iface` belongs
    /// to another model. Bases may still gain methods until resolution.
    pub fn inherited_method_count(&self, iface: InterfaceId) -> Option<u32> {
        let mut total = 0u32;
        let mut visited = HashSet::new();
        let mut current = self.interfaces[self.index_of(iface).ok()?].base.as_deref();
        while let Some(base) = current {
            if !visited.insert(base) {
                return None;
            }
            let idx = *self.interface_index.get(base)?;
            let base_iface = &self.interfaces[idx];
            total = total.checked_add(base_iface.methods.len() as u32)?;
            current = base_iface.base.as_deref();
        }
        Some(total)
    }

    /// Finish construction: resolve every cross-reference against the
    /// complete type map. Consumes the model, so nothing can be declared
    /// after resolution has started.
    pub fn resolve(self) -> Result<ResolvedModel> {
        resolve::resolve(self)
    }

    pub(crate) fn into_parts(self) -> ModelParts {
        ModelParts {
            type_map: self.type_map,
            aliases: self.aliases,
            root_interface: self.root_interface,
            interfaces: self.interfaces,
            structs: self.structs,
            enums: self.enums,
            access_points: self.access_points,
        }
    }
}

/// Everything resolution needs, moved out of the model.
pub(crate) struct ModelParts {
    pub type_map: TypeMap,
    pub aliases: BTreeMap<String, NativeType>,
    pub root_interface: String,
    pub interfaces: Vec<Interface>,
    pub structs: Vec<Struct>,
    pub enums: Vec<Enum>,
    pub access_points: Vec<AccessPoint>,
}

/// Win32 spellings that are shorthands for other type expressions.
fn builtin_aliases() -> BTreeMap<String, NativeType> {
    let void = || NativeType::Primitive(Primitive::Void);
    let guid = || NativeType::Primitive(Primitive::Guid);
    let char8 = || NativeType::Primitive(Primitive::I8);
    let wchar = || NativeType::Primitive(Primitive::Char16);
    [
        ("REFIID", NativeType::const_ptr(guid())),
        ("REFGUID", NativeType::const_ptr(guid())),
        ("REFCLSID", NativeType::const_ptr(guid())),
        ("LPVOID", NativeType::ptr(void())),
        ("LPCVOID", NativeType::const_ptr(void())),
        ("LPSTR", NativeType::ptr(char8())),
        ("LPCSTR", NativeType::const_ptr(char8())),
        ("LPWSTR", NativeType::ptr(wchar())),
        ("LPCWSTR", NativeType::const_ptr(wchar())),
        ("HANDLE", NativeType::ptr(void())),
        ("HMODULE", NativeType::ptr(void())),
        ("HWND", NativeType::ptr(void())),
    ]
    .into_iter()
    .map(|(name, ty)| (name.to_string(), ty))
    .collect()
}

fn build_params(rules: &NameRules, parent: &str, specs: Vec<ParamSpec>) -> Result<Vec<Param>> {
    let mut params: Vec<Param> = Vec::with_capacity(specs.len());
    for spec in specs {
        if params.iter().any(|p| p.name() == spec.name) {
            return Err(ModelError::DuplicateElement {
                kind: ElementKind::Parameter,
                parent: parent.to_string(),
                name: spec.name,
            });
        }
        let ident = Ident::new(ElementKind::Parameter, rules, &spec.name, Some(parent))?;
        let nice = rules.disambiguate(ident.nice_name(), |candidate| {
            params.iter().any(|p| p.nice_name() == candidate)
        });
        params.push(Param {
            ident: ident.with_nice_name(nice),
            ty: spec.ty,
            direction: spec.direction,
            optional: spec.optional,
            ownership: spec.ownership,
        });
    }
    Ok(params)
}

/// Second declaration of an already declared type.
fn duplicate_type(existing: &impl TypeElement, ident: &Ident) -> ModelError {
    ModelError::DuplicateType {
        name: existing.name().to_string(),
        existing: format!("{} {}", existing.type_kind(), existing.nice_name()),
        conflicting: format!("{} {}", existing.type_kind(), ident.nice_name()),
    }
}

/// Eager vtable check for a method about to be appended to `owner`.
///
/// A root interface's own methods start at slot 0. Below a base, the last
/// explicitly slotted method fixes where the own methods start; with none
/// yet, nothing is known until resolution.
fn check_declared_slot(owner: &Interface, method: &str, slot: u32) -> Result<()> {
    let own = owner.methods.len();
    let conflict = |expected: u32, holder: Option<&Method>| ModelError::VtableSlotConflict {
        interface: owner.name().to_string(),
        method: method.to_string(),
        slot,
        expected,
        holder: holder.map(|m| m.name().to_string()),
    };

    let origin = match owner.base {
        None => Some(0),
        Some(_) => owner
            .methods
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, m)| m.declared_slot.map(|s| (s, i)))
            .and_then(|(s, i)| u32::try_from(i).ok().and_then(|i| s.checked_sub(i))),
    };
    let Some(origin) = origin else {
        return Ok(());
    };

    let holder = slot
        .checked_sub(origin)
        .and_then(|i| owner.methods.get(i as usize));
    // Past the last representable slot there is no valid next slot.
    let Some(expected) = u32::try_from(own).ok().and_then(|n| origin.checked_add(n)) else {
        return Err(conflict(u32::MAX, holder));
    };
    if slot != expected {
        return Err(conflict(expected, holder));
    }
    Ok(())
}
