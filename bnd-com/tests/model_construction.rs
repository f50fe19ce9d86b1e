//! Construction and resolution through the public model API: vtable layout,
//! forward references, naming, ownership and structured errors.

use bnd_com::ModelError;
use bnd_com::model::{Direction, Element, Ownership};
use bnd_com::naming::NameRules;
use bnd_com::resolve::{Marshal, ResolvedModel, ResolvedType};
use bnd_com::source::{
    AccessPointSpec, EnumSpec, FieldSpec, IID_IUNKNOWN, MethodSpec, ParamSpec, SourceModel,
};
use bnd_com::types::{NativeType, Primitive, TypeKind};

fn rules() -> NameRules {
    NameRules::new(["ID3D11", "D3D11_", "I"]).with_parameter_prefixes(["pp", "p"])
}

/// Model with `IUnknown` and its three methods already declared.
fn com_model() -> SourceModel {
    let mut model = SourceModel::new(rules());
    model.declare_root_interface().expect("declare IUnknown");
    model
}

fn ty(text: &str) -> NativeType {
    text.parse().expect("valid type expression")
}

fn slots(model: &ResolvedModel, iface: &str) -> Vec<(String, u32)> {
    model
        .interface(iface)
        .unwrap_or_else(|| panic!("{iface} missing"))
        .methods
        .iter()
        .map(|m| (m.name.clone(), m.slot))
        .collect()
}

// ---------------------------------------------------------------------------
// Vtable layout
// ---------------------------------------------------------------------------

#[test]
fn methods_take_consecutive_slots() {
    let mut model = SourceModel::new(rules());
    let id = model.new_interface("IFoo", None, None).unwrap();
    for name in ["A", "B", "C"] {
        model.new_method(id, MethodSpec::new(name)).unwrap();
    }
    let resolved = model.resolve().unwrap();
    assert_eq!(
        slots(&resolved, "IFoo"),
        vec![("A".to_string(), 0), ("B".to_string(), 1), ("C".to_string(), 2)]
    );
    let foo = resolved.interface("IFoo").unwrap();
    assert!(!foo.ref_counted, "IFoo has no path to IUnknown");
    assert_eq!(foo.inherited_methods, 0);
}

#[test]
fn taken_slot_is_rejected_at_construction() {
    let mut model = SourceModel::new(rules());
    let id = model.new_interface("IFoo", None, None).unwrap();
    for name in ["A", "B", "C"] {
        model.new_method(id, MethodSpec::new(name)).unwrap();
    }
    let err = model
        .new_method(id, MethodSpec::new("D").slot(2))
        .expect_err("slot 2 belongs to C");
    assert_eq!(
        err,
        ModelError::VtableSlotConflict {
            interface: "IFoo".into(),
            method: "D".into(),
            slot: 2,
            expected: 3,
            holder: Some("C".into()),
        }
    );
    assert!(err.to_string().contains("already used by `C`"), "got: {err}");
    // The failed call left the interface untouched.
    assert_eq!(model.interface(id).unwrap().methods().len(), 3);
}

#[test]
fn gap_in_slots_is_rejected() {
    let mut model = com_model();
    let id = model.new_interface("IFoo", Some("IUnknown"), None).unwrap();
    // IUnknown could still grow, so the gap only shows at resolution.
    model.new_method(id, MethodSpec::new("Skip").slot(7)).unwrap();
    let err = model.resolve().expect_err("slot 7 leaves a gap after IUnknown");
    assert!(
        err.iter().any(|e| matches!(
            e,
            ModelError::VtableSlotConflict { slot: 7, expected: 3, holder: None, .. }
        )),
        "got: {err:?}"
    );
}

#[test]
fn own_slots_must_stay_contiguous() {
    let mut model = com_model();
    let id = model.new_interface("IFoo", Some("IUnknown"), None).unwrap();
    model.new_method(id, MethodSpec::new("A").slot(3)).unwrap();
    model.new_method(id, MethodSpec::new("B")).unwrap();
    let err = model
        .new_method(id, MethodSpec::new("C").slot(4))
        .expect_err("slot 4 belongs to B");
    assert_eq!(
        err,
        ModelError::VtableSlotConflict {
            interface: "IFoo".into(),
            method: "C".into(),
            slot: 4,
            expected: 5,
            holder: Some("B".into()),
        }
    );
}

#[test]
fn base_methods_may_arrive_after_slotted_derived_methods() {
    let mut model = SourceModel::new(rules());
    let unknown = model.new_interface("IUnknown", None, None).unwrap();
    let foo = model.new_interface("IFoo", Some("IUnknown"), None).unwrap();
    assert_eq!(model.inherited_method_count(foo), Some(0));
    model.new_method(foo, MethodSpec::new("A").slot(3)).unwrap();
    for name in ["QueryInterface", "AddRef", "Release"] {
        model.new_method(unknown, MethodSpec::new(name)).unwrap();
    }
    assert_eq!(model.inherited_method_count(foo), Some(3));

    let resolved = model.resolve().unwrap();
    assert_eq!(slots(&resolved, "IFoo"), vec![("A".to_string(), 3)]);
}

#[test]
fn last_representable_slot_has_no_successor() {
    let mut model = com_model();
    let id = model.new_interface("IDerived", Some("IMiddle"), None).unwrap();
    model.new_method(id, MethodSpec::new("A").slot(u32::MAX)).unwrap();
    let err = model
        .new_method(id, MethodSpec::new("B").slot(0))
        .expect_err("nothing follows slot u32::MAX");
    assert!(
        matches!(err, ModelError::VtableSlotConflict { ref method, slot: 0, .. } if method == "B"),
        "got: {err:?}"
    );
}

#[test]
fn interface_handles_belong_to_their_model() {
    let mut a = com_model();
    let a_device = a.new_interface("ID3D11Device", Some("IUnknown"), None).unwrap();
    let mut b = SourceModel::new(rules());

    assert!(b.interface(a_device).is_none());
    assert_eq!(b.inherited_method_count(a_device), None);
    let err = b
        .new_method(a_device, MethodSpec::new("CreateBuffer"))
        .expect_err("handle comes from another model");
    assert!(matches!(err, ModelError::ForeignInterface { index: 1 }), "got: {err:?}");

    // Same index, different model: still rejected rather than aliased.
    b.declare_root_interface().unwrap();
    b.new_interface("IWidget", None, None).unwrap();
    let err = b
        .new_method(a_device, MethodSpec::new("CreateBuffer"))
        .expect_err("handle comes from another model");
    assert!(matches!(err, ModelError::ForeignInterface { .. }), "got: {err:?}");
    assert!(b.interface_id("IWidget").and_then(|id| b.interface(id)).unwrap().methods().is_empty());

    a.new_method(a_device, MethodSpec::new("CreateBuffer")).unwrap();
    assert_eq!(a.interface(a_device).unwrap().methods().len(), 1);
}

#[test]
fn inherited_methods_come_first() {
    let mut model = com_model();
    let device = model
        .new_interface("ID3D11Device", Some("IUnknown"), None)
        .unwrap();
    assert_eq!(model.inherited_method_count(device), Some(3));
    model
        .new_method(device, MethodSpec::new("CreateBuffer").slot(3))
        .unwrap();
    model
        .new_method(device, MethodSpec::new("GetCreationFlags"))
        .unwrap();

    let resolved = model.resolve().unwrap();
    let iface = resolved.interface("ID3D11Device").unwrap();
    assert!(iface.ref_counted);
    assert_eq!(iface.inherited_methods, 3);
    assert_eq!(iface.base_nice_name.as_deref(), Some("Unknown"));

    let vtable: Vec<&str> = resolved
        .vtable("ID3D11Device")
        .unwrap()
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(
        vtable,
        ["QueryInterface", "AddRef", "Release", "CreateBuffer", "GetCreationFlags"]
    );
}

#[test]
fn forward_declared_base_is_laid_out_at_resolution() {
    let mut model = com_model();
    let derived = model
        .new_interface("IDerived", Some("IMiddle"), None)
        .unwrap();
    assert_eq!(model.inherited_method_count(derived), None);
    // Base chain unknown: only contiguity among explicit slots is checked.
    model.new_method(derived, MethodSpec::new("X").slot(5)).unwrap();
    model.new_method(derived, MethodSpec::new("Y")).unwrap();

    let middle = model
        .new_interface("IMiddle", Some("IUnknown"), None)
        .unwrap();
    model.new_method(middle, MethodSpec::new("M1")).unwrap();
    model.new_method(middle, MethodSpec::new("M2")).unwrap();
    assert_eq!(model.inherited_method_count(derived), Some(5));

    let resolved = model.resolve().unwrap();
    assert_eq!(
        slots(&resolved, "IDerived"),
        vec![("X".to_string(), 5), ("Y".to_string(), 6)]
    );
    assert!(resolved.interface("IDerived").unwrap().ref_counted);
}

#[test]
fn forward_declared_base_with_wrong_slot_fails_resolution() {
    let mut model = com_model();
    let derived = model
        .new_interface("IDerived", Some("IMiddle"), None)
        .unwrap();
    model.new_method(derived, MethodSpec::new("X").slot(3)).unwrap();
    let middle = model
        .new_interface("IMiddle", Some("IUnknown"), None)
        .unwrap();
    model.new_method(middle, MethodSpec::new("M1")).unwrap();
    model.new_method(middle, MethodSpec::new("M2")).unwrap();

    let err = model.resolve().expect_err("X sits at slot 5, not 3");
    assert!(
        err.iter().any(|e| matches!(
            e,
            ModelError::VtableSlotConflict { method, slot: 3, expected: 5, .. } if method == "X"
        )),
        "got: {err}"
    );
}

#[test]
fn declaration_order_does_not_change_the_result() {
    fn build(reversed: bool) -> ResolvedModel {
        let mut model = com_model();
        let mut decls: Vec<(&str, &str, &[&str])> = vec![
            ("ID3D11DeviceChild", "IUnknown", &["GetDevice", "GetPrivateData"][..]),
            ("ID3D11Resource", "ID3D11DeviceChild", &["GetType"][..]),
            ("ID3D11Buffer", "ID3D11Resource", &["GetDesc"][..]),
        ];
        if reversed {
            decls.reverse();
        }
        for (name, base, methods) in decls {
            let id = model.new_interface(name, Some(base), None).unwrap();
            for m in methods {
                model.new_method(id, MethodSpec::new(*m)).unwrap();
            }
        }
        model.resolve().unwrap()
    }

    let forward = build(false);
    let backward = build(true);
    for name in ["ID3D11DeviceChild", "ID3D11Resource", "ID3D11Buffer"] {
        assert_eq!(forward.interface(name), backward.interface(name), "{name} differs");
    }
    let names = |m: &ResolvedModel| -> Vec<(String, String)> {
        m.type_map()
            .iter()
            .map(|(k, v)| (k.to_string(), v.nice_name.clone()))
            .collect()
    };
    assert_eq!(names(&forward), names(&backward));
    assert_eq!(slots(&forward, "ID3D11Buffer"), vec![("GetDesc".to_string(), 6)]);
}

// ---------------------------------------------------------------------------
// Names and the type map
// ---------------------------------------------------------------------------

#[test]
fn type_names_are_normalized_once() {
    let mut model = com_model();
    model
        .new_interface("ID3D11Buffer", Some("IUnknown"), None)
        .unwrap();
    model.new_struct("D3D11_BUFFER_DESC", vec![]).unwrap();

    let map = model.type_map();
    assert_eq!(map.resolve("IUnknown").unwrap(), "Unknown");
    assert_eq!(map.resolve("ID3D11Buffer").unwrap(), "Buffer");
    assert_eq!(map.resolve("D3D11_BUFFER_DESC").unwrap(), "BufferDesc");
    assert_eq!(map.get("D3D11_BUFFER_DESC").unwrap().kind, TypeKind::Struct);

    let buffer = &model.interfaces()[1];
    assert_eq!(buffer.name(), "ID3D11Buffer");
    assert_eq!(buffer.nice_name(), "Buffer");
    assert_eq!(buffer.to_string(), "ID3D11Buffer");
}

#[test]
fn reregistering_the_same_type_is_a_no_op() {
    let mut model = com_model();
    let id = model
        .new_interface("ID3D11Buffer", Some("IUnknown"), None)
        .unwrap();
    let before = model.type_map().len();
    let iface = model.interface(id).unwrap().clone();
    model.register_type(&iface).expect("identical entry");
    assert_eq!(model.type_map().len(), before);
}

#[test]
fn second_declaration_of_a_type_is_rejected() {
    let mut model = com_model();
    model.new_struct("D3D11_BOX", vec![]).unwrap();
    let err = model.new_struct("D3D11_BOX", vec![]).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateType { ref name, .. } if name == "D3D11_BOX"));

    let err = model.new_enum(EnumSpec::new("D3D11_BOX")).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateType { ref name, .. } if name == "D3D11_BOX"));

    let err = model.new_interface("IUnknown", None, None).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateType { ref name, .. } if name == "IUnknown"));
}

#[test]
fn colliding_display_names_are_rejected() {
    let mut model = com_model();
    model.new_interface("ID3D11Buffer", None, None).unwrap();
    let err = model.new_interface("IBuffer", None, None).unwrap_err();
    assert_eq!(
        err,
        ModelError::NiceNameCollision {
            nice_name: "Buffer".into(),
            name: "IBuffer".into(),
            existing: "ID3D11Buffer".into(),
        }
    );
    assert!(model.type_map().get("IBuffer").is_none());
}

#[test]
fn prefix_only_names_are_rejected() {
    let mut model = com_model();
    let err = model.new_interface("ID3D11", None, None).unwrap_err();
    assert!(matches!(err, ModelError::EmptyName { ref name, .. } if name == "ID3D11"));
    let err = model.new_struct("", vec![]).unwrap_err();
    assert!(matches!(err, ModelError::EmptyName { .. }));
}

#[test]
fn enum_values_drop_the_enum_prefix() {
    let mut model = com_model();
    model
        .new_enum(
            EnumSpec::new("D3D11_USAGE")
                .value("D3D11_USAGE_DEFAULT", None)
                .value("D3D11_USAGE_IMMUTABLE", None)
                .value("D3D11_USAGE_STAGING", Some(10))
                .value("D3D11_USAGE_NEXT", None),
        )
        .unwrap();
    model
        .new_enum(
            EnumSpec::new("D3D_FEATURE_LEVEL")
                .value("D3D_FEATURE_LEVEL_9_1", Some(0x9100)),
        )
        .unwrap();

    let resolved = model.resolve().unwrap();
    let usage = resolved.enumeration("D3D11_USAGE").unwrap();
    assert_eq!(usage.nice_name, "Usage");
    assert_eq!(usage.underlying, Primitive::I32);
    let values: Vec<(&str, i64)> = usage
        .values
        .iter()
        .map(|v| (v.nice_name.as_str(), v.value))
        .collect();
    assert_eq!(
        values,
        [("Default", 0), ("Immutable", 1), ("Staging", 10), ("Next", 11)]
    );

    // Stripping would leave `9_1`, so the full name is used.
    let level = resolved.enumeration("D3D_FEATURE_LEVEL").unwrap();
    assert_eq!(level.values[0].nice_name, "D3dFeatureLevel91");
}

#[test]
fn sibling_collisions_get_numbered() {
    let mut model = com_model();
    let id = model.new_interface("IWidget", None, None).unwrap();
    model.new_method(id, MethodSpec::new("GetDesc")).unwrap();
    model.new_method(id, MethodSpec::new("GetDesc")).unwrap();
    let nice: Vec<&str> = model
        .interface(id)
        .unwrap()
        .methods()
        .iter()
        .map(|m| m.nice_name())
        .collect();
    assert_eq!(nice, ["GetDesc", "GetDesc2"]);

    // `pDevice` and `ppDevice` both become `device`.
    model
        .new_method(
            id,
            MethodSpec::new("Bind")
                .param(ParamSpec::new("pDevice", ty("void*")))
                .param(ParamSpec::new("ppDevice", ty("void**"))),
        )
        .unwrap();
    let bind = &model.interface(id).unwrap().methods()[2];
    let params: Vec<&str> = bind.params().iter().map(|p| p.nice_name()).collect();
    assert_eq!(params, ["device", "device2"]);
}

#[test]
fn duplicate_parameter_is_rejected() {
    let mut model = com_model();
    let id = model.new_interface("IWidget", None, None).unwrap();
    let err = model
        .new_method(
            id,
            MethodSpec::new("Draw")
                .param(ParamSpec::new("Count", ty("UINT")))
                .param(ParamSpec::new("Count", ty("UINT"))),
        )
        .unwrap_err();
    assert!(
        matches!(err, ModelError::DuplicateElement { ref name, ref parent, .. } if name == "Count" && parent == "Draw"),
        "got: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn interface_ownership_follows_position() {
    let mut model = com_model();
    let id = model
        .new_interface("IWidget", Some("IUnknown"), None)
        .unwrap();
    model
        .new_method(
            id,
            MethodSpec::new("Use").param(ParamSpec::new("pTarget", ty("ITarget*"))),
        )
        .unwrap();
    model
        .new_method(
            id,
            MethodSpec::new("Create").param(ParamSpec::new("ppTarget", ty("ITarget**")).out()),
        )
        .unwrap();
    model
        .new_method(
            id,
            MethodSpec::new("UseMany").param(ParamSpec::new("ppTargets", ty("ITarget**"))),
        )
        .unwrap();
    model
        .new_method(id, MethodSpec::new("Current").returns(ty("ITarget*")))
        .unwrap();
    model
        .new_method(
            id,
            MethodSpec::new("Peek").param(
                ParamSpec::new("ppTarget", ty("ITarget**"))
                    .out()
                    .ownership(Ownership::Borrowed),
            ),
        )
        .unwrap();
    model
        .new_method(
            id,
            MethodSpec::new("Fill")
                .param(ParamSpec::new("pData", ty("const BYTE*")))
                .param(ParamSpec::new("Size", ty("UINT"))),
        )
        .unwrap();
    // Declared after its first use.
    model
        .new_interface("ITarget", Some("IUnknown"), None)
        .unwrap();

    let resolved = model.resolve().unwrap();
    let widget = resolved.interface("IWidget").unwrap();
    let param_marshal = |method: usize, param: usize| widget.methods[method].params[param].marshal;

    assert_eq!(param_marshal(0, 0), Marshal::Interface { ownership: Ownership::Borrowed });
    assert_eq!(param_marshal(1, 0), Marshal::Interface { ownership: Ownership::Owned });
    assert_eq!(param_marshal(2, 0), Marshal::InterfaceArray { ownership: Ownership::Borrowed });
    assert_eq!(
        widget.methods[3].return_marshal,
        Marshal::Interface { ownership: Ownership::Owned }
    );
    assert_eq!(param_marshal(4, 0), Marshal::Interface { ownership: Ownership::Borrowed });
    assert_eq!(param_marshal(5, 0), Marshal::Pointer);
    assert_eq!(param_marshal(5, 1), Marshal::Value);
    assert_eq!(widget.methods[5].return_marshal, Marshal::Value);

    let target = &widget.methods[0].params[0];
    assert_eq!(target.nice_name, "target");
    assert_eq!(target.direction, Direction::In);
    let (depth, inner) = target.ty.peel_pointers();
    assert_eq!(depth, 1);
    assert!(
        matches!(inner, ResolvedType::Named { nice_name, type_kind: TypeKind::Interface, .. } if nice_name == "Target"),
        "got: {inner:?}"
    );
}

#[test]
fn root_interface_is_canonical() {
    let resolved = com_model().resolve().unwrap();
    let unknown = resolved.interface("IUnknown").unwrap();
    assert_eq!(unknown.guid, Some(IID_IUNKNOWN));
    assert!(unknown.ref_counted);
    assert_eq!(
        slots(&resolved, "IUnknown"),
        vec![
            ("QueryInterface".to_string(), 0),
            ("AddRef".to_string(), 1),
            ("Release".to_string(), 2)
        ]
    );
    let query = &unknown.methods[0];
    assert_eq!(query.params[1].name, "ppvObject");
    assert_eq!(query.params[1].marshal, Marshal::Interface { ownership: Ownership::Owned });
    assert_eq!(
        unknown.methods[1].return_type,
        ResolvedType::Primitive { primitive: Primitive::U32 }
    );
}

#[test]
fn interface_by_value_is_rejected() {
    let mut model = com_model();
    let id = model.new_interface("IWidget", Some("IUnknown"), None).unwrap();
    model
        .new_method(id, MethodSpec::new("Adopt").param(ParamSpec::new("Other", ty("IWidget"))))
        .unwrap();
    model
        .new_struct("WIDGET_HOLDER", vec![FieldSpec::new("Widget", ty("IWidget"))])
        .unwrap();

    let err = model.resolve().unwrap_err();
    let by_value: Vec<_> = err
        .iter()
        .filter(|e| matches!(e, ModelError::InterfaceByValue { .. }))
        .collect();
    assert_eq!(by_value.len(), 2, "got: {err}");
    assert!(err.to_string().contains("IWidget::Adopt"), "got: {err}");
    assert!(err.to_string().contains("WIDGET_HOLDER"), "got: {err}");
}

#[test]
fn all_unknown_types_are_reported_together() {
    let mut model = com_model();
    let id = model.new_interface("IWidget", Some("IUnknown"), None).unwrap();
    model
        .new_method(id, MethodSpec::new("Attach").param(ParamSpec::new("pOther", ty("IMissing*"))))
        .unwrap();
    model
        .new_struct("WIDGET_DESC", vec![FieldSpec::new("Kind", ty("MISSING_KIND"))])
        .unwrap();

    let err = model.resolve().unwrap_err();
    let unknown: Vec<&str> = err
        .iter()
        .filter_map(|e| match e {
            ModelError::UnknownType { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unknown, ["IMissing", "MISSING_KIND"]);
    let text = err.to_string();
    assert!(text.contains("IWidget::Attach"), "referrer missing: {text}");
    assert!(text.contains("WIDGET_DESC"), "referrer missing: {text}");
}

#[test]
fn inheritance_cycle_is_rejected() {
    let mut model = com_model();
    model.new_interface("IA", Some("IB"), None).unwrap();
    model.new_interface("IB", Some("IA"), None).unwrap();
    let err = model.resolve().unwrap_err();
    assert!(
        err.iter().any(|e| matches!(
            e,
            ModelError::InheritanceCycle { interface, chain } if interface == "IA" && chain == &["IA", "IB", "IA"]
        )),
        "got: {err}"
    );
}

#[test]
fn base_must_be_an_interface() {
    let mut model = com_model();
    model.new_struct("WIDGET_DESC", vec![]).unwrap();
    model.new_interface("IWidget", Some("WIDGET_DESC"), None).unwrap();
    let err = model.resolve().unwrap_err();
    assert_eq!(
        err,
        ModelError::BaseNotInterface {
            interface: "IWidget".into(),
            base: "WIDGET_DESC".into(),
        }
    );
}

#[test]
fn type_aliases_expand_at_resolution() {
    let mut model = com_model();
    model.add_type_alias("D3D11_RECT", ty("RECT"));
    model.add_type_alias("PRECT", ty("RECT*"));
    model
        .new_struct(
            "D3D11_VIEWPORT_RECTS",
            vec![
                FieldSpec::new("Main", ty("D3D11_RECT")),
                FieldSpec::new("Extra", ty("PRECT")),
            ],
        )
        .unwrap();
    model
        .new_struct(
            "RECT",
            vec![
                FieldSpec::new("left", ty("LONG")),
                FieldSpec::new("right", ty("LONG")),
            ],
        )
        .unwrap();

    let resolved = model.resolve().unwrap();
    let rects = resolved.structure("D3D11_VIEWPORT_RECTS").unwrap();
    assert!(
        matches!(&rects.fields[0].ty, ResolvedType::Named { native, .. } if native == "RECT"),
        "got: {:?}",
        rects.fields[0].ty
    );
    assert_eq!(rects.fields[1].ty.peel_pointers().0, 1);
    assert!(resolved.type_map().get("D3D11_RECT").is_none());
}

#[test]
fn access_points_resolve_like_methods() {
    let mut model = com_model();
    model
        .new_interface("ID3D11Device", Some("IUnknown"), None)
        .unwrap();
    model
        .new_access_point(AccessPointSpec {
            name: "D3D11CreateDevice".into(),
            library: "d3d11.dll".into(),
            entry_point: None,
            call_conv: Default::default(),
            return_type: ty("HRESULT"),
            params: vec![
                ParamSpec::new("SDKVersion", ty("UINT")),
                ParamSpec::new("ppDevice", ty("ID3D11Device**")).out(),
            ],
        })
        .unwrap();

    let resolved = model.resolve().unwrap();
    let create = resolved.access_point("D3D11CreateDevice").unwrap();
    assert_eq!(create.entry_point, "D3D11CreateDevice");
    assert_eq!(create.params[0].nice_name, "sdkVersion");
    assert_eq!(create.params[1].nice_name, "device");
    assert_eq!(
        create.params[1].marshal,
        Marshal::Interface { ownership: Ownership::Owned }
    );
    assert!(resolved.type_map().get("D3D11CreateDevice").is_none());
}

#[test]
fn resolved_model_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ResolvedModel>();

    let mut model = com_model();
    let id = model
        .new_interface("ID3D11Device", Some("IUnknown"), None)
        .unwrap();
    model.new_method(id, MethodSpec::new("CreateBuffer")).unwrap();
    let resolved = model.resolve().unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let vtable = resolved.vtable("ID3D11Device").unwrap();
                assert_eq!(vtable.len(), 4);
                assert_eq!(resolved.type_map().resolve("ID3D11Device").unwrap(), "Device");
            });
        }
    });
}
