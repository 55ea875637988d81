use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use crate::diag::ErrorMark;
use crate::layer::{fields, Layer, SpecType};
use crate::path::path;
use crate::schema::plugin::{metadata, SchemaKind, SchemaPlugin, SchemaTypeDecl};
use crate::schema::registry::SchemaRegistry;
use crate::spec::{AttributeSpec, PrimSpec, Specifier, Variability};
use crate::value::{Dict, TimeCode, Value};

fn author_attr(prim: &PrimSpec, name: &str, default: f64) -> AttributeSpec {
    let attr =
        AttributeSpec::new(prim, name, "double", Variability::Varying, false).unwrap();
    attr.set_default_value(Value::Double(default));
    attr
}

fn decl(aliases: &[&str], bases: &[&str], kind: &str, metadata: Dict) -> SchemaTypeDecl {
    SchemaTypeDecl {
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        bases: bases.iter().map(|s| s.to_string()).collect(),
        kind: kind.to_string(),
        metadata,
    }
}

fn token_list(names: &[&str]) -> Value {
    Value::TokenList(names.iter().map(|s| s.to_string()).collect())
}

fn geom_plugin() -> SchemaPlugin {
    let layer = Layer::create_anonymous("geomSchema");
    let sphere = PrimSpec::new(&layer, &path("/Sphere")).unwrap();
    sphere.set_type_name("Sphere");
    sphere.set_specifier(Specifier::Class);
    // Disallowed as fallbacks; must not survive the merge.
    layer.set_field(&path("/Sphere"), fields::ACTIVE, Value::Bool(true));
    let radius = author_attr(&sphere, "radius", 1.0);
    radius.set_time_sample(0.0, Value::Double(1.0));

    let mut types = BTreeMap::new();
    types.insert(
        "UsdGeomXformable".to_string(),
        decl(&["Xformable"], &[], "abstractTyped", Dict::new()),
    );
    types.insert(
        "UsdGeomSphere".to_string(),
        decl(&["Sphere"], &["Xformable"], "concreteTyped", Dict::new()),
    );
    SchemaPlugin {
        name: "usdGeom".into(),
        types,
        generated_schema: Some(layer.to_json().unwrap()),
        ..SchemaPlugin::default()
    }
}

fn physics_plugin() -> SchemaPlugin {
    let layer = Layer::create_anonymous("physicsSchema");
    let physics = PrimSpec::new(&layer, &path("/PhysicsAPI")).unwrap();
    author_attr(&physics, "mass", 1.0);
    let a = PrimSpec::new(&layer, &path("/AAPI")).unwrap();
    author_attr(&a, "x", 1.0);
    let b = PrimSpec::new(&layer, &path("/BAPI")).unwrap();
    author_attr(&b, "x", 2.0);

    let mut physics_meta = Dict::new();
    physics_meta.set(
        metadata::API_SCHEMA_CAN_ONLY_APPLY_TO,
        token_list(&["Sphere"]),
    );

    let mut types = BTreeMap::new();
    types.insert(
        "UsdPhysicsAPI".to_string(),
        decl(&["PhysicsAPI"], &[], "singleApplyAPI", physics_meta),
    );
    types.insert(
        "TestAAPI".to_string(),
        decl(&["AAPI"], &[], "singleApplyAPI", Dict::new()),
    );
    types.insert(
        "TestBAPI".to_string(),
        decl(&["BAPI"], &[], "singleApplyAPI", Dict::new()),
    );
    SchemaPlugin {
        name: "usdPhysics".into(),
        types,
        generated_schema: Some(layer.to_json().unwrap()),
        ..SchemaPlugin::default()
    }
}

fn collection_plugin() -> SchemaPlugin {
    let layer = Layer::create_anonymous("collectionSchema");
    let collection = PrimSpec::new(&layer, &path("/CollectionAPI")).unwrap();
    author_attr(&collection, "bar", 0.0);
    let limited = PrimSpec::new(&layer, &path("/LimitedAPI")).unwrap();
    author_attr(&limited, "weight", 0.0);

    let mut collection_meta = Dict::new();
    collection_meta.set(
        metadata::PROPERTY_NAMESPACE_PREFIX,
        Value::Token("ns".into()),
    );
    let mut per_instance = Dict::new();
    per_instance.set("special", token_list(&["Sphere"]));
    collection_meta.set(
        metadata::API_SCHEMA_CAN_ONLY_APPLY_TO,
        Value::Dict(per_instance),
    );

    let mut limited_meta = Dict::new();
    limited_meta.set(
        metadata::PROPERTY_NAMESPACE_PREFIX,
        Value::Token("lim".into()),
    );
    limited_meta.set(
        metadata::API_SCHEMA_ALLOWED_INSTANCE_NAMES,
        token_list(&["red", "green"]),
    );

    let mut types = BTreeMap::new();
    types.insert(
        "UsdCollectionAPI".to_string(),
        decl(&["CollectionAPI"], &[], "multipleApplyAPI", collection_meta),
    );
    types.insert(
        "UsdLimitedAPI".to_string(),
        decl(&["LimitedAPI"], &[], "multipleApplyAPI", limited_meta),
    );
    SchemaPlugin {
        name: "usdCollection".into(),
        types,
        generated_schema: Some(layer.to_json().unwrap()),
        ..SchemaPlugin::default()
    }
}

fn lights_plugin() -> SchemaPlugin {
    let layer = Layer::create_anonymous("lightsSchema");
    let light = PrimSpec::new(&layer, &path("/LightAPI")).unwrap();
    author_attr(&light, "intensity", 1.0);

    let mut light_meta = Dict::new();
    light_meta.set(metadata::API_SCHEMA_AUTO_APPLY_TO, token_list(&["Xformable"]));

    let mut types = BTreeMap::new();
    types.insert(
        "UsdLuxLightAPI".to_string(),
        decl(&["LightAPI"], &[], "singleApplyAPI", light_meta),
    );
    SchemaPlugin {
        name: "usdLux".into(),
        types,
        generated_schema: Some(layer.to_json().unwrap()),
        ..SchemaPlugin::default()
    }
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::new(&[
        geom_plugin(),
        physics_plugin(),
        collection_plugin(),
        lights_plugin(),
    ])
}

#[test]
fn test_schema_kind_classification() {
    let registry = registry();
    assert_eq!(
        registry.get_schema_kind("PhysicsAPI"),
        Some(SchemaKind::SingleApplyApi)
    );
    assert!(registry.is_applied_api_schema("PhysicsAPI"));
    assert!(!registry.is_multiple_apply_api_schema("PhysicsAPI"));
    assert!(!registry.is_concrete("PhysicsAPI"));

    assert!(registry.is_concrete("Sphere"));
    assert!(registry.is_multiple_apply_api_schema("CollectionAPI"));
    assert_eq!(registry.get_schema_kind("NoSuchSchema"), None);
}

#[test]
fn test_type_name_duality_maps() {
    let registry = registry();
    assert_eq!(
        registry.get_type_from_schema_type_name("Sphere"),
        Some("UsdGeomSphere")
    );
    assert_eq!(
        registry.get_schema_type_name("UsdGeomSphere"),
        Some("Sphere")
    );
    assert_eq!(registry.get_type_from_schema_type_name("UsdGeomSphere"), None);
}

#[test]
fn test_merge_filters_disallowed_fields() {
    let registry = registry();
    let schematics = registry.schematics_layer();

    // The prim's specifier and type name survive; active does not.
    assert!(schematics.has_field(&path("/Sphere"), fields::SPECIFIER));
    assert!(schematics.has_field(&path("/Sphere"), fields::TYPE_NAME));
    assert!(!schematics.has_field(&path("/Sphere"), fields::ACTIVE));

    // Time samples are meaningless as fallbacks.
    assert!(schematics.has_field(&path("/Sphere.radius"), fields::DEFAULT));
    assert!(!schematics.has_field(&path("/Sphere.radius"), fields::TIME_SAMPLES));
}

#[test]
fn test_first_plugin_wins_on_root_prim_collision() {
    let first = geom_plugin();

    let layer = Layer::create_anonymous("rivalSchema");
    let sphere = PrimSpec::new(&layer, &path("/Sphere")).unwrap();
    author_attr(&sphere, "radius", 99.0);
    let rival = SchemaPlugin {
        name: "rival".into(),
        generated_schema: Some(layer.to_json().unwrap()),
        ..SchemaPlugin::default()
    };

    let registry = SchemaRegistry::new(&[first, rival]);
    assert_eq!(
        registry
            .schematics_layer()
            .get_field(&path("/Sphere.radius"), fields::DEFAULT),
        Some(Value::Double(1.0))
    );
}

#[test]
fn test_auto_apply_expands_to_derived_types() {
    let registry = registry();
    let auto_apply = registry.get_auto_apply_api_schemas();

    // The rule targets Xformable; Sphere derives from it.
    assert_eq!(auto_apply["Sphere"], ["LightAPI"]);
    assert_eq!(auto_apply["Xformable"], ["LightAPI"]);

    let sphere = registry.find_concrete_prim_definition("Sphere").unwrap();
    assert!(sphere.has_property("radius"));
    assert!(sphere.has_property("intensity"));
    assert_eq!(sphere.applied_api_schemas(), ["LightAPI"]);
}

#[test]
fn test_plugin_contributed_auto_apply_is_weaker() {
    let mut contributed = SchemaPlugin {
        name: "pipeline".into(),
        ..SchemaPlugin::default()
    };
    contributed
        .auto_apply_api_schemas
        .insert("PhysicsAPI".to_string(), vec!["Sphere".to_string()]);

    let registry = SchemaRegistry::new(&[
        geom_plugin(),
        physics_plugin(),
        lights_plugin(),
        contributed,
    ]);
    // Alphabetical amongst auto-applied schemas.
    assert_eq!(
        registry.get_auto_apply_api_schemas()["Sphere"],
        ["LightAPI", "PhysicsAPI"]
    );
    let sphere = registry.find_concrete_prim_definition("Sphere").unwrap();
    assert!(sphere.has_property("mass"));
    assert!(sphere.has_property("intensity"));
}

#[test]
fn test_multiple_apply_composition_namespaces_properties() {
    let registry = registry();
    let def = registry
        .build_composed_prim_definition("Sphere", &["CollectionAPI:foo".to_string()])
        .unwrap();

    assert!(def.has_property("ns:foo:bar"));
    assert!(!def.has_property("bar"));
    assert!(def.has_property("radius"));
    assert_eq!(
        def.property_field("ns:foo:bar", fields::DEFAULT),
        Some(Value::Double(0.0))
    );

    // Composing the same instance twice yields one property, not two, and
    // records the instance once.
    let twice = registry
        .build_composed_prim_definition(
            "Sphere",
            &["CollectionAPI:foo".to_string(), "CollectionAPI:foo".to_string()],
        )
        .unwrap();
    let count = twice
        .property_names()
        .iter()
        .filter(|n| *n == "ns:foo:bar")
        .count();
    assert_eq!(count, 1);
    assert_eq!(twice.applied_api_schemas(), ["LightAPI", "CollectionAPI:foo"]);
}

#[test]
fn test_reapplying_an_auto_applied_schema_is_recorded_once() {
    let registry = registry();
    // LightAPI is already auto-applied to Sphere; applying it explicitly
    // must not duplicate it in the applied list.
    let def = registry
        .build_composed_prim_definition("Sphere", &["LightAPI".to_string()])
        .unwrap();
    assert_eq!(def.applied_api_schemas(), ["LightAPI"]);
    assert!(def.has_property("intensity"));
}

#[test]
fn test_composition_precedence_tracks_list_order() {
    let registry = registry();

    let ab = registry
        .build_composed_prim_definition("Sphere", &["AAPI".to_string(), "BAPI".to_string()])
        .unwrap();
    assert_eq!(ab.property_field("x", fields::DEFAULT), Some(Value::Double(1.0)));

    let ba = registry
        .build_composed_prim_definition("Sphere", &["BAPI".to_string(), "AAPI".to_string()])
        .unwrap();
    assert_eq!(ba.property_field("x", fields::DEFAULT), Some(Value::Double(2.0)));
}

#[test]
fn test_composed_definition_requires_applied_schemas() {
    let registry = registry();
    let mark = ErrorMark::new();
    assert!(registry.build_composed_prim_definition("Sphere", &[]).is_none());
    assert_eq!(mark.count(), 1);
}

#[test]
fn test_multiple_apply_requires_instance_name() {
    let registry = registry();
    let mark = ErrorMark::new();
    let def = registry
        .build_composed_prim_definition("Sphere", &["CollectionAPI".to_string()])
        .unwrap();
    assert_eq!(mark.count(), 1);
    assert!(!def.has_property("bar"));
    assert!(def.has_property("radius"));
    // The failed entry is not recorded as applied.
    assert!(!def.applied_api_schemas().iter().any(|s| s == "CollectionAPI"));
}

#[test]
fn test_allowed_instance_names() {
    let registry = registry();

    // Not multiple-apply.
    assert!(!registry.is_allowed_api_schema_instance_name("PhysicsAPI", "foo"));

    // Unrestricted schema: any identifier goes, except a base-name
    // collision with the schema's own properties.
    assert!(registry.is_allowed_api_schema_instance_name("CollectionAPI", "foo"));
    assert!(registry.is_allowed_api_schema_instance_name("CollectionAPI", "foo:inner"));
    assert!(!registry.is_allowed_api_schema_instance_name("CollectionAPI", "bar"));
    assert!(!registry.is_allowed_api_schema_instance_name("CollectionAPI", "foo:bar"));
    assert!(!registry.is_allowed_api_schema_instance_name("CollectionAPI", ""));
    assert!(!registry.is_allowed_api_schema_instance_name("CollectionAPI", "1bad"));

    // Declared allowed-name set.
    assert!(registry.is_allowed_api_schema_instance_name("LimitedAPI", "red"));
    assert!(!registry.is_allowed_api_schema_instance_name("LimitedAPI", "blue"));
}

#[test]
fn test_can_only_apply_to() {
    let registry = registry();

    assert_eq!(
        registry.get_api_schema_can_only_apply_to_type_names("PhysicsAPI", ""),
        ["Sphere"]
    );
    // Instance-specific restriction wins; other instances are unrestricted.
    assert_eq!(
        registry.get_api_schema_can_only_apply_to_type_names("CollectionAPI", "special"),
        ["Sphere"]
    );
    assert!(registry
        .get_api_schema_can_only_apply_to_type_names("CollectionAPI", "other")
        .is_empty());
}

#[test]
fn test_api_definition_lookup() {
    let registry = registry();
    let physics = registry.find_applied_api_prim_definition("PhysicsAPI").unwrap();
    assert_eq!(physics.property_names(), ["mass"]);
    assert_eq!(
        physics.property_field("mass", fields::DEFAULT),
        Some(Value::Double(1.0))
    );
    assert!(registry.find_applied_api_prim_definition("Sphere").is_none());
}

#[test]
fn test_flatten_to_materializes_specs() {
    let registry = registry();
    let def = registry
        .build_composed_prim_definition("Sphere", &["PhysicsAPI".to_string()])
        .unwrap();

    let layer = Layer::create_anonymous("flattened");
    assert!(def.flatten_to(&layer, &path("/Ball"), Specifier::Def));

    assert_eq!(layer.spec_type(&path("/Ball")), Some(SpecType::Prim));
    assert_eq!(
        layer.get_field(&path("/Ball"), fields::TYPE_NAME),
        Some(Value::Token("Sphere".into()))
    );
    assert_eq!(
        layer.get_field(&path("/Ball"), fields::SPECIFIER),
        Some(Value::Token("def".into()))
    );
    assert_eq!(
        layer.get_field(&path("/Ball.radius"), fields::DEFAULT),
        Some(Value::Double(1.0))
    );
    assert_eq!(
        layer.get_field(&path("/Ball.mass"), fields::DEFAULT),
        Some(Value::Double(1.0))
    );
}

#[test]
fn test_registry_survives_time_sample_author() {
    // Authoring into a generated layer leaves TimeCode keys in the JSON;
    // the loader must round-trip them.
    let layer = Layer::create_anonymous("samples");
    let prim = PrimSpec::new(&layer, &path("/Foo")).unwrap();
    let attr = author_attr(&prim, "a", 0.0);
    attr.set_time_sample(1.5, Value::Double(3.0));

    let json = layer.to_json().unwrap();
    let back = Layer::from_json(&json).unwrap();
    let samples = back
        .get_field(&path("/Foo.a"), fields::TIME_SAMPLES)
        .and_then(|v| v.as_time_samples().cloned())
        .unwrap();
    assert_eq!(samples.get(&TimeCode(1.5)), Some(&Value::Double(3.0)));
}
