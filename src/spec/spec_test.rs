use super::*;
use crate::diag::ErrorMark;
use crate::path::path;
use crate::value::{Role, ScalarKind};
use pretty_assertions::assert_eq;

fn layer_with_prim(prim: &str) -> (Layer, PrimSpec) {
    let layer = Layer::create_anonymous("spec-test");
    let prim = PrimSpec::new(&layer, &path(prim)).unwrap();
    (layer, prim)
}

#[test]
fn test_attribute_creation_stamps_required_fields() {
    let (layer, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "radius", "double", Variability::Varying, false).unwrap();

    assert_eq!(attr.name(), "radius");
    assert_eq!(attr.type_name(), "double");
    assert_eq!(attr.variability(), Variability::Varying);
    assert!(!attr.is_custom());
    assert!(attr.has_only_required_fields());

    let mut fields = layer.list_fields(attr.path());
    fields.sort();
    assert_eq!(fields, ["custom", "typeName", "variability"]);
}

#[test]
fn test_attribute_creation_validates_before_creating() {
    let (layer, prim) = layer_with_prim("/Foo");

    let mark = ErrorMark::new();
    assert!(AttributeSpec::new(&prim, "bad name", "double", Variability::Varying, false).is_none());
    assert_eq!(mark.count(), 1);

    let mark = ErrorMark::new();
    assert!(AttributeSpec::new(&prim, "attr", "noSuchType", Variability::Varying, false).is_none());
    assert_eq!(mark.count(), 1);

    // Nothing was created by the failed calls.
    assert!(layer.spec_paths_under(&path("/Foo")).is_empty());
}

#[test]
fn test_attribute_creation_on_missing_owner() {
    let (layer, prim) = layer_with_prim("/Foo");
    layer.erase_spec(prim.path());

    let mark = ErrorMark::new();
    assert!(AttributeSpec::new(&prim, "attr", "double", Variability::Varying, false).is_none());
    assert!(!mark.is_clean());
}

#[test]
fn test_existing_spec_of_same_type_is_reused() {
    let (_, prim) = layer_with_prim("/Foo");
    AttributeSpec::new(&prim, "attr", "double", Variability::Varying, false).unwrap();
    // Creating over an existing spec of the same type succeeds and
    // re-stamps the required fields.
    let again =
        AttributeSpec::new(&prim, "attr", "double", Variability::Uniform, true).unwrap();
    assert!(again.exists());
    assert_eq!(again.variability(), Variability::Uniform);
}

#[test]
fn test_set_default_value_coerces() {
    let (_, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "radius", "double", Variability::Varying, false).unwrap();

    assert!(attr.set_default_value(Value::Int(3)));
    assert_eq!(attr.default_value(), Some(Value::Double(3.0)));

    let mark = ErrorMark::new();
    assert!(!attr.set_default_value(Value::String("nope".into())));
    assert!(!mark.is_clean());
    assert_eq!(attr.default_value(), Some(Value::Double(3.0)));
}

#[test]
fn test_display_unit_falls_back_to_role_default() {
    let (_, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "width", "distance", Variability::Varying, false).unwrap();
    assert_eq!(attr.value_type().unwrap().role, Role::Distance);

    // No authored display unit: the role's default applies.
    assert_eq!(attr.display_unit(), Some(Unit::Centimeters));

    attr.set_display_unit(Unit::Meters);
    assert_eq!(attr.display_unit(), Some(Unit::Meters));

    // A role-less type has no fallback.
    let plain =
        AttributeSpec::new(&prim, "count", "int", Variability::Varying, false).unwrap();
    assert_eq!(plain.display_unit(), None);
}

#[test]
fn test_time_samples_coerce_to_declared_type() {
    let (_, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "radius", "double", Variability::Varying, false).unwrap();

    attr.set_time_sample(1.0, Value::Double(1.5));
    attr.set_time_sample(2.0, Value::Float(2.5));
    attr.set_time_sample(3.0, Value::Int(3));

    // Every stored sample holds the declared scalar kind.
    assert_eq!(attr.query_time_sample(1.0), Some(Value::Double(1.5)));
    assert_eq!(attr.query_time_sample(2.0), Some(Value::Double(2.5)));
    assert_eq!(attr.query_time_sample(3.0), Some(Value::Double(3.0)));
    assert_eq!(attr.time_sample_times(), [1.0, 2.0, 3.0]);

    let mark = ErrorMark::new();
    assert!(!attr.set_time_sample(4.0, Value::Token("t".into())));
    assert!(!mark.is_clean());
    assert_eq!(attr.query_time_sample(4.0), None);
}

#[test]
fn test_erase_time_sample_drops_field_when_empty() {
    let (_, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "radius", "double", Variability::Varying, false).unwrap();
    attr.set_time_sample(1.0, Value::Double(1.0));

    assert!(attr.erase_time_sample(1.0));
    assert!(!attr.has_field(fields::TIME_SAMPLES));
    assert!(!attr.erase_time_sample(1.0));
}

#[test]
fn test_connection_paths_are_anchored_to_owner_prim() {
    let (layer, prim) = layer_with_prim("/Foo");
    PrimSpec::new(&layer, &path("/Foo/Child")).unwrap();
    let attr =
        AttributeSpec::new(&prim, "out", "double", Variability::Varying, false).unwrap();

    attr.add_connection_path(&path("Child.in"));
    assert_eq!(attr.connection_paths(), [path("/Foo/Child.in")]);

    attr.add_connection_path(&path("/Bar.in"));
    attr.add_connection_path(&path("/Bar.in"));
    assert_eq!(
        attr.connection_paths(),
        [path("/Foo/Child.in"), path("/Bar.in")]
    );
}

#[test]
fn test_remove_connection_erases_child_spec() {
    let (layer, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "out", "double", Variability::Varying, false).unwrap();
    attr.add_connection_path(&path("/Bar.in"));

    let child = attr.path().append_target(&path("/Bar.in"));
    layer.create_spec(&child, SpecType::Connection);
    assert!(layer.has_spec(&child));

    attr.remove_connection_path(&path("/Bar.in"));
    assert!(!layer.has_spec(&child));
    assert!(attr.connection_paths().is_empty());
}

#[test]
fn test_relationship_targets() {
    let (_, prim) = layer_with_prim("/Foo");
    let rel = RelationshipSpec::new(&prim, "material", false, Variability::Uniform).unwrap();

    rel.add_target_path(&path("/Looks/Red"));
    rel.prepend_target_path(&path("/Looks/Blue"));
    assert_eq!(rel.target_paths(), [path("/Looks/Blue"), path("/Looks/Red")]);

    rel.remove_target_path(&path("/Looks/Red"));
    assert_eq!(rel.target_paths(), [path("/Looks/Blue")]);
    assert_eq!(
        rel.target_path_list().deleted_items(),
        [path("/Looks/Red")]
    );
}

#[test]
fn test_relational_attribute_does_not_register_target() {
    let (layer, prim) = layer_with_prim("/Foo");
    let rel = RelationshipSpec::new(&prim, "rig", false, Variability::Uniform).unwrap();

    let attr = rel
        .new_relational_attribute(&path("/Rig/Arm"), "weight", "double", Variability::Varying, true)
        .unwrap();
    assert_eq!(attr.name(), "weight");
    assert!(layer.has_spec(&rel.path().append_target(&path("/Rig/Arm"))));

    // The target spec exists but the edit list is untouched.
    assert!(rel.target_paths().is_empty());
    assert_eq!(rel.relational_attributes(&path("/Rig/Arm")).len(), 1);
}

#[test]
fn clear_appended_deletes_target_spec_still_in_prepended() {
    // A target held by both sub-lists loses its child spec when it is
    // removed from just one of them. Long-standing behavior that callers
    // depend on; the composed list still contains the target.
    let (layer, prim) = layer_with_prim("/Foo");
    let rel = RelationshipSpec::new(&prim, "rig", false, Variability::Uniform).unwrap();

    let target = path("/Rig/Arm");
    rel.prepend_target_path(&target);
    rel.set_target_appended_items(vec![target.clone()]);
    rel.new_relational_attribute(&target, "weight", "double", Variability::Varying, true)
        .unwrap();

    let target_spec = rel.path().append_target(&target);
    assert!(layer.has_spec(&target_spec));

    rel.set_target_appended_items(Vec::new());

    assert_eq!(rel.target_paths(), [target.clone()]);
    assert!(!layer.has_spec(&target_spec));
}

#[test]
fn test_read_only_layer_rejects_target_edits() {
    let (layer, prim) = layer_with_prim("/Foo");
    let rel = RelationshipSpec::new(&prim, "rig", false, Variability::Uniform).unwrap();
    layer.set_read_only(true);

    let mark = ErrorMark::new();
    assert!(!rel.add_target_path(&path("/Rig/Arm")));
    assert!(!mark.is_clean());
    assert!(rel.target_paths().is_empty());
}

#[test]
fn test_property_metadata_accessors() {
    let (_, prim) = layer_with_prim("/Foo");
    let attr =
        AttributeSpec::new(&prim, "radius", "double", Variability::Varying, false).unwrap();

    attr.set_documentation("sphere radius");
    attr.set_display_group("Geometry");
    attr.set_hidden(true);
    attr.set_custom_data_value("rig:source", Value::String("import".into()));

    assert_eq!(attr.documentation(), "sphere radius");
    assert_eq!(attr.display_group(), "Geometry");
    assert!(attr.hidden());
    assert_eq!(
        attr.custom_data().get_at("rig:source"),
        Some(&Value::String("import".into()))
    );
    assert!(!attr.has_only_required_fields());
}

#[test]
fn test_scenario_authoring_roundtrip() {
    let layer = Layer::create_anonymous("scenario");
    let foo = PrimSpec::new(&layer, &path("/Foo")).unwrap();
    foo.set_specifier(Specifier::Def);

    let attr =
        AttributeSpec::new(&foo, "attr", "double", Variability::Varying, false).unwrap();
    attr.set_time_sample(1.0, Value::Double(1.5));
    attr.set_time_sample(2.0, Value::Float(2.5));

    assert_eq!(
        attr.query_time_sample(1.0).and_then(|v| v.as_double()),
        Some(1.5)
    );
    let second = attr.query_time_sample(2.0).unwrap();
    assert_eq!(second.scalar_kind(), Some(ScalarKind::Double));
    assert_eq!(second.as_double(), Some(2.5));
}
