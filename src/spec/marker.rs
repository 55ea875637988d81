//! Per-connection and per-target marker strings.
//!
//! A marker is a short annotation attached to one connection path of an
//! attribute or one target path of a relationship. The algorithm is the same
//! for both; a [`MarkerPolicy`] supplies the spec-kind specifics: the child
//! spec type, a path-validity predicate, and registration of newly annotated
//! paths in the owning edit list.
//!
//! An empty marker string means "no marker": setting an empty marker clears.
//! Markers live in the `marker` field of the child spec at the annotated
//! path; clearing a marker never deletes the child spec, which may still
//! host a connection or target in its own right.

use std::collections::BTreeMap;

use crate::layer::{fields, ChangeBlock, SpecType};
use crate::path::Path;
use crate::spec::{AttributeSpec, PropertySpecExt, RelationshipSpec, Spec};
use crate::value::Value;

/// MarkerPolicy supplies the spec-kind-specific pieces of the marker
/// algorithm.
pub trait MarkerPolicy {
    type Owner: PropertySpecExt;

    /// The spec type of the child spec hosting the marker field.
    const CHILD_SPEC_TYPE: SpecType;

    /// Human-readable kind name for diagnostics.
    fn description() -> &'static str;

    /// Returns true if `path` may carry a marker of this kind. The path has
    /// already been made absolute.
    fn is_valid_path(path: &Path) -> bool;

    /// Registers a newly annotated path in the owner's edit list.
    fn register_path(owner: &Self::Owner, path: &Path) -> bool;
}

/// Markers on attribute connection paths.
pub struct ConnectionMarkerPolicy;

impl MarkerPolicy for ConnectionMarkerPolicy {
    type Owner = AttributeSpec;

    const CHILD_SPEC_TYPE: SpecType = SpecType::Connection;

    fn description() -> &'static str {
        "connection"
    }

    fn is_valid_path(path: &Path) -> bool {
        path.is_property_path()
    }

    fn register_path(owner: &AttributeSpec, path: &Path) -> bool {
        owner.add_connection_path(path)
    }
}

/// Markers on relationship target paths.
pub struct TargetMarkerPolicy;

impl MarkerPolicy for TargetMarkerPolicy {
    type Owner = RelationshipSpec;

    const CHILD_SPEC_TYPE: SpecType = SpecType::RelationshipTarget;

    fn description() -> &'static str {
        "relationship target"
    }

    fn is_valid_path(path: &Path) -> bool {
        path.is_prim_path() || path.is_property_path()
    }

    fn register_path(owner: &RelationshipSpec, path: &Path) -> bool {
        owner.add_target_path(path)
    }
}

fn canonicalize<P: MarkerPolicy>(owner: &P::Owner, path: &Path) -> Path {
    path.make_absolute(&owner.owner_prim_path())
}

/// Returns the paths that actually carry a marker. Having a child spec does
/// not imply having a marker; only specs with an authored marker field count.
pub fn marker_paths<P: MarkerPolicy>(owner: &P::Owner) -> Vec<Path> {
    owner
        .layer()
        .spec_paths_under(owner.path())
        .into_iter()
        .filter(|p| {
            p.is_target_path() && owner.layer().has_field(p, fields::MARKER)
        })
        .filter_map(|p| p.target_path().cloned())
        .collect()
}

/// Returns the marker at `path`, or an empty string if none is authored.
pub fn marker<P: MarkerPolicy>(owner: &P::Owner, path: &Path) -> String {
    let path = canonicalize::<P>(owner, path);
    if path.is_empty() {
        return String::new();
    }
    let child = owner.path().append_target(&path);
    owner
        .layer()
        .get_field(&child, fields::MARKER)
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

/// Sets the marker at `path`, creating and registering the child spec on
/// first use. An empty marker clears instead.
pub fn set_marker<P: MarkerPolicy>(owner: &P::Owner, path: &Path, marker: &str) -> bool {
    if marker.is_empty() {
        return clear_marker::<P>(owner, path);
    }
    if !owner.permission_to_edit() {
        crate::coding_error!(
            "no permission to set {} marker on <{}>",
            P::description(),
            owner.path()
        );
        return false;
    }
    let path = canonicalize::<P>(owner, path);
    if path.is_empty() || !P::is_valid_path(&path) {
        crate::coding_error!(
            "cannot set marker on invalid {} path <{}>",
            P::description(),
            path
        );
        return false;
    }

    let _block = ChangeBlock::new(owner.layer());
    write_marker::<P>(owner, &path, marker)
}

/// Bulk-replaces the owner's markers with `markers`. Every path is validated
/// before any change is made: one invalid entry fails the whole call, posts
/// one coding error, and leaves the existing markers untouched. On success,
/// markers absent from the map are cleared and the rest set, inside one
/// change block. An empty value in the map clears that path's marker.
pub fn set_markers<P: MarkerPolicy>(
    owner: &P::Owner,
    markers: &BTreeMap<Path, String>,
) -> bool {
    if !owner.permission_to_edit() {
        crate::coding_error!(
            "no permission to set {} markers on <{}>",
            P::description(),
            owner.path()
        );
        return false;
    }
    let mut canonical: BTreeMap<Path, &str> = BTreeMap::new();
    for (path, marker) in markers {
        let path = canonicalize::<P>(owner, path);
        if path.is_empty() || !P::is_valid_path(&path) {
            crate::coding_error!(
                "cannot set marker on invalid {} path <{}>",
                P::description(),
                path
            );
            return false;
        }
        canonical.insert(path, marker.as_str());
    }

    let _block = ChangeBlock::new(owner.layer());
    for stale in marker_paths::<P>(owner) {
        if !canonical.contains_key(&stale) {
            owner
                .layer()
                .erase_field(&owner.path().append_target(&stale), fields::MARKER);
        }
    }
    for (path, marker) in &canonical {
        if marker.is_empty() {
            owner
                .layer()
                .erase_field(&owner.path().append_target(path), fields::MARKER);
        } else {
            write_marker::<P>(owner, path, marker);
        }
    }
    true
}

/// Clears the marker at `path`. A no-op on an empty path or an absent
/// marker; the child spec itself is left in place.
pub fn clear_marker<P: MarkerPolicy>(owner: &P::Owner, path: &Path) -> bool {
    if !owner.permission_to_edit() {
        crate::coding_error!(
            "no permission to clear {} marker on <{}>",
            P::description(),
            owner.path()
        );
        return false;
    }
    let path = canonicalize::<P>(owner, path);
    if path.is_empty() {
        return true;
    }
    let child = owner.path().append_target(&path);
    if owner.layer().has_field(&child, fields::MARKER) {
        owner.layer().erase_field(&child, fields::MARKER);
    }
    true
}

fn write_marker<P: MarkerPolicy>(owner: &P::Owner, path: &Path, marker: &str) -> bool {
    let child = owner.path().append_target(path);
    if !owner.layer().has_spec(&child) {
        if !owner.layer().create_spec(&child, P::CHILD_SPEC_TYPE) {
            return false;
        }
        P::register_path(owner, path);
    }
    owner
        .layer()
        .set_field(&child, fields::MARKER, Value::String(marker.into()))
}

impl AttributeSpec {
    /// Connection paths that carry a marker.
    pub fn connection_marker_paths(&self) -> Vec<Path> {
        marker_paths::<ConnectionMarkerPolicy>(self)
    }

    pub fn connection_marker(&self, connection: &Path) -> String {
        marker::<ConnectionMarkerPolicy>(self, connection)
    }

    pub fn set_connection_marker(&self, connection: &Path, marker: &str) -> bool {
        set_marker::<ConnectionMarkerPolicy>(self, connection, marker)
    }

    pub fn set_connection_markers(&self, markers: &BTreeMap<Path, String>) -> bool {
        set_markers::<ConnectionMarkerPolicy>(self, markers)
    }

    pub fn clear_connection_marker(&self, connection: &Path) -> bool {
        clear_marker::<ConnectionMarkerPolicy>(self, connection)
    }
}

impl RelationshipSpec {
    /// Target paths that carry a marker.
    pub fn target_marker_paths(&self) -> Vec<Path> {
        marker_paths::<TargetMarkerPolicy>(self)
    }

    pub fn target_marker(&self, target: &Path) -> String {
        marker::<TargetMarkerPolicy>(self, target)
    }

    pub fn set_target_marker(&self, target: &Path, marker: &str) -> bool {
        set_marker::<TargetMarkerPolicy>(self, target, marker)
    }

    pub fn set_target_markers(&self, markers: &BTreeMap<Path, String>) -> bool {
        set_markers::<TargetMarkerPolicy>(self, markers)
    }

    pub fn clear_target_marker(&self, target: &Path) -> bool {
        clear_marker::<TargetMarkerPolicy>(self, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::ErrorMark;
    use crate::layer::Layer;
    use crate::path::path;
    use crate::spec::{PrimSpec, Variability};
    use pretty_assertions::assert_eq;

    fn relationship() -> (Layer, RelationshipSpec) {
        let layer = Layer::create_anonymous("marker-test");
        let prim = PrimSpec::new(&layer, &path("/Foo")).unwrap();
        let rel = RelationshipSpec::new(&prim, "rel", false, Variability::Uniform).unwrap();
        (layer, rel)
    }

    fn attribute() -> (Layer, AttributeSpec) {
        let layer = Layer::create_anonymous("marker-test");
        let prim = PrimSpec::new(&layer, &path("/Foo")).unwrap();
        let attr =
            AttributeSpec::new(&prim, "attr", "double", Variability::Varying, false).unwrap();
        (layer, attr)
    }

    #[test]
    fn test_marker_roundtrip() {
        let (_, rel) = relationship();
        let target = path("/Bar");

        assert!(rel.set_target_marker(&target, "final"));
        assert_eq!(rel.target_marker(&target), "final");
        assert_eq!(rel.target_marker_paths(), [target.clone()]);

        // Setting the marker registered the target in the edit list.
        assert_eq!(rel.target_paths(), [target.clone()]);

        // Empty marker clears.
        assert!(rel.set_target_marker(&target, ""));
        assert_eq!(rel.target_marker(&target), "");
        assert!(rel.target_marker_paths().is_empty());
    }

    #[test]
    fn test_clear_keeps_child_spec() {
        let (layer, rel) = relationship();
        let target = path("/Bar");
        rel.set_target_marker(&target, "final");

        let child = rel.path().append_target(&target);
        assert!(rel.clear_target_marker(&target));
        assert!(layer.has_spec(&child));
        assert!(!layer.has_field(&child, fields::MARKER));
    }

    #[test]
    fn test_child_spec_without_marker_is_not_listed() {
        let (_, rel) = relationship();
        rel.add_target_path(&path("/Bar"));
        rel.new_relational_attribute(&path("/Bar"), "w", "double", Variability::Varying, true)
            .unwrap();
        assert!(rel.target_marker_paths().is_empty());
    }

    #[test]
    fn test_set_markers_validates_all_before_applying() {
        let (_, rel) = relationship();
        rel.set_target_marker(&path("/Keep"), "original");

        let mut markers = BTreeMap::new();
        markers.insert(path("/Keep"), "replaced".to_string());
        markers.insert(path("/New"), "added".to_string());
        markers.insert(Path::empty(), "bad".to_string());

        let mark = ErrorMark::new();
        assert!(!rel.set_target_markers(&markers));
        assert_eq!(mark.count(), 1);

        // No partial application: the existing marker is untouched and the
        // valid new entry was not applied.
        assert_eq!(rel.target_marker(&path("/Keep")), "original");
        assert_eq!(rel.target_marker_paths(), [path("/Keep")]);
    }

    #[test]
    fn test_set_markers_replaces_wholesale() {
        let (_, rel) = relationship();
        rel.set_target_marker(&path("/Old"), "stale");

        let mut markers = BTreeMap::new();
        markers.insert(path("/A"), "one".to_string());
        markers.insert(path("/B"), "two".to_string());
        assert!(rel.set_target_markers(&markers));

        assert_eq!(rel.target_marker(&path("/Old")), "");
        assert_eq!(rel.target_marker(&path("/A")), "one");
        assert_eq!(rel.target_marker(&path("/B")), "two");
        assert_eq!(rel.target_marker_paths(), [path("/A"), path("/B")]);
    }

    #[test]
    fn test_connection_marker_requires_property_path() {
        let (_, attr) = attribute();

        let mark = ErrorMark::new();
        assert!(!attr.set_connection_marker(&path("/Bar"), "m"));
        assert_eq!(mark.count(), 1);

        assert!(attr.set_connection_marker(&path("/Bar.out"), "m"));
        assert_eq!(attr.connection_marker(&path("/Bar.out")), "m");
        assert_eq!(attr.connection_paths(), [path("/Bar.out")]);
    }

    #[test]
    fn test_relative_marker_path_anchors_to_owner_prim() {
        let (_, attr) = attribute();
        assert!(attr.set_connection_marker(&path("Child.out"), "m"));
        assert_eq!(attr.connection_marker(&path("/Foo/Child.out")), "m");
    }

    #[test]
    fn test_marker_query_on_empty_path_is_silent() {
        let (_, rel) = relationship();
        let mark = ErrorMark::new();
        assert_eq!(rel.target_marker(&Path::empty()), "");
        assert!(mark.is_clean());
    }

    #[test]
    fn test_read_only_layer_rejects_markers() {
        let (layer, rel) = relationship();
        layer.set_read_only(true);

        let mark = ErrorMark::new();
        assert!(!rel.set_target_marker(&path("/Bar"), "m"));
        assert!(!mark.is_clean());
    }
}
