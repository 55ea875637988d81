//! The path-addressed field store.
//!
//! A [`Layer`] is a shared handle to one scene-description document: a flat
//! map from [`Path`] to a typed spec carrying named fields. Specs are thin
//! views over this store; presence of a field at a path implies the spec at
//! that path exists. Mutations are batched by [`ChangeBlock`]s: a nestable,
//! RAII scope that coalesces change notification until the outermost block
//! exits.

use crate::path::Path;
use crate::value::{Dict, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Well-known field names.
pub mod fields {
    pub const DEFAULT: &str = "default";
    pub const TYPE_NAME: &str = "typeName";
    pub const VARIABILITY: &str = "variability";
    pub const CUSTOM: &str = "custom";
    pub const DOCUMENTATION: &str = "documentation";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const DISPLAY_GROUP: &str = "displayGroup";
    pub const HIDDEN: &str = "hidden";
    pub const PERMISSION: &str = "permission";
    pub const PREFIX: &str = "prefix";
    pub const SUFFIX: &str = "suffix";
    pub const SYMMETRIC_PEER: &str = "symmetricPeer";
    pub const SYMMETRY_ARGS: &str = "symmetryArgs";
    pub const SYMMETRY_FUNCTION: &str = "symmetryFunction";
    pub const CUSTOM_DATA: &str = "customData";
    pub const ASSET_INFO: &str = "assetInfo";
    pub const ALLOWED_TOKENS: &str = "allowedTokens";
    pub const DISPLAY_UNIT: &str = "displayUnit";
    pub const COLOR_SPACE: &str = "colorSpace";
    pub const TIME_SAMPLES: &str = "timeSamples";
    pub const CONNECTION_PATHS: &str = "connectionPaths";
    pub const TARGET_PATHS: &str = "targetPaths";
    pub const MARKER: &str = "marker";
    pub const RELATIONAL_ATTRIBUTE_ORDER: &str = "relationalAttributeOrder";
    pub const NO_LOAD_HINT: &str = "noLoadHint";
    pub const SPECIFIER: &str = "specifier";

    // Layer metadata.
    pub const START_FRAME: &str = "startFrame";
    pub const END_FRAME: &str = "endFrame";
    pub const FRAMES_PER_SECOND: &str = "framesPerSecond";
    pub const FRAME_PRECISION: &str = "framePrecision";

    // Composition-arc and scenegraph-population fields. Meaningless or
    // dangerous as schema fallback values; see
    // `schema::registry::is_disallowed_field`.
    pub const INHERIT_PATHS: &str = "inheritPaths";
    pub const PAYLOAD: &str = "payload";
    pub const REFERENCES: &str = "references";
    pub const SPECIALIZES: &str = "specializes";
    pub const VARIANT_SELECTION: &str = "variantSelection";
    pub const VARIANT_SET_NAMES: &str = "variantSetNames";
    pub const ACTIVE: &str = "active";
    pub const INSTANCEABLE: &str = "instanceable";
    pub const CLIPS: &str = "clips";
}

/// SpecType identifies the kind of object a spec denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecType {
    Prim,
    Attribute,
    Relationship,
    RelationshipTarget,
    Connection,
    Mapper,
}

/// SpecData is the stored representation of one spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecData {
    #[serde(rename = "type")]
    pub spec_type: SpecType,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl SpecData {
    fn new(spec_type: SpecType) -> Self {
        SpecData {
            spec_type,
            fields: BTreeMap::new(),
        }
    }
}

/// LayerError represents a failure to read or write a serialized layer.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LayerData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    identifier: String,

    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    metadata: Dict,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    specs: BTreeMap<Path, SpecData>,

    #[serde(skip)]
    read_only: bool,

    #[serde(skip)]
    change_depth: u32,

    #[serde(skip)]
    pending_changes: Vec<Path>,

    #[serde(skip)]
    flushed_changes: Vec<Path>,

    #[serde(skip)]
    version: u64,
}

impl LayerData {
    fn record_change(&mut self, path: Path) {
        if self.change_depth > 0 {
            self.pending_changes.push(path);
        } else {
            self.flushed_changes.push(path);
            self.version += 1;
        }
    }
}

/// Layer is a cheaply-cloneable shared handle to one document.
#[derive(Debug, Clone)]
pub struct Layer {
    data: Arc<Mutex<LayerData>>,
}

impl Layer {
    /// Creates an empty anonymous layer.
    pub fn create_anonymous(tag: impl Into<String>) -> Layer {
        Layer {
            data: Arc::new(Mutex::new(LayerData {
                identifier: tag.into(),
                ..Default::default()
            })),
        }
    }

    /// Returns true if two handles refer to the same layer.
    pub fn same_layer(&self, other: &Layer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn identifier(&self) -> String {
        self.data.lock().unwrap().identifier.clone()
    }

    /// Marks the whole layer read-only; every edit permission check fails.
    pub fn set_read_only(&self, read_only: bool) {
        self.data.lock().unwrap().read_only = read_only;
    }

    /// Returns true if the spec at `path` may be edited: the layer is
    /// writable and the spec does not carry a private permission.
    pub fn permission_to_edit(&self, path: &Path) -> bool {
        let data = self.data.lock().unwrap();
        if data.read_only {
            return false;
        }
        match data.specs.get(path) {
            Some(spec) => {
                spec.fields.get(fields::PERMISSION).and_then(Value::as_str) != Some("private")
            }
            None => true,
        }
    }

    /// Creates a spec at `path`. The parent object must already exist
    /// (root-level prims hang off the implicit pseudo-root). Returns false
    /// and posts a coding error on failure; creating an existing spec of the
    /// same type is a successful no-op.
    pub fn create_spec(&self, path: &Path, spec_type: SpecType) -> bool {
        if path.is_empty() {
            crate::coding_error!("cannot create spec at the empty path");
            return false;
        }
        let mut data = self.data.lock().unwrap();
        if data.read_only {
            crate::coding_error!("layer '{}' is read-only", data.identifier);
            return false;
        }
        if let Some(existing) = data.specs.get(path) {
            return existing.spec_type == spec_type;
        }
        let parent = path.parent();
        if !parent.is_empty() && parent != Path::absolute_root() && !data.specs.contains_key(&parent)
        {
            crate::coding_error!("cannot create spec at <{}>: parent <{}> does not exist", path, parent);
            return false;
        }
        data.specs.insert(path.clone(), SpecData::new(spec_type));
        data.record_change(path.clone());
        true
    }

    /// Erases the spec at `path` and all of its descendants.
    pub fn erase_spec(&self, path: &Path) -> bool {
        let mut data = self.data.lock().unwrap();
        if !data.specs.contains_key(path) {
            return false;
        }
        let doomed: Vec<Path> = data
            .specs
            .keys()
            .filter(|p| p.has_prefix(path))
            .cloned()
            .collect();
        for p in doomed {
            data.specs.remove(&p);
            data.record_change(p);
        }
        true
    }

    /// Returns the spec type at `path`, if a spec exists there.
    pub fn spec_type(&self, path: &Path) -> Option<SpecType> {
        self.data.lock().unwrap().specs.get(path).map(|s| s.spec_type)
    }

    pub fn has_spec(&self, path: &Path) -> bool {
        self.spec_type(path).is_some()
    }

    /// Returns the paths of all specs, in path order.
    pub fn spec_paths(&self) -> Vec<Path> {
        self.data.lock().unwrap().specs.keys().cloned().collect()
    }

    /// Returns the paths of all specs under (and excluding) `root`.
    pub fn spec_paths_under(&self, root: &Path) -> Vec<Path> {
        self.data
            .lock()
            .unwrap()
            .specs
            .keys()
            .filter(|p| *p != root && p.has_prefix(root))
            .cloned()
            .collect()
    }

    /// Returns the root-level prim paths, in path order.
    pub fn root_prim_paths(&self) -> Vec<Path> {
        self.data
            .lock()
            .unwrap()
            .specs
            .keys()
            .filter(|p| p.is_prim_path() && p.parent() == Path::absolute_root())
            .cloned()
            .collect()
    }

    pub fn has_field(&self, path: &Path, field: &str) -> bool {
        self.data
            .lock()
            .unwrap()
            .specs
            .get(path)
            .is_some_and(|s| s.fields.contains_key(field))
    }

    pub fn get_field(&self, path: &Path, field: &str) -> Option<Value> {
        self.data
            .lock()
            .unwrap()
            .specs
            .get(path)
            .and_then(|s| s.fields.get(field).cloned())
    }

    /// Returns the field names authored at `path`, in name order.
    pub fn list_fields(&self, path: &Path) -> Vec<String> {
        self.data
            .lock()
            .unwrap()
            .specs
            .get(path)
            .map(|s| s.fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sets a field at `path`. The spec must exist; setting a field to its
    /// current value is a successful no-op.
    pub fn set_field(&self, path: &Path, field: &str, value: Value) -> bool {
        let mut data = self.data.lock().unwrap();
        if data.read_only {
            crate::coding_error!("layer '{}' is read-only", data.identifier);
            return false;
        }
        let Some(spec) = data.specs.get_mut(path) else {
            crate::coding_error!("cannot set field '{}': no spec at <{}>", field, path);
            return false;
        };
        if spec.fields.get(field) == Some(&value) {
            return true;
        }
        spec.fields.insert(field.to_string(), value);
        data.record_change(path.clone());
        true
    }

    /// Erases a field at `path`. Erasing an absent field is a no-op.
    pub fn erase_field(&self, path: &Path, field: &str) -> bool {
        let mut data = self.data.lock().unwrap();
        let Some(spec) = data.specs.get_mut(path) else {
            return false;
        };
        if spec.fields.remove(field).is_none() {
            return false;
        }
        data.record_change(path.clone());
        true
    }

    /// Looks up a dictionary field sub-value by a `:`-separated key path.
    pub fn get_field_dict_value(&self, path: &Path, field: &str, key_path: &str) -> Option<Value> {
        match self.get_field(path, field)? {
            Value::Dict(dict) => dict.get_at(key_path).cloned(),
            _ => None,
        }
    }

    pub fn has_field_dict_key(&self, path: &Path, field: &str, key_path: &str) -> bool {
        self.get_field_dict_value(path, field, key_path).is_some()
    }

    /// Sets one key of a dictionary field without rewriting the whole
    /// dictionary. Creates the dictionary (and intermediates) as needed.
    pub fn set_field_dict_value(
        &self,
        path: &Path,
        field: &str,
        key_path: &str,
        value: Value,
    ) -> bool {
        let mut data = self.data.lock().unwrap();
        if data.read_only {
            crate::coding_error!("layer '{}' is read-only", data.identifier);
            return false;
        }
        let Some(spec) = data.specs.get_mut(path) else {
            crate::coding_error!("cannot set field '{}': no spec at <{}>", field, path);
            return false;
        };
        let entry = spec
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Dict(Dict::new()));
        if !matches!(entry, Value::Dict(_)) {
            *entry = Value::Dict(Dict::new());
        }
        if let Value::Dict(dict) = entry {
            dict.set_at(key_path, value);
        }
        data.record_change(path.clone());
        true
    }

    /// Erases one key of a dictionary field. The field itself is removed if
    /// the dictionary becomes empty.
    pub fn erase_field_dict_value(&self, path: &Path, field: &str, key_path: &str) -> bool {
        let mut data = self.data.lock().unwrap();
        let Some(spec) = data.specs.get_mut(path) else {
            return false;
        };
        let Some(Value::Dict(dict)) = spec.fields.get_mut(field) else {
            return false;
        };
        if !dict.erase_at(key_path) {
            return false;
        }
        if dict.is_empty() {
            spec.fields.remove(field);
        }
        data.record_change(path.clone());
        true
    }

    pub fn metadata_field(&self, name: &str) -> Option<Value> {
        self.data.lock().unwrap().metadata.get(name).cloned()
    }

    pub fn set_metadata_field(&self, name: &str, value: Value) {
        let mut data = self.data.lock().unwrap();
        data.metadata.set(name, value);
        data.record_change(Path::absolute_root());
    }

    /// Returns the full spec data at `path`, if any. Used by the schema
    /// merge and stitch utilities for whole-spec copies.
    pub fn spec_data(&self, path: &Path) -> Option<SpecData> {
        self.data.lock().unwrap().specs.get(path).cloned()
    }

    /// Monotonic count of flushed change batches.
    pub fn version(&self) -> u64 {
        self.data.lock().unwrap().version
    }

    /// Drains the changed paths delivered since the last call. Changes made
    /// inside a change block are delivered only when the outermost block
    /// exits.
    pub fn take_recent_changes(&self) -> Vec<Path> {
        std::mem::take(&mut self.data.lock().unwrap().flushed_changes)
    }

    /// Serializes this layer to pretty JSON.
    pub fn to_json(&self) -> Result<String, LayerError> {
        let data = self.data.lock().unwrap();
        Ok(serde_json::to_string_pretty(&*data)?)
    }

    /// Reads a layer from JSON.
    pub fn from_json(json: &str) -> Result<Layer, LayerError> {
        let data: LayerData = serde_json::from_str(json)?;
        Ok(Layer {
            data: Arc::new(Mutex::new(data)),
        })
    }

    /// Serializes this layer to YAML.
    pub fn to_yaml(&self) -> Result<String, LayerError> {
        let data = self.data.lock().unwrap();
        Ok(serde_yaml::to_string(&*data)?)
    }

    /// Reads a layer from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Layer, LayerError> {
        let data: LayerData = serde_yaml::from_str(yaml)?;
        Ok(Layer {
            data: Arc::new(Mutex::new(data)),
        })
    }
}

/// ChangeBlock defers change-notification delivery until the outermost block
/// exits. Blocks nest; the flush runs on every exit path.
#[derive(Debug)]
pub struct ChangeBlock {
    layer: Layer,
}

impl ChangeBlock {
    pub fn new(layer: &Layer) -> Self {
        layer.data.lock().unwrap().change_depth += 1;
        ChangeBlock {
            layer: layer.clone(),
        }
    }
}

impl Drop for ChangeBlock {
    fn drop(&mut self) {
        let mut data = self.layer.data.lock().unwrap();
        data.change_depth -= 1;
        if data.change_depth == 0 && !data.pending_changes.is_empty() {
            let pending = std::mem::take(&mut data.pending_changes);
            data.flushed_changes.extend(pending);
            data.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::path;

    #[test]
    fn test_create_spec_requires_parent() {
        let layer = Layer::create_anonymous("test");
        assert!(layer.create_spec(&path("/Foo"), SpecType::Prim));
        assert!(layer.create_spec(&path("/Foo/Bar"), SpecType::Prim));

        let mark = crate::diag::ErrorMark::new();
        assert!(!layer.create_spec(&path("/Nope/Child"), SpecType::Prim));
        assert_eq!(mark.count(), 1);
    }

    #[test]
    fn test_field_roundtrip_and_noop_set() {
        let layer = Layer::create_anonymous("test");
        layer.create_spec(&path("/Foo"), SpecType::Prim);
        layer.take_recent_changes();

        assert!(layer.set_field(&path("/Foo"), fields::DOCUMENTATION, Value::String("doc".into())));
        assert_eq!(
            layer.get_field(&path("/Foo"), fields::DOCUMENTATION),
            Some(Value::String("doc".into()))
        );
        let v1 = layer.version();

        // Setting a field to its current value is a silent no-op.
        assert!(layer.set_field(&path("/Foo"), fields::DOCUMENTATION, Value::String("doc".into())));
        assert_eq!(layer.version(), v1);

        assert!(layer.erase_field(&path("/Foo"), fields::DOCUMENTATION));
        assert!(!layer.has_field(&path("/Foo"), fields::DOCUMENTATION));
        assert!(!layer.erase_field(&path("/Foo"), fields::DOCUMENTATION));
    }

    #[test]
    fn test_set_field_without_spec_is_coding_error() {
        let layer = Layer::create_anonymous("test");
        let mark = crate::diag::ErrorMark::new();
        assert!(!layer.set_field(&path("/Foo"), fields::HIDDEN, Value::Bool(true)));
        assert_eq!(mark.count(), 1);
    }

    #[test]
    fn test_dict_key_field_access() {
        let layer = Layer::create_anonymous("test");
        layer.create_spec(&path("/Foo"), SpecType::Prim);

        assert!(layer.set_field_dict_value(
            &path("/Foo"),
            fields::CUSTOM_DATA,
            "a:b",
            Value::Int(1)
        ));
        assert!(layer.has_field_dict_key(&path("/Foo"), fields::CUSTOM_DATA, "a:b"));
        assert_eq!(
            layer.get_field_dict_value(&path("/Foo"), fields::CUSTOM_DATA, "a:b"),
            Some(Value::Int(1))
        );

        assert!(layer.erase_field_dict_value(&path("/Foo"), fields::CUSTOM_DATA, "a:b"));
        // Erasing the last key removes the field entirely.
        assert!(!layer.has_field(&path("/Foo"), fields::CUSTOM_DATA));
    }

    #[test]
    fn test_erase_spec_removes_descendants() {
        let layer = Layer::create_anonymous("test");
        layer.create_spec(&path("/Foo"), SpecType::Prim);
        layer.create_spec(&path("/Foo/Bar"), SpecType::Prim);
        layer.create_spec(&path("/Foo/Bar.attr"), SpecType::Attribute);

        assert!(layer.erase_spec(&path("/Foo")));
        assert!(!layer.has_spec(&path("/Foo/Bar.attr")));
        assert!(layer.spec_paths().is_empty());
    }

    #[test]
    fn test_change_block_batches_notifications() {
        let layer = Layer::create_anonymous("test");
        {
            let _outer = ChangeBlock::new(&layer);
            {
                let _inner = ChangeBlock::new(&layer);
                layer.create_spec(&path("/Foo"), SpecType::Prim);
                layer.create_spec(&path("/Bar"), SpecType::Prim);
            }
            // Still batched: the outer block has not exited.
            assert!(layer.take_recent_changes().is_empty());
        }
        let changes = layer.take_recent_changes();
        assert_eq!(changes, vec![path("/Foo"), path("/Bar")]);
        assert_eq!(layer.version(), 1);
    }

    #[test]
    fn test_read_only_layer_rejects_edits() {
        let layer = Layer::create_anonymous("test");
        layer.create_spec(&path("/Foo"), SpecType::Prim);
        layer.set_read_only(true);

        assert!(!layer.permission_to_edit(&path("/Foo")));
        let mark = crate::diag::ErrorMark::new();
        assert!(!layer.set_field(&path("/Foo"), fields::HIDDEN, Value::Bool(true)));
        assert_eq!(mark.count(), 1);
    }

    #[test]
    fn test_private_permission_blocks_spec_edit() {
        let layer = Layer::create_anonymous("test");
        layer.create_spec(&path("/Foo"), SpecType::Prim);
        layer.create_spec(&path("/Foo.attr"), SpecType::Attribute);
        layer.set_field(&path("/Foo.attr"), fields::PERMISSION, Value::Token("private".into()));

        assert!(!layer.permission_to_edit(&path("/Foo.attr")));
        assert!(layer.permission_to_edit(&path("/Foo")));
    }

    #[test]
    fn test_json_roundtrip() {
        let layer = Layer::create_anonymous("test");
        layer.create_spec(&path("/Foo"), SpecType::Prim);
        layer.create_spec(&path("/Foo.size"), SpecType::Attribute);
        layer.set_field(&path("/Foo.size"), fields::TYPE_NAME, Value::Token("double".into()));
        layer.set_metadata_field(fields::START_FRAME, Value::Double(1.0));

        let json = layer.to_json().unwrap();
        let back = Layer::from_json(&json).unwrap();
        assert_eq!(back.spec_type(&path("/Foo.size")), Some(SpecType::Attribute));
        assert_eq!(
            back.get_field(&path("/Foo.size"), fields::TYPE_NAME),
            Some(Value::Token("double".into()))
        );
        assert_eq!(back.metadata_field(fields::START_FRAME), Some(Value::Double(1.0)));
    }
}
