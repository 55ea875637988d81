//! Composed, cached prim definitions.
//!
//! A [`PrimDefinition`] is the read-only result of composing one prim type's
//! (or one API schema's) builtin properties: an ordered property-name list
//! plus an O(1) name-to-spec-path map into the shared schematics layer. The
//! registry builds one per schema at construction time; ad hoc composed
//! definitions are built on demand and owned by the caller.

use std::collections::BTreeMap;

use crate::layer::{fields, ChangeBlock, Layer, SpecType};
use crate::path::Path;
use crate::spec::Specifier;
use crate::value::Value;

/// PrimDefinition describes one prim type's builtin properties and metadata.
#[derive(Debug, Clone)]
pub struct PrimDefinition {
    layer: Layer,
    prim_spec_path: Path,
    properties: Vec<String>,
    property_paths: BTreeMap<String, Path>,
    applied_api_schemas: Vec<String>,
}

impl PrimDefinition {
    pub(crate) fn empty(layer: &Layer) -> PrimDefinition {
        PrimDefinition {
            layer: layer.clone(),
            prim_spec_path: Path::empty(),
            properties: Vec::new(),
            property_paths: BTreeMap::new(),
            applied_api_schemas: Vec::new(),
        }
    }

    /// Builds a definition directly from the prim spec at `prim_spec_path`
    /// in the schematics layer, taking every property spec beneath it.
    pub(crate) fn from_prim_spec(layer: &Layer, prim_spec_path: &Path) -> PrimDefinition {
        let mut def = PrimDefinition::empty(layer);
        def.prim_spec_path = prim_spec_path.clone();
        for path in layer.spec_paths_under(prim_spec_path) {
            if path.is_property_path() && path.parent() == *prim_spec_path {
                def.add_property(path.name().to_string(), path, true);
            }
        }
        def
    }

    /// Inserts a property. A name collision either keeps the existing entry
    /// or replaces its spec path in place, depending on `overwrite`; the
    /// property-name order never gains a duplicate.
    pub(crate) fn add_property(&mut self, name: String, spec_path: Path, overwrite: bool) {
        match self.property_paths.get_mut(&name) {
            Some(existing) => {
                if overwrite {
                    *existing = spec_path;
                }
            }
            None => {
                self.property_paths.insert(name.clone(), spec_path);
                self.properties.push(name);
            }
        }
    }

    /// Merges `weaker`'s properties into this definition without displacing
    /// any property already present.
    pub(crate) fn compose_weaker(&mut self, weaker: &PrimDefinition) {
        for name in &weaker.properties {
            if let Some(path) = weaker.property_paths.get(name) {
                self.add_property(name.clone(), path.clone(), false);
            }
        }
    }

    pub(crate) fn set_prim_spec_path(&mut self, path: Path) {
        self.prim_spec_path = path;
    }

    /// Records one applied schema identifier. A schema already recorded is
    /// not recorded again.
    pub(crate) fn push_applied_api_schema(&mut self, schema: &str) {
        if !self.applied_api_schemas.iter().any(|s| s == schema) {
            self.applied_api_schemas.push(schema.to_string());
        }
    }

    /// Ordered builtin property names, strongest first.
    pub fn property_names(&self) -> &[String] {
        &self.properties
    }

    /// API schema identifiers composed into this definition, strongest
    /// first. Multiple-apply entries carry their instance name suffix.
    pub fn applied_api_schemas(&self) -> &[String] {
        &self.applied_api_schemas
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property_paths.contains_key(name)
    }

    /// The schematics-layer spec path backing a builtin property.
    pub fn property_spec_path(&self, name: &str) -> Option<&Path> {
        self.property_paths.get(name)
    }

    pub fn property_spec_type(&self, name: &str) -> Option<SpecType> {
        self.layer.spec_type(self.property_paths.get(name)?)
    }

    /// A field of a builtin property, e.g. its fallback default value.
    pub fn property_field(&self, name: &str, field: &str) -> Option<Value> {
        self.layer.get_field(self.property_paths.get(name)?, field)
    }

    /// A dict-keyed lookup into a builtin property's field.
    pub fn property_field_dict_value(
        &self,
        name: &str,
        field: &str,
        key_path: &str,
    ) -> Option<Value> {
        self.layer
            .get_field_dict_value(self.property_paths.get(name)?, field, key_path)
    }

    /// A prim-level metadata field of the schema itself.
    pub fn prim_field(&self, field: &str) -> Option<Value> {
        if self.prim_spec_path.is_empty() {
            return None;
        }
        self.layer.get_field(&self.prim_spec_path, field)
    }

    pub fn documentation(&self) -> String {
        self.prim_field(fields::DOCUMENTATION)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    /// Materializes this definition as concrete spec data on `layer` at
    /// `path`: a prim spec with the given specifier plus one property spec
    /// per builtin, carrying the schematics fields. Returns false and posts
    /// a coding error if the prim spec cannot be created.
    pub fn flatten_to(&self, layer: &Layer, path: &Path, specifier: Specifier) -> bool {
        let _block = ChangeBlock::new(layer);
        if !layer.create_spec(path, SpecType::Prim) {
            return false;
        }
        layer.set_field(path, fields::SPECIFIER, Value::Token(specifier.token().into()));
        if let Some(type_name) = self.prim_field(fields::TYPE_NAME) {
            layer.set_field(path, fields::TYPE_NAME, type_name);
        }
        for name in &self.properties {
            let Some(source) = self.property_paths.get(name) else {
                continue;
            };
            let Some(data) = self.layer.spec_data(source) else {
                continue;
            };
            let dest = path.append_property(name);
            if !layer.create_spec(&dest, data.spec_type) {
                continue;
            }
            for (field, value) in data.fields {
                layer.set_field(&dest, &field, value);
            }
        }
        true
    }
}
