//! Typed spec views over the field store.
//!
//! A spec is a lightweight, non-owning handle: a layer plus a path. The
//! typed views here expose validated construction ([`AttributeSpec::new`],
//! [`RelationshipSpec::new`]) and typed accessors for the property metadata
//! fields. Validation always precedes creation: a failed factory posts a
//! coding error and leaves no partial spec behind.

pub mod marker;

use crate::layer::{fields, ChangeBlock, Layer, SpecType};
use crate::listop::ListOp;
use crate::path::{is_valid_namespaced_identifier, Path};
use crate::value::{
    find_value_type_name, Dict, TimeCode, TimeSampleMap, Unit, Value, ValueTypeName,
};
use serde::{Deserialize, Serialize};

/// Variability of an attribute's value over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variability {
    Varying,
    Uniform,
    Config,
    Computed,
}

impl Variability {
    pub fn token(self) -> &'static str {
        match self {
            Variability::Varying => "varying",
            Variability::Uniform => "uniform",
            Variability::Config => "config",
            Variability::Computed => "computed",
        }
    }

    pub fn from_token(token: &str) -> Option<Variability> {
        match token {
            "varying" => Some(Variability::Varying),
            "uniform" => Some(Variability::Uniform),
            "config" => Some(Variability::Config),
            "computed" => Some(Variability::Computed),
            _ => None,
        }
    }
}

/// Specifier of a prim spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn token(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }

    pub fn from_token(token: &str) -> Option<Specifier> {
        match token {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }
}

/// Spec is the common surface of all typed spec handles.
pub trait Spec {
    fn layer(&self) -> &Layer;
    fn path(&self) -> &Path;

    /// Returns true if the underlying spec still exists.
    fn exists(&self) -> bool {
        self.layer().has_spec(self.path())
    }

    fn permission_to_edit(&self) -> bool {
        self.layer().permission_to_edit(self.path())
    }

    fn get_field(&self, field: &str) -> Option<Value> {
        self.layer().get_field(self.path(), field)
    }

    fn has_field(&self, field: &str) -> bool {
        self.layer().has_field(self.path(), field)
    }

    fn set_field(&self, field: &str, value: Value) -> bool {
        self.layer().set_field(self.path(), field, value)
    }

    fn erase_field(&self, field: &str) -> bool {
        self.layer().erase_field(self.path(), field)
    }
}

macro_rules! string_field_accessors {
    ($get:ident, $set:ident, $field:expr) => {
        fn $get(&self) -> String {
            self.get_field($field)
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default()
        }

        fn $set(&self, value: impl Into<String>) -> bool {
            self.set_field($field, Value::String(value.into()))
        }
    };
}

/// PropertySpecExt is the shared metadata surface of attribute and
/// relationship specs.
pub trait PropertySpecExt: Spec {
    /// The property's name: the final path component.
    fn name(&self) -> String {
        self.path().name().to_string()
    }

    /// The path of the prim that owns this property.
    fn owner_prim_path(&self) -> Path {
        self.path().prim_path()
    }

    string_field_accessors!(documentation, set_documentation, fields::DOCUMENTATION);
    string_field_accessors!(display_name, set_display_name, fields::DISPLAY_NAME);
    string_field_accessors!(display_group, set_display_group, fields::DISPLAY_GROUP);
    string_field_accessors!(prefix, set_prefix, fields::PREFIX);
    string_field_accessors!(suffix, set_suffix, fields::SUFFIX);
    string_field_accessors!(symmetry_function, set_symmetry_function, fields::SYMMETRY_FUNCTION);

    fn hidden(&self) -> bool {
        self.get_field(fields::HIDDEN).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn set_hidden(&self, hidden: bool) -> bool {
        self.set_field(fields::HIDDEN, Value::Bool(hidden))
    }

    fn is_custom(&self) -> bool {
        self.get_field(fields::CUSTOM).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn variability(&self) -> Variability {
        self.get_field(fields::VARIABILITY)
            .and_then(|v| v.as_str().and_then(Variability::from_token))
            .unwrap_or(Variability::Varying)
    }

    fn symmetric_peer(&self) -> Option<Path> {
        self.get_field(fields::SYMMETRIC_PEER).and_then(|v| v.as_path().cloned())
    }

    fn set_symmetric_peer(&self, peer: &Path) -> bool {
        self.set_field(fields::SYMMETRIC_PEER, Value::Path(peer.clone()))
    }

    fn symmetry_args(&self) -> Dict {
        self.get_field(fields::SYMMETRY_ARGS)
            .and_then(|v| v.as_dict().cloned())
            .unwrap_or_default()
    }

    fn custom_data(&self) -> Dict {
        self.get_field(fields::CUSTOM_DATA)
            .and_then(|v| v.as_dict().cloned())
            .unwrap_or_default()
    }

    fn set_custom_data_value(&self, key_path: &str, value: Value) -> bool {
        self.layer()
            .set_field_dict_value(self.path(), fields::CUSTOM_DATA, key_path, value)
    }

    fn asset_info(&self) -> Dict {
        self.get_field(fields::ASSET_INFO)
            .and_then(|v| v.as_dict().cloned())
            .unwrap_or_default()
    }

    fn set_asset_info_value(&self, key_path: &str, value: Value) -> bool {
        self.layer()
            .set_field_dict_value(self.path(), fields::ASSET_INFO, key_path, value)
    }

    fn default_value(&self) -> Option<Value> {
        self.get_field(fields::DEFAULT)
    }

    /// Returns true if only the fields stamped at creation are authored.
    fn has_only_required_fields(&self) -> bool {
        self.layer().list_fields(self.path()).iter().all(|f| {
            matches!(f.as_str(), fields::CUSTOM | fields::TYPE_NAME | fields::VARIABILITY)
        })
    }
}

/// PrimSpec is a typed handle to a prim.
#[derive(Debug, Clone)]
pub struct PrimSpec {
    layer: Layer,
    path: Path,
}

impl Spec for PrimSpec {
    fn layer(&self) -> &Layer {
        &self.layer
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl PrimSpec {
    /// Creates a prim spec at `path`, which must be a prim path whose parent
    /// exists. Returns None and posts a coding error on failure.
    pub fn new(layer: &Layer, path: &Path) -> Option<PrimSpec> {
        if !path.is_prim_path() || path.is_empty() {
            crate::coding_error!("cannot create prim spec at non-prim path <{}>", path);
            return None;
        }
        if !layer.create_spec(path, SpecType::Prim) {
            return None;
        }
        Some(PrimSpec {
            layer: layer.clone(),
            path: path.clone(),
        })
    }

    /// Returns a handle to an existing prim spec, if there is one at `path`.
    pub fn get(layer: &Layer, path: &Path) -> Option<PrimSpec> {
        (layer.spec_type(path) == Some(SpecType::Prim)).then(|| PrimSpec {
            layer: layer.clone(),
            path: path.clone(),
        })
    }

    pub fn specifier(&self) -> Option<Specifier> {
        self.get_field(fields::SPECIFIER)
            .and_then(|v| v.as_str().and_then(Specifier::from_token))
    }

    pub fn set_specifier(&self, specifier: Specifier) -> bool {
        self.set_field(fields::SPECIFIER, Value::Token(specifier.token().into()))
    }

    pub fn type_name(&self) -> String {
        self.get_field(fields::TYPE_NAME)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    pub fn set_type_name(&self, type_name: impl Into<String>) -> bool {
        self.set_field(fields::TYPE_NAME, Value::Token(type_name.into()))
    }

    /// The prim's property paths, in path order. Relational attributes
    /// belong to their target spec, not the prim, and are excluded.
    pub fn property_paths(&self) -> Vec<Path> {
        self.layer
            .spec_paths_under(&self.path)
            .into_iter()
            .filter(|p| p.is_property_path() && p.parent() == self.path)
            .collect()
    }
}

/// AttributeSpec is a typed handle to an attribute.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    layer: Layer,
    path: Path,
}

impl Spec for AttributeSpec {
    fn layer(&self) -> &Layer {
        &self.layer
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl PropertySpecExt for AttributeSpec {}

impl AttributeSpec {
    /// Creates an attribute spec beneath `owner`. Validates the owner, the
    /// name, the resulting path, and the type name before creating anything;
    /// on failure posts a coding error and returns None with no spec left
    /// behind. On success the spec is created inside one change block and
    /// exactly three fields are stamped: custom, typeName, variability.
    pub fn new(
        owner: &PrimSpec,
        name: &str,
        type_name: &str,
        variability: Variability,
        custom: bool,
    ) -> Option<AttributeSpec> {
        if !owner.exists() {
            crate::coding_error!("cannot create attribute '{}' on expired owner <{}>", name, owner.path());
            return None;
        }
        if !is_valid_namespaced_identifier(name) {
            crate::coding_error!("cannot create attribute with invalid name '{}'", name);
            return None;
        }
        let path = owner.path().append_property(name);
        if !path.is_property_path() {
            crate::coding_error!("attribute name '{}' does not form a property path", name);
            return None;
        }
        if !crate::value::is_valid_value_type_name(type_name) {
            crate::coding_error!("cannot create attribute '{}' with invalid type name '{}'", name, type_name);
            return None;
        }

        let _block = ChangeBlock::new(owner.layer());
        if !owner.layer().create_spec(&path, SpecType::Attribute) {
            return None;
        }
        let spec = AttributeSpec {
            layer: owner.layer().clone(),
            path,
        };
        spec.set_field(fields::CUSTOM, Value::Bool(custom));
        spec.set_field(fields::TYPE_NAME, Value::Token(type_name.into()));
        spec.set_field(fields::VARIABILITY, Value::Token(variability.token().into()));
        Some(spec)
    }

    /// Returns a handle to an existing attribute spec, if there is one.
    pub fn get(layer: &Layer, path: &Path) -> Option<AttributeSpec> {
        (layer.spec_type(path) == Some(SpecType::Attribute)).then(|| AttributeSpec {
            layer: layer.clone(),
            path: path.clone(),
        })
    }

    pub fn type_name(&self) -> String {
        self.get_field(fields::TYPE_NAME)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    /// The registered value type of this attribute, if its type name is known.
    pub fn value_type(&self) -> Option<&'static ValueTypeName> {
        find_value_type_name(&self.type_name())
    }

    /// Sets the default value, coercing convertible scalars to the declared
    /// type. A value that cannot be represented in the declared type is a
    /// coding error and a no-op.
    pub fn set_default_value(&self, value: Value) -> bool {
        let Some(type_name) = self.value_type() else {
            crate::coding_error!("attribute <{}> has unknown type '{}'", self.path, self.type_name());
            return false;
        };
        let Some(coerced) = value.coerce_to(type_name.scalar) else {
            crate::coding_error!(
                "value of kind {:?} cannot be converted to '{}' for <{}>",
                value.scalar_kind(),
                type_name.name,
                self.path
            );
            return false;
        };
        self.set_field(fields::DEFAULT, coerced)
    }

    pub fn allowed_tokens(&self) -> Vec<String> {
        match self.get_field(fields::ALLOWED_TOKENS) {
            Some(Value::TokenList(tokens)) => tokens,
            _ => Vec::new(),
        }
    }

    pub fn set_allowed_tokens(&self, tokens: Vec<String>) -> bool {
        self.set_field(fields::ALLOWED_TOKENS, Value::TokenList(tokens))
    }

    /// Returns the authored display unit if present; otherwise the default
    /// unit derived from the value type's role.
    pub fn display_unit(&self) -> Option<Unit> {
        if let Some(value) = self.get_field(fields::DISPLAY_UNIT) {
            return value.as_str().and_then(Unit::from_name);
        }
        self.value_type().and_then(|t| t.default_unit())
    }

    pub fn set_display_unit(&self, unit: Unit) -> bool {
        self.set_field(fields::DISPLAY_UNIT, Value::Token(unit.name().into()))
    }

    pub fn color_space(&self) -> String {
        self.get_field(fields::COLOR_SPACE)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    pub fn set_color_space(&self, color_space: impl Into<String>) -> bool {
        self.set_field(fields::COLOR_SPACE, Value::Token(color_space.into()))
    }

    fn time_samples(&self) -> TimeSampleMap {
        self.get_field(fields::TIME_SAMPLES)
            .and_then(|v| v.as_time_samples().cloned())
            .unwrap_or_default()
    }

    /// Sets a time sample, converting convertible scalars to the attribute's
    /// declared type. A value of a non-convertible type is a coding error
    /// and a no-op.
    pub fn set_time_sample(&self, time: f64, value: Value) -> bool {
        let Some(type_name) = self.value_type() else {
            crate::coding_error!("attribute <{}> has unknown type '{}'", self.path, self.type_name());
            return false;
        };
        let Some(coerced) = value.coerce_to(type_name.scalar) else {
            crate::coding_error!(
                "time sample of kind {:?} cannot be converted to '{}' for <{}>",
                value.scalar_kind(),
                type_name.name,
                self.path
            );
            return false;
        };
        let mut samples = self.time_samples();
        samples.insert(TimeCode(time), coerced);
        self.set_field(fields::TIME_SAMPLES, Value::TimeSamples(samples))
    }

    /// Returns the sample authored exactly at `time`, if any.
    pub fn query_time_sample(&self, time: f64) -> Option<Value> {
        self.time_samples().remove(&TimeCode(time))
    }

    pub fn time_sample_times(&self) -> Vec<f64> {
        self.time_samples().keys().map(|t| t.0).collect()
    }

    pub fn erase_time_sample(&self, time: f64) -> bool {
        let mut samples = self.time_samples();
        if samples.remove(&TimeCode(time)).is_none() {
            return false;
        }
        if samples.is_empty() {
            self.erase_field(fields::TIME_SAMPLES)
        } else {
            self.set_field(fields::TIME_SAMPLES, Value::TimeSamples(samples))
        }
    }

    /// The connection-path edit list.
    pub fn connection_path_list(&self) -> ListOp<Path> {
        self.get_field(fields::CONNECTION_PATHS)
            .and_then(|v| v.as_path_list_op().cloned())
            .unwrap_or_default()
    }

    fn set_connection_path_list(&self, list: ListOp<Path>) -> bool {
        if list.is_empty() {
            self.erase_field(fields::CONNECTION_PATHS)
        } else {
            self.set_field(fields::CONNECTION_PATHS, Value::PathListOp(list))
        }
    }

    /// Canonicizes a connection path: a relative path is interpreted as
    /// relative to the owning prim, not the attribute itself.
    pub fn canonical_connection_path(&self, connection: &Path) -> Path {
        connection.make_absolute(&self.owner_prim_path())
    }

    /// Adds a connection path to the appended sub-list. Idempotent.
    pub fn add_connection_path(&self, connection: &Path) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit connections of <{}>", self.path);
            return false;
        }
        let connection = self.canonical_connection_path(connection);
        if connection.is_empty() {
            return false;
        }
        let mut list = self.connection_path_list();
        list.add(connection);
        self.set_connection_path_list(list)
    }

    /// Removes a connection path and erases its child spec (and any marker
    /// or mapper hosted there).
    pub fn remove_connection_path(&self, connection: &Path) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit connections of <{}>", self.path);
            return false;
        }
        let connection = self.canonical_connection_path(connection);
        let _block = ChangeBlock::new(&self.layer);
        let mut list = self.connection_path_list();
        list.remove(&connection);
        self.layer.erase_spec(&self.path.append_target(&connection));
        self.set_connection_path_list(list)
    }

    /// Replaces the appended sub-list. Child specs of paths removed from the
    /// appended list are erased without consulting the other sub-lists; a
    /// path still contributed by the prepended list loses its child spec.
    pub fn set_connection_appended_items(&self, items: Vec<Path>) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit connections of <{}>", self.path);
            return false;
        }
        let items: Vec<Path> = items
            .iter()
            .map(|p| self.canonical_connection_path(p))
            .collect();
        let _block = ChangeBlock::new(&self.layer);
        let mut list = self.connection_path_list();
        for removed in list.appended_items().iter().filter(|p| !items.contains(p)) {
            self.layer.erase_spec(&self.path.append_target(removed));
        }
        list.set_appended_items(items);
        self.set_connection_path_list(list)
    }

    /// The composed connection paths this spec contributes.
    pub fn connection_paths(&self) -> Vec<Path> {
        self.connection_path_list().composed_items()
    }

    /// Paths of legacy mapper children, keyed by connection path.
    pub fn mapper_paths(&self) -> Vec<Path> {
        self.layer
            .spec_paths_under(&self.path)
            .into_iter()
            .filter(|p| p.is_mapper_path())
            .collect()
    }
}

/// RelationshipSpec is a typed handle to a relationship.
#[derive(Debug, Clone)]
pub struct RelationshipSpec {
    layer: Layer,
    path: Path,
}

impl Spec for RelationshipSpec {
    fn layer(&self) -> &Layer {
        &self.layer
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl PropertySpecExt for RelationshipSpec {}

impl RelationshipSpec {
    /// Creates a relationship spec beneath `owner`. Same validate-then-create
    /// protocol as [`AttributeSpec::new`]; stamps custom and variability.
    pub fn new(
        owner: &PrimSpec,
        name: &str,
        custom: bool,
        variability: Variability,
    ) -> Option<RelationshipSpec> {
        if !owner.exists() {
            crate::coding_error!("cannot create relationship '{}' on expired owner <{}>", name, owner.path());
            return None;
        }
        if !is_valid_namespaced_identifier(name) {
            crate::coding_error!("cannot create relationship with invalid name '{}'", name);
            return None;
        }
        let path = owner.path().append_property(name);
        if !path.is_property_path() {
            crate::coding_error!("relationship name '{}' does not form a property path", name);
            return None;
        }

        let _block = ChangeBlock::new(owner.layer());
        if !owner.layer().create_spec(&path, SpecType::Relationship) {
            return None;
        }
        let spec = RelationshipSpec {
            layer: owner.layer().clone(),
            path,
        };
        spec.set_field(fields::CUSTOM, Value::Bool(custom));
        spec.set_field(fields::VARIABILITY, Value::Token(variability.token().into()));
        Some(spec)
    }

    /// Returns a handle to an existing relationship spec, if there is one.
    pub fn get(layer: &Layer, path: &Path) -> Option<RelationshipSpec> {
        (layer.spec_type(path) == Some(SpecType::Relationship)).then(|| RelationshipSpec {
            layer: layer.clone(),
            path: path.clone(),
        })
    }

    /// Creates a relational attribute beneath one of this relationship's
    /// targets. The target spec is created if absent, but the target path is
    /// not registered in the target edit list; that is the caller's step.
    pub fn new_relational_attribute(
        &self,
        target: &Path,
        name: &str,
        type_name: &str,
        variability: Variability,
        custom: bool,
    ) -> Option<AttributeSpec> {
        if !self.exists() {
            crate::coding_error!("cannot create relational attribute on expired <{}>", self.path);
            return None;
        }
        if !is_valid_namespaced_identifier(name) {
            crate::coding_error!("cannot create relational attribute with invalid name '{}'", name);
            return None;
        }
        if !crate::value::is_valid_value_type_name(type_name) {
            crate::coding_error!("cannot create relational attribute '{}' with invalid type name '{}'", name, type_name);
            return None;
        }
        let target = target.make_absolute(&self.owner_prim_path());
        let target_spec_path = self.path.append_target(&target);
        if target_spec_path.is_empty() {
            return None;
        }

        let _block = ChangeBlock::new(&self.layer);
        if !self.layer.has_spec(&target_spec_path)
            && !self.layer.create_spec(&target_spec_path, SpecType::RelationshipTarget)
        {
            return None;
        }
        let attr_path = target_spec_path.append_relational_attribute(name);
        if !self.layer.create_spec(&attr_path, SpecType::Attribute) {
            return None;
        }
        let spec = AttributeSpec {
            layer: self.layer.clone(),
            path: attr_path,
        };
        spec.set_field(fields::CUSTOM, Value::Bool(custom));
        spec.set_field(fields::TYPE_NAME, Value::Token(type_name.into()));
        spec.set_field(fields::VARIABILITY, Value::Token(variability.token().into()));
        Some(spec)
    }

    /// The target-path edit list.
    pub fn target_path_list(&self) -> ListOp<Path> {
        self.get_field(fields::TARGET_PATHS)
            .and_then(|v| v.as_path_list_op().cloned())
            .unwrap_or_default()
    }

    fn set_target_path_list(&self, list: ListOp<Path>) -> bool {
        if list.is_empty() {
            self.erase_field(fields::TARGET_PATHS)
        } else {
            self.set_field(fields::TARGET_PATHS, Value::PathListOp(list))
        }
    }

    /// Adds a target path to the appended sub-list. Idempotent.
    pub fn add_target_path(&self, target: &Path) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit targets of <{}>", self.path);
            return false;
        }
        let target = target.make_absolute(&self.owner_prim_path());
        if target.is_empty() {
            return false;
        }
        let mut list = self.target_path_list();
        list.add(target);
        self.set_target_path_list(list)
    }

    /// Prepends a target path. Idempotent.
    pub fn prepend_target_path(&self, target: &Path) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit targets of <{}>", self.path);
            return false;
        }
        let target = target.make_absolute(&self.owner_prim_path());
        if target.is_empty() {
            return false;
        }
        let mut list = self.target_path_list();
        list.prepend(target);
        self.set_target_path_list(list)
    }

    /// Removes a target path from the edit list and erases the target's
    /// child spec, including relational attributes and markers.
    pub fn remove_target_path(&self, target: &Path) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit targets of <{}>", self.path);
            return false;
        }
        let target = target.make_absolute(&self.owner_prim_path());
        let _block = ChangeBlock::new(&self.layer);
        let mut list = self.target_path_list();
        list.remove(&target);
        self.layer.erase_spec(&self.path.append_target(&target));
        self.set_target_path_list(list)
    }

    /// Replaces the appended sub-list. Child specs of paths removed from the
    /// appended list are erased without consulting the other sub-lists; a
    /// path still contributed by the prepended list loses its child spec.
    pub fn set_target_appended_items(&self, items: Vec<Path>) -> bool {
        if !self.permission_to_edit() {
            crate::coding_error!("no permission to edit targets of <{}>", self.path);
            return false;
        }
        let items: Vec<Path> = items
            .iter()
            .map(|p| p.make_absolute(&self.owner_prim_path()))
            .collect();
        let _block = ChangeBlock::new(&self.layer);
        let mut list = self.target_path_list();
        for removed in list.appended_items().iter().filter(|p| !items.contains(p)) {
            self.layer.erase_spec(&self.path.append_target(removed));
        }
        list.set_appended_items(items);
        self.set_target_path_list(list)
    }

    /// The composed target paths this spec contributes.
    pub fn target_paths(&self) -> Vec<Path> {
        self.target_path_list().composed_items()
    }

    /// Relational attributes beneath `target`, in path order.
    pub fn relational_attributes(&self, target: &Path) -> Vec<AttributeSpec> {
        let target = target.make_absolute(&self.owner_prim_path());
        let target_spec_path = self.path.append_target(&target);
        self.layer
            .spec_paths_under(&target_spec_path)
            .into_iter()
            .filter_map(|p| AttributeSpec::get(&self.layer, &p))
            .collect()
    }

    /// The relational-attribute name-ordering edit list for `target`.
    pub fn relational_attribute_order(&self, target: &Path) -> ListOp<String> {
        let target = target.make_absolute(&self.owner_prim_path());
        let target_spec_path = self.path.append_target(&target);
        self.layer
            .get_field(&target_spec_path, fields::RELATIONAL_ATTRIBUTE_ORDER)
            .and_then(|v| v.as_token_list_op().cloned())
            .unwrap_or_default()
    }

    pub fn set_relational_attribute_order(&self, target: &Path, order: ListOp<String>) -> bool {
        let target = target.make_absolute(&self.owner_prim_path());
        let target_spec_path = self.path.append_target(&target);
        if !self.layer.has_spec(&target_spec_path) {
            crate::coding_error!("no target spec at <{}>", target_spec_path);
            return false;
        }
        self.layer
            .set_field(&target_spec_path, fields::RELATIONAL_ATTRIBUTE_ORDER, Value::TokenListOp(order))
    }

    pub fn no_load_hint(&self) -> bool {
        self.get_field(fields::NO_LOAD_HINT).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set_no_load_hint(&self, no_load: bool) -> bool {
        self.set_field(fields::NO_LOAD_HINT, Value::Bool(no_load))
    }
}

#[cfg(test)]
mod spec_test;
