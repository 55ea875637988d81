//! Schema registry build and query.
//!
//! The registry is built once from a set of [`SchemaPlugin`]s: generated
//! schema layers are loaded in parallel (plain file I/O with no ordering
//! dependency), merged sequentially into one shared schematics layer (first
//! writer wins on a root-prim name collision), and then the type maps,
//! auto-apply caches, and prim definitions are derived. After construction
//! the registry is read-only; composed ad hoc definitions copy, never
//! mutate, registry state.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::layer::{fields, ChangeBlock, Layer};
use crate::path::{is_valid_identifier, join_identifier, Path};
use crate::schema::plugin::{
    metadata, name_list_from_metadata, SchemaKind, SchemaPlugin,
};
use crate::schema::prim_definition::PrimDefinition;
use crate::value::Value;

/// Fields never carried over from a generated schema into the schematics
/// layer. As fallback values they would interfere with composition or
/// scenegraph population.
const DISALLOWED_FIELDS: &[&str] = &[
    fields::INHERIT_PATHS,
    fields::PAYLOAD,
    fields::REFERENCES,
    fields::SPECIALIZES,
    fields::VARIANT_SELECTION,
    fields::VARIANT_SET_NAMES,
    fields::CUSTOM_DATA,
    fields::ACTIVE,
    fields::INSTANCEABLE,
    fields::TIME_SAMPLES,
    fields::CONNECTION_PATHS,
    fields::TARGET_PATHS,
    fields::SPECIFIER,
    fields::CLIPS,
];

pub fn is_disallowed_field(field: &str) -> bool {
    DISALLOWED_FIELDS.contains(&field)
}

/// Splits an applied-API-schema token at the first namespace delimiter into
/// (schema type name, instance name). A token without a delimiter has an
/// empty instance name.
pub fn get_type_name_and_instance(token: &str) -> (&str, &str) {
    match token.split_once(':') {
        Some((name, instance)) => (name, instance),
        None => (token, ""),
    }
}

/// SchemaRegistry holds the merged schematics layer and every cache derived
/// from plugin metadata.
#[derive(Debug)]
pub struct SchemaRegistry {
    schematics: Layer,
    name_to_type: BTreeMap<String, String>,
    type_to_name: BTreeMap<String, String>,
    kinds: BTreeMap<String, SchemaKind>,
    namespace_prefixes: BTreeMap<String, String>,
    auto_apply: BTreeMap<String, Vec<String>>,
    can_only_apply_to: BTreeMap<String, Vec<String>>,
    allowed_instance_names: BTreeMap<String, BTreeSet<String>>,
    api_defs: BTreeMap<String, PrimDefinition>,
    concrete_defs: BTreeMap<String, PrimDefinition>,
}

impl SchemaRegistry {
    /// Builds a registry from plugin metadata. Malformed metadata entries
    /// are reported as coding errors and skipped; the build never aborts.
    pub fn new(plugins: &[SchemaPlugin]) -> SchemaRegistry {
        // Each plugin's layer loads into its own slot; the merge below is
        // sequential so first-writer-wins stays deterministic.
        let generated: Vec<Layer> = plugins
            .par_iter()
            .map(SchemaPlugin::load_generated_schema)
            .collect();

        let schematics = Layer::create_anonymous("schematics");
        {
            let _block = ChangeBlock::new(&schematics);
            for layer in &generated {
                merge_generated_schema(&schematics, layer);
            }
        }

        let mut registry = SchemaRegistry {
            schematics,
            name_to_type: BTreeMap::new(),
            type_to_name: BTreeMap::new(),
            kinds: BTreeMap::new(),
            namespace_prefixes: BTreeMap::new(),
            auto_apply: BTreeMap::new(),
            can_only_apply_to: BTreeMap::new(),
            allowed_instance_names: BTreeMap::new(),
            api_defs: BTreeMap::new(),
            concrete_defs: BTreeMap::new(),
        };

        let mut raw_auto_apply: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut declared_api_schemas: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut bases: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for plugin in plugins {
            for (type_name, decl) in &plugin.types {
                let Some(kind) = SchemaKind::from_metadata(&decl.kind, type_name) else {
                    continue;
                };
                // A type without exactly one alias is not addressable as a
                // schema and is skipped.
                if decl.aliases.len() != 1 {
                    continue;
                }
                let schema_name = decl.aliases[0].clone();
                if registry.kinds.contains_key(&schema_name) {
                    continue;
                }
                registry.kinds.insert(schema_name.clone(), kind);
                registry
                    .name_to_type
                    .insert(schema_name.clone(), type_name.clone());
                registry
                    .type_to_name
                    .insert(type_name.clone(), schema_name.clone());
                bases.insert(schema_name.clone(), decl.bases.clone());

                if kind == SchemaKind::MultipleApplyApi {
                    if let Some(prefix) = decl
                        .metadata
                        .get(metadata::PROPERTY_NAMESPACE_PREFIX)
                        .and_then(|v| v.as_str())
                    {
                        registry
                            .namespace_prefixes
                            .insert(schema_name.clone(), prefix.to_string());
                    }
                    let allowed = name_list_from_metadata(
                        &decl.metadata,
                        type_name,
                        metadata::API_SCHEMA_ALLOWED_INSTANCE_NAMES,
                    );
                    if !allowed.is_empty() {
                        registry
                            .allowed_instance_names
                            .insert(schema_name.clone(), allowed.into_iter().collect());
                    }
                }

                if kind == SchemaKind::SingleApplyApi {
                    let targets = name_list_from_metadata(
                        &decl.metadata,
                        type_name,
                        metadata::API_SCHEMA_AUTO_APPLY_TO,
                    );
                    if !targets.is_empty() {
                        raw_auto_apply
                            .entry(schema_name.clone())
                            .or_default()
                            .extend(targets);
                    }
                }

                if kind.is_applied_api() {
                    registry.collect_can_only_apply_to(type_name, &schema_name, decl);
                }

                if kind.is_typed() {
                    let declared = name_list_from_metadata(
                        &decl.metadata,
                        type_name,
                        metadata::APPLIED_API_SCHEMAS,
                    );
                    if !declared.is_empty() {
                        declared_api_schemas.insert(schema_name.clone(), declared);
                    }
                }
            }
        }

        // Plugins may contribute auto-apply mappings for API schemas they do
        // not define; those rank weaker than the type's own metadata.
        for plugin in plugins {
            for (api_name, targets) in &plugin.auto_apply_api_schemas {
                raw_auto_apply
                    .entry(api_name.clone())
                    .or_default()
                    .extend(targets.iter().cloned());
            }
        }

        registry.auto_apply = expand_auto_apply(&raw_auto_apply, &bases);

        for (schema_name, kind) in registry.kinds.clone() {
            if kind.is_applied_api() {
                let prim_path = Path::absolute_root().append_child(&schema_name);
                let mut def = PrimDefinition::from_prim_spec(&registry.schematics, &prim_path);
                def.push_applied_api_schema(&schema_name);
                registry.api_defs.insert(schema_name, def);
            }
        }

        for (schema_name, kind) in registry.kinds.clone() {
            if kind.is_concrete() {
                let def = registry.build_concrete_def(&schema_name, &declared_api_schemas);
                registry.concrete_defs.insert(schema_name, def);
            }
        }

        registry
    }

    fn collect_can_only_apply_to(
        &mut self,
        type_name: &str,
        schema_name: &str,
        decl: &crate::schema::plugin::SchemaTypeDecl,
    ) {
        match decl.metadata.get(metadata::API_SCHEMA_CAN_ONLY_APPLY_TO) {
            None => {}
            // A flat list restricts the whole schema.
            Some(Value::TokenList(targets)) => {
                self.can_only_apply_to
                    .insert(schema_name.to_string(), targets.clone());
            }
            // A dictionary restricts specific instance names.
            Some(Value::Dict(per_instance)) => {
                for (instance, value) in per_instance.iter() {
                    match value {
                        Value::TokenList(targets) => {
                            self.can_only_apply_to.insert(
                                format!("{}:{}", schema_name, instance),
                                targets.clone(),
                            );
                        }
                        other => {
                            crate::coding_error!(
                                "expected a token list for '{}' instance '{}' of schema type '{}', got {:?}",
                                metadata::API_SCHEMA_CAN_ONLY_APPLY_TO,
                                instance,
                                type_name,
                                other.scalar_kind()
                            );
                        }
                    }
                }
            }
            Some(other) => {
                crate::coding_error!(
                    "expected a token list or dictionary for metadata '{}' of schema type '{}', got {:?}",
                    metadata::API_SCHEMA_CAN_ONLY_APPLY_TO,
                    type_name,
                    other.scalar_kind()
                );
            }
        }
    }

    fn build_concrete_def(
        &self,
        schema_name: &str,
        declared_api_schemas: &BTreeMap<String, Vec<String>>,
    ) -> PrimDefinition {
        let prim_path = Path::absolute_root().append_child(schema_name);

        // Metadata-declared schemas rank ahead of auto-applied ones, which
        // are already alphabetical amongst themselves.
        let mut applied: Vec<String> = declared_api_schemas
            .get(schema_name)
            .cloned()
            .unwrap_or_default();
        for auto in self.auto_apply.get(schema_name).into_iter().flatten() {
            if !applied.contains(auto) {
                applied.push(auto.clone());
            }
        }

        if applied.is_empty() {
            return PrimDefinition::from_prim_spec(&self.schematics, &prim_path);
        }

        let mut def = PrimDefinition::empty(&self.schematics);
        def.set_prim_spec_path(prim_path.clone());
        self.compose_applied_api_schemas(&mut def, &applied);
        // The type's own properties are strongest and land last.
        for path in self.schematics.spec_paths_under(&prim_path) {
            if path.is_property_path() && path.parent() == prim_path {
                def.add_property(path.name().to_string(), path, true);
            }
        }
        def
    }

    /// Applies an ordered applied-API list (strongest first) to `def`.
    /// Walked in reverse so a stronger schema's property overwrites a weaker
    /// one on a name collision; properties already present on `def` itself
    /// are never displaced. Only entries that compose successfully are
    /// recorded in the applied list, and an entry `def` already carries is
    /// skipped entirely.
    fn compose_applied_api_schemas(&self, def: &mut PrimDefinition, applied: &[String]) {
        let mut composed = PrimDefinition::empty(&self.schematics);
        let mut composed_schemas: Vec<&String> = Vec::new();
        for entry in applied.iter().rev() {
            if def.applied_api_schemas().iter().any(|s| s == entry) {
                continue;
            }
            let (schema_name, instance) = get_type_name_and_instance(entry);
            let Some(api_def) = self.api_defs.get(schema_name) else {
                crate::coding_error!("cannot apply unknown API schema '{}'", schema_name);
                continue;
            };
            let multiple = self.kinds.get(schema_name) == Some(&SchemaKind::MultipleApplyApi);
            if multiple && instance.is_empty() {
                crate::coding_error!(
                    "multiple-apply API schema '{}' applied without an instance name",
                    schema_name
                );
                continue;
            }
            if !multiple && !instance.is_empty() {
                crate::coding_error!(
                    "API schema '{}' is not multiple-apply and cannot take instance '{}'",
                    schema_name,
                    instance
                );
                continue;
            }
            let prefix = self
                .namespace_prefixes
                .get(schema_name)
                .map(String::as_str)
                .unwrap_or("");
            for name in api_def.property_names() {
                let Some(spec_path) = api_def.property_spec_path(name) else {
                    continue;
                };
                let final_name = if multiple {
                    join_identifier(&[prefix, instance, name])
                } else {
                    name.clone()
                };
                composed.add_property(final_name, spec_path.clone(), true);
            }
            composed_schemas.push(entry);
        }
        def.compose_weaker(&composed);
        for entry in composed_schemas.into_iter().rev() {
            def.push_applied_api_schema(entry);
        }
    }

    /// The shared schematics layer all definitions point into.
    pub fn schematics_layer(&self) -> &Layer {
        &self.schematics
    }

    pub fn get_schema_kind(&self, schema_name: &str) -> Option<SchemaKind> {
        let (name, _) = get_type_name_and_instance(schema_name);
        self.kinds.get(name).copied()
    }

    pub fn is_concrete(&self, schema_name: &str) -> bool {
        self.get_schema_kind(schema_name)
            .is_some_and(SchemaKind::is_concrete)
    }

    pub fn is_applied_api_schema(&self, schema_name: &str) -> bool {
        self.get_schema_kind(schema_name)
            .is_some_and(SchemaKind::is_applied_api)
    }

    pub fn is_multiple_apply_api_schema(&self, schema_name: &str) -> bool {
        self.get_schema_kind(schema_name) == Some(SchemaKind::MultipleApplyApi)
    }

    /// The declared type name registered under a schema type name.
    pub fn get_type_from_schema_type_name(&self, schema_name: &str) -> Option<&str> {
        self.name_to_type.get(schema_name).map(String::as_str)
    }

    /// The schema type name a declared type is registered under.
    pub fn get_schema_type_name(&self, type_name: &str) -> Option<&str> {
        self.type_to_name.get(type_name).map(String::as_str)
    }

    /// Concrete schema type name -> API schemas automatically applied to it,
    /// alphabetical.
    pub fn get_auto_apply_api_schemas(&self) -> &BTreeMap<String, Vec<String>> {
        &self.auto_apply
    }

    /// The namespace prefix a multiple-apply schema's properties live under.
    pub fn get_property_namespace_prefix(&self, schema_name: &str) -> Option<&str> {
        self.namespace_prefixes.get(schema_name).map(String::as_str)
    }

    /// Checks whether `instance_name` may be used to apply the given
    /// multiple-apply schema: the name must be made of valid identifier
    /// components, must be in the schema's allowed-name set when one is
    /// declared, and its base name must not collide with the base name of
    /// one of the schema's own properties.
    pub fn is_allowed_api_schema_instance_name(
        &self,
        schema_name: &str,
        instance_name: &str,
    ) -> bool {
        if !self.is_multiple_apply_api_schema(schema_name) {
            return false;
        }
        if instance_name.is_empty()
            || !instance_name.split(':').all(is_valid_identifier)
        {
            return false;
        }
        if let Some(allowed) = self.allowed_instance_names.get(schema_name) {
            if !allowed.contains(instance_name) {
                return false;
            }
        }
        let instance_base = instance_name.rsplit(':').next().unwrap_or(instance_name);
        if let Some(def) = self.api_defs.get(schema_name) {
            for property in def.property_names() {
                let property_base = property.rsplit(':').next().unwrap_or(property);
                if property_base == instance_base {
                    return false;
                }
            }
        }
        true
    }

    /// The schema type names an API schema may be applied to, or empty when
    /// unrestricted. An instance-specific restriction wins over the
    /// schema-wide one.
    pub fn get_api_schema_can_only_apply_to_type_names(
        &self,
        schema_name: &str,
        instance_name: &str,
    ) -> Vec<String> {
        if !instance_name.is_empty() {
            let keyed = format!("{}:{}", schema_name, instance_name);
            if let Some(targets) = self.can_only_apply_to.get(&keyed) {
                return targets.clone();
            }
        }
        self.can_only_apply_to
            .get(schema_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find_concrete_prim_definition(&self, schema_name: &str) -> Option<&PrimDefinition> {
        self.concrete_defs.get(schema_name)
    }

    pub fn find_applied_api_prim_definition(&self, schema_name: &str) -> Option<&PrimDefinition> {
        self.api_defs.get(schema_name)
    }

    /// Builds a caller-owned definition composing a concrete type with an
    /// explicit ordered applied-API list (strongest first). An empty list is
    /// a coding error; use the plain concrete lookup instead.
    pub fn build_composed_prim_definition(
        &self,
        schema_name: &str,
        applied_api_schemas: &[String],
    ) -> Option<PrimDefinition> {
        if applied_api_schemas.is_empty() {
            crate::coding_error!(
                "cannot build a composed prim definition for '{}' with an empty applied-API list",
                schema_name
            );
            return None;
        }
        let mut def = match self.concrete_defs.get(schema_name) {
            Some(concrete) => concrete.clone(),
            None => PrimDefinition::empty(&self.schematics),
        };
        self.compose_applied_api_schemas(&mut def, applied_api_schemas);
        Some(def)
    }
}

/// Copies every root prim of `generated` not already present in the
/// schematics layer, filtering disallowed fields. The prim's specifier and
/// type name survive; everything beneath comes along spec by spec.
fn merge_generated_schema(schematics: &Layer, generated: &Layer) {
    for root in generated.root_prim_paths() {
        if schematics.has_spec(&root) {
            continue;
        }
        let subtree = std::iter::once(root.clone()).chain(generated.spec_paths_under(&root));
        for path in subtree {
            let Some(data) = generated.spec_data(&path) else {
                continue;
            };
            if !schematics.create_spec(&path, data.spec_type) {
                continue;
            }
            for (field, value) in data.fields {
                if is_disallowed_field(&field) && field != fields::SPECIFIER {
                    continue;
                }
                // The specifier is disallowed as a property fallback but is
                // part of the prim's identity.
                if field == fields::SPECIFIER && !path.is_prim_path() {
                    continue;
                }
                schematics.set_field(&path, &field, value);
            }
        }
    }
}

/// Expands each auto-apply target to include every type derived from it,
/// then inverts into a type -> [API schema names] map, alphabetical per
/// type so collisions resolve deterministically.
fn expand_auto_apply(
    raw: &BTreeMap<String, Vec<String>>,
    bases: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Vec<String>> {
    let mut derived: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (schema_name, base_names) in bases {
        for base in base_names {
            derived.entry(base).or_default().push(schema_name);
        }
    }

    let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (api_name, targets) in raw {
        let mut expanded: BTreeSet<&str> = BTreeSet::new();
        let mut pending: Vec<&str> = targets.iter().map(String::as_str).collect();
        while let Some(target) = pending.pop() {
            if !expanded.insert(target) {
                continue;
            }
            if let Some(children) = derived.get(target) {
                pending.extend(children.iter().copied());
            }
        }
        for target in expanded {
            let entry = result.entry(target.to_string()).or_default();
            if !entry.contains(api_name) {
                entry.push(api_name.clone());
            }
        }
    }
    for schemas in result.values_mut() {
        schemas.sort();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_and_instance_split() {
        assert_eq!(get_type_name_and_instance("CollectionAPI:foo"), ("CollectionAPI", "foo"));
        assert_eq!(
            get_type_name_and_instance("CollectionAPI:foo:bar"),
            ("CollectionAPI", "foo:bar")
        );
        assert_eq!(get_type_name_and_instance("PhysicsAPI"), ("PhysicsAPI", ""));
    }

    #[test]
    fn test_disallowed_fields() {
        assert!(is_disallowed_field(fields::REFERENCES));
        assert!(is_disallowed_field(fields::TIME_SAMPLES));
        assert!(!is_disallowed_field(fields::DEFAULT));
        assert!(!is_disallowed_field(fields::TYPE_NAME));
    }

    #[test]
    fn test_expand_auto_apply_reaches_derived_types() {
        let mut raw = BTreeMap::new();
        raw.insert("LightAPI".to_string(), vec!["Xformable".to_string()]);
        let mut bases = BTreeMap::new();
        bases.insert("Sphere".to_string(), vec!["Xformable".to_string()]);
        bases.insert("Cube".to_string(), vec!["Xformable".to_string()]);
        bases.insert("Scope".to_string(), vec![]);

        let expanded = expand_auto_apply(&raw, &bases);
        assert_eq!(expanded["Xformable"], ["LightAPI"]);
        assert_eq!(expanded["Sphere"], ["LightAPI"]);
        assert_eq!(expanded["Cube"], ["LightAPI"]);
        assert!(!expanded.contains_key("Scope"));
    }
}
