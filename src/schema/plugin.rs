//! Schema plugin metadata.
//!
//! A plugin declares schema types (with their kind, base types, and schema
//! metadata) and carries a generated-schema layer holding each type's
//! builtin prim and property specs. Plugin metadata is JSON; a malformed
//! entry is a coding error for that entry and the rest of the plugin still
//! loads.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::layer::Layer;
use crate::value::{Dict, Value};

/// Schema metadata field names read from a type declaration.
pub mod metadata {
    pub const API_SCHEMA_AUTO_APPLY_TO: &str = "apiSchemaAutoApplyTo";
    pub const API_SCHEMA_CAN_ONLY_APPLY_TO: &str = "apiSchemaCanOnlyApplyTo";
    pub const API_SCHEMA_ALLOWED_INSTANCE_NAMES: &str = "apiSchemaAllowedInstanceNames";
    pub const PROPERTY_NAMESPACE_PREFIX: &str = "propertyNamespacePrefix";
    pub const APPLIED_API_SCHEMAS: &str = "appliedAPISchemas";
}

/// SchemaKind classifies a declared schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    AbstractBase,
    AbstractTyped,
    ConcreteTyped,
    NonAppliedApi,
    SingleApplyApi,
    MultipleApplyApi,
}

impl SchemaKind {
    /// Parses a kind token from plugin metadata. An unrecognized token is a
    /// coding error and yields None; the type is skipped.
    pub fn from_metadata(token: &str, type_name: &str) -> Option<SchemaKind> {
        match token {
            "abstractBase" => Some(SchemaKind::AbstractBase),
            "abstractTyped" => Some(SchemaKind::AbstractTyped),
            "concreteTyped" => Some(SchemaKind::ConcreteTyped),
            "nonAppliedAPI" => Some(SchemaKind::NonAppliedApi),
            "singleApplyAPI" => Some(SchemaKind::SingleApplyApi),
            "multipleApplyAPI" => Some(SchemaKind::MultipleApplyApi),
            _ => {
                crate::coding_error!(
                    "invalid schema kind '{}' declared for type '{}'",
                    token,
                    type_name
                );
                None
            }
        }
    }

    /// True for API schemas that can be applied to a prim.
    pub fn is_applied_api(self) -> bool {
        matches!(self, SchemaKind::SingleApplyApi | SchemaKind::MultipleApplyApi)
    }

    pub fn is_concrete(self) -> bool {
        self == SchemaKind::ConcreteTyped
    }

    pub fn is_typed(self) -> bool {
        matches!(self, SchemaKind::AbstractTyped | SchemaKind::ConcreteTyped)
    }
}

/// SchemaTypeDecl is one type's entry in a plugin's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaTypeDecl {
    /// Aliases under the schema base type. A type with exactly one alias is
    /// registered under it as its schema type name; zero or several aliases
    /// make the type invisible to name lookups.
    pub aliases: Vec<String>,

    /// Schema type names of the direct base types.
    pub bases: Vec<String>,

    /// Schema kind token, parsed via [`SchemaKind::from_metadata`].
    pub kind: String,

    /// Schema metadata: auto-apply targets, can-only-apply-to restrictions,
    /// allowed instance names, namespace prefix, declared applied schemas.
    pub metadata: Dict,
}

/// SchemaPlugin is one plugin's compiled-in metadata plus its generated
/// schema layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaPlugin {
    pub name: String,

    /// Declared type name -> declaration.
    pub types: BTreeMap<String, SchemaTypeDecl>,

    /// Cross-cutting auto-apply contributions for API schemas this plugin
    /// does not define: API schema name -> target schema type names.
    #[serde(rename = "autoApplyAPISchemas")]
    pub auto_apply_api_schemas: BTreeMap<String, Vec<String>>,

    /// Inline generated-schema layer, serialized as JSON. Takes precedence
    /// over `generated_schema_path`.
    #[serde(rename = "generatedSchema")]
    pub generated_schema: Option<String>,

    /// Path of the generated-schema layer file on disk.
    #[serde(rename = "generatedSchemaPath")]
    pub generated_schema_path: Option<PathBuf>,
}

impl SchemaPlugin {
    /// Loads this plugin's generated-schema layer. A missing or unparsable
    /// layer yields an empty anonymous layer plus a warning; the plugin's
    /// types still register.
    pub fn load_generated_schema(&self) -> Layer {
        let json = match (&self.generated_schema, &self.generated_schema_path) {
            (Some(inline), _) => Some(inline.clone()),
            (None, Some(path)) => match std::fs::read_to_string(path) {
                Ok(json) => Some(json),
                Err(err) => {
                    crate::diag::post_warning(format!(
                        "failed to read generated schema for plugin '{}' from {}: {}",
                        self.name,
                        path.display(),
                        err
                    ));
                    None
                }
            },
            (None, None) => None,
        };
        match json {
            Some(json) => Layer::from_json(&json).unwrap_or_else(|err| {
                crate::diag::post_warning(format!(
                    "failed to parse generated schema for plugin '{}': {}",
                    self.name, err
                ));
                Layer::create_anonymous(&self.name)
            }),
            None => Layer::create_anonymous(&self.name),
        }
    }
}

/// Reads a name list from schema metadata. An absent key yields an empty
/// list; a value of any other type is a coding error and also yields an
/// empty list.
pub fn name_list_from_metadata(metadata: &Dict, type_name: &str, key: &str) -> Vec<String> {
    match metadata.get_at(key) {
        None => Vec::new(),
        Some(Value::TokenList(names)) => names.clone(),
        Some(other) => {
            crate::coding_error!(
                "expected a token list for metadata '{}' of schema type '{}', got {:?}",
                key,
                type_name,
                other.scalar_kind()
            );
            Vec::new()
        }
    }
}
