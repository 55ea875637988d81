//! Schema plugins, the schema registry, and composed prim definitions.
//!
//! Plugins declare schema types and carry generated-schema layers; the
//! [`SchemaRegistry`] merges them into one schematics layer and builds a
//! [`PrimDefinition`] per concrete type and per applied API schema,
//! including auto-applied and namespaced multiple-apply composition.

pub mod plugin;
pub mod prim_definition;
pub mod registry;

pub use plugin::{SchemaKind, SchemaPlugin, SchemaTypeDecl};
pub use prim_definition::PrimDefinition;
pub use registry::{get_type_name_and_instance, SchemaRegistry};

#[cfg(test)]
mod composition_test;
