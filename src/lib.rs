//! # Scene Description
//!
//! A scene-description core for hierarchical, typed 3D scene graphs: specs
//! addressed by path, list-edited relationships and connections, per-target
//! markers, schema-driven prim definitions, and layer stitching.
//!
//! ## Modules
//!
//! - [`path`] - Prim, property, target, and mapper paths
//! - [`value`] - Dynamically-typed field values and the value-type registry
//! - [`listop`] - Ordered, override-capable edit lists
//! - [`layer`] - The path-addressed field store and change batching
//! - [`spec`] - Typed prim/attribute/relationship spec views and markers
//! - [`schema`] - Schema plugins, the registry, and composed prim definitions
//! - [`stitch`] - Strong/weak layered merge of spec trees
//! - [`diag`] - Coding-error and warning diagnostics channel

pub mod diag;
pub mod layer;
pub mod listop;
pub mod path;
pub mod schema;
pub mod spec;
pub mod stitch;
pub mod value;

pub use layer::{ChangeBlock, Layer, SpecType};
pub use listop::ListOp;
pub use path::Path;
pub use schema::{PrimDefinition, SchemaPlugin, SchemaRegistry};
pub use spec::{
    AttributeSpec, PrimSpec, PropertySpecExt, RelationshipSpec, Spec, Specifier, Variability,
};
pub use stitch::{stitch_info, stitch_layers};
pub use value::{Dict, Value};
