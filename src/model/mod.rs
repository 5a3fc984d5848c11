//! Project schema model: entities, attributes, and the entity hierarchy.
//!
//! Loading the schema from spreadsheets or XML happens elsewhere; this module
//! receives the result (usually as a JSON document) and validates it.

pub mod entity;
pub mod project;
pub mod types;

pub use entity::{Attribute, Entity};
pub use project::{ExpeditionMetadataProperty, ProjectConfig, SchemaError};
pub use types::DataType;
