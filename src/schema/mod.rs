//! Schema registry.
//!
//! A declarative [`SchemaConfig`] is compiled once into an immutable
//! [`SchemaRegistry`] of closed [`FieldType`] variants, so reads and writes
//! never inspect configuration at runtime. The registry is shared by `Arc`;
//! [`install`] additionally offers a one-time process-wide slot.

mod config;
mod registry;

pub use config::{FieldConfig, FieldTypeConfig, SchemaConfig, TypeConfig};
pub use registry::{
    install, installed, EntitySchema, FieldType, Fields, PrimitiveKind, SchemaRegistry,
    DEFAULT_ID_FIELD,
};
