//! # Data Hub
//!
//! A schema-driven normalized entity cache whose entries live exactly as
//! long as the navigations that fetched or observed them.
//!
//! ## Core Concepts
//!
//! - **Schema**: Declared once; names each entity type, its id field and
//!   field types (primitive, reference, inline structure, list)
//! - **Records**: One per `(type, id)`; references are stored as ids, so
//!   every entity has a single source of truth
//! - **Referrers**: Navigation scopes holding entities alive; releasing a
//!   referrer collects whatever it alone held
//! - **Snapshots**: Copy-on-write state, so readers never see a half write
//!
//! ## Example
//!
//! ```ignore
//! use data_hub::{DataHub, SchemaConfig, SchemaRegistry, Shape};
//!
//! let registry = SchemaRegistry::configure(&SchemaConfig::from_value(&schema_json)?)?;
//! let hub = DataHub::new(registry);
//!
//! hub.save("Place", &json!({
//!     "id": 1, "name": "Paris", "country": {"id": 9, "name": "France"}
//! }), "nav-A", false)?;
//!
//! let place = hub.get("Place", 1, &Shape::Full, false, &[])?;
//!
//! hub.release(&"nav-A".into());
//! ```

pub mod error;
pub mod facade;
pub mod gc;
mod normalize;
pub mod schema;
pub mod scope;
pub mod shape;
pub mod state;
pub mod store;
pub mod types;

// Re-exports
pub use error::{HubError, Result};
pub use facade::{EntityFacade, FacadeConfig, View};
pub use gc::GcReport;
pub use schema::{
    EntitySchema, FieldConfig, FieldType, FieldTypeConfig, Fields, PrimitiveKind, SchemaConfig,
    SchemaRegistry, TypeConfig,
};
pub use scope::ReferrerScope;
pub use shape::Shape;
pub use state::{HubState, Record, ReferrerIndex};
pub use store::{DataHub, EntityRef};
pub use types::*;
