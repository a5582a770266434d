//! Relationships Module - association metadata, schema registry and containers

pub mod containers;
pub mod metadata;
pub mod registry;

pub use containers::{Collection, LoadState, Reference};
pub use metadata::{EntityMetadata, FetchType, PivotConfig, RelationshipMetadata, RelationshipType};
pub use registry::SchemaRegistry;
