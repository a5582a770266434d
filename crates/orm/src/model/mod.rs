//! Model System - entity trait and persisted record shapes
//!
//! - `core_trait`: the `Model` trait every entity implements
//! - `primary_key`: the caller-assigned identity type
//! - `record`: flattened entity state handed to a unit of work on persist

pub mod core_trait;
pub mod primary_key;
pub mod record;

pub use core_trait::Model;
pub use primary_key::EntityId;
pub use record::EntityRecord;
