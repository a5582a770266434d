//! Entity identity

/// Caller-assigned entity identity. Never generated, never reassigned.
pub type EntityId = i64;
