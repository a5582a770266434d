//! Storage Backend Abstractions
//!
//! The engine talks to storage through the `StorageBackend` trait. The only
//! shipped implementation keeps tables in memory.

pub mod core;
pub mod memory;

// Re-export core traits and types
pub use self::core::*;
pub use memory::MemoryBackend;
