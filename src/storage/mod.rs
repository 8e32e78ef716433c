//! Usage storage.
//!
//! The meter reads through [`UsageBackend`], the collector writes through
//! [`UsageWriter`]. [`InMemoryUsageStore`] implements both.

pub mod backend;
pub mod memory;

// Re-export commonly used types
pub use backend::{split, UsageBackend, UsageStore, UsageWriter};
pub use memory::InMemoryUsageStore;
