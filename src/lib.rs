//! Relay meter - day-bucketed relay usage for API gateways.
//!
//! Applications send relays through a gateway; every relay succeeds or
//! fails. This crate keeps per-application counts bucketed by UTC day and
//! answers usage queries for users, applications, load balancers and the
//! whole network.
//!
//! # Features
//!
//! - **In-memory queries**: A background loader keeps recent history and
//!   today's live counts in an atomically swapped snapshot
//! - **Exactly-once today**: Today's live counts are blended with finalized
//!   buckets without double counting
//! - **Incremental collection**: Scheduled cycles resume after the last
//!   persisted day, so no finalized day is pulled twice
//! - **Graceful shutdown**: Cycles in progress complete before loops exit
//!
//! # Architecture
//!
//! - `core`: Domain types, time range normalization, configuration, errors
//! - `storage`: Read and write store traits plus an in-memory store
//! - `meter`: Cached query layer
//! - `collector`: Source trait, incremental collector, simulated source
//! - `cli`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use relay_meter_lib::core::Config;
//! use relay_meter_lib::Application;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let app = Application::new(config)?;
//!     app.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod application;
pub mod cli;
pub mod collector;
pub mod core;
pub mod meter;
pub mod storage;

// Re-export core types for convenience
pub use crate::application::Application;
pub use crate::core::{Config, Result};
