//! # tally
//!
//! Durable registry of named sample summaries.
//!
//! A client submits a named series of numbers; tally reduces it to a fixed
//! summary (count, minimum, maximum, mean, population standard deviation)
//! and stores it keyed by name. Summaries can be looked up, listed, or
//! removed by name, and the whole table survives restarts through a JSON
//! backing file that is rewritten after every mutation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tally::Registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load (or create) the backing file
//! let registry = Arc::new(Registry::open("./data/data.json")?);
//!
//! // Reduce and store a series
//! registry.insert_samples("latency", &[12.0, 15.5, 11.0, 19.25])?;
//!
//! // Read it back
//! let entry = registry.search("latency")?;
//! println!("{} {} {:.6} {:.6}", entry.name, entry.count, entry.mean, entry.std_dev);
//!
//! for entry in registry.list() {
//!     println!("{}", entry.name);
//! }
//!
//! registry.delete("latency")?;
//! assert_eq!(registry.status(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`entry`] — [`Entry`] and the pure [`reduce`](entry::reduce) function
//! - [`store`] — [`Store`]: table, name index, backing-file snapshots, bootstrap
//! - [`registry`] — [`Registry`]: readers-writer lock over the store
//! - [`error`] — Error types

pub mod entry;
pub mod error;
pub mod registry;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use entry::{Entry, reduce};
pub use error::{ErrorKind, Result, TallyError};
pub use registry::Registry;
pub use store::Store;
