//! Retrograde – Field-granular checkpoint and rollback for actor-oriented models
//!
//! This crate implements speculative execution support for object graphs:
//! - One shared scope handle per rollback domain, with a monotonic version clock
//! - Per-field delta logs that rewind and replay individual assignments
//! - Graph-wide attach, commit, and restore driven from a single root object
//! - Nested domains: attaching an already enrolled object parks its history,
//!   and a deep enough restore unwinds the attachment again
//! - Indexed aggregate fields whose slots roll back independently
//!
//! ```
//! use retrograde::model::Counter;
//! use retrograde::{Checkpoint, Versioned};
//!
//! let scope = Checkpoint::new();
//! let mut counter = Counter::new();
//! counter.attach(&scope)?;
//!
//! scope.advance();
//! counter.increment();
//! scope.advance();
//! counter.increment();
//! assert_eq!(counter.count(), 2);
//!
//! counter.restore(1, false)?;
//! assert_eq!(counter.count(), 1);
//! # Ok::<(), retrograde::EngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Rollback core: scope handles, delta logs, and graph traversal
pub mod engine;
/// Ready-made participants built on the engine
pub mod model;

// Re-export the driver-facing surface
pub use engine::{
    Checkpoint, CheckpointId, EngineError, Lineage, ObjectId, ScopeReport, Shared, Versioned,
};

/// Current version of the retrograde engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
