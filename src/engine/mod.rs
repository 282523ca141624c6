//! Checkpoint and rollback engine
//!
//! This module provides the field-granular rollback core: scope handles with
//! one logical clock each, per-field delta logs, per-object attachment
//! history, and the graph traversal that drives attach, commit, and restore
//! across whole object graphs.
//!
//! The intended driver loop is: create a `Checkpoint`, attach a graph of
//! `Versioned` objects, advance the clock before each speculative step,
//! mutate through `VersionedCell`/`VersionedSlots` setters, then either
//! `commit` the history or `restore` to an earlier version.

// Submodules
pub mod cell;
pub mod error;
pub mod history;
pub mod log;
pub mod object;
pub mod scope;
pub mod slots;

// Re-export commonly used types
pub use cell::{TrackedField, VersionedCell};
pub use error::{EngineError, FieldError, FieldResult, Result, RollbackError, RollbackResult};
pub use history::ScopeHistory;
pub use log::VersionLog;
pub use object::{
    Edge, Lineage, ObjectId, Shared, Versioned, attach_graph, commit_graph, restore_graph,
};
pub use scope::{Checkpoint, CheckpointId, ReportedObject, ScopeReport};
pub use slots::{Aggregate, Grid, SlotPrior, VersionedSlots};
