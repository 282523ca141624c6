//! Error types for the rollback engine
//!
//! Domain errors use thiserror; anyhow is reserved for the model layer and
//! demo drivers. Recoverable no-op conditions (restoring an inactive object,
//! committing an empty log) are not errors and never appear here.

use thiserror::Error;

/// Top-level engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Field-level history errors
    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    /// Object-graph attach/restore errors
    #[error("Rollback error: {0}")]
    Rollback(#[from] RollbackError),
}

/// Field-level history errors
#[derive(Debug, Error)]
pub enum FieldError {
    /// Restore target predates the committed boundary
    #[error("field '{field}': restore target {target} predates committed boundary {floor}")]
    CommittedAway {
        /// Field label
        field: &'static str,
        /// Requested restore target
        target: u64,
        /// Lowest version still restorable
        floor: u64,
    },

    /// Saved log states disagree with the recorded attachment depth
    #[error("field '{field}': saved log states disagree with attachment depth")]
    StackMismatch {
        /// Field label
        field: &'static str,
    },
}

/// Convenience result alias for field operations
pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// Object-graph attach/restore errors
#[derive(Debug, Error)]
pub enum RollbackError {
    /// A field of the named object failed
    #[error("object '{object}': {source}")]
    Field {
        /// Label of the owning object
        object: String,
        /// Underlying field failure
        source: FieldError,
    },

    /// Restore target predates the object's committed attachment history
    #[error("object '{object}': restore target {target} predates committed boundary {floor}")]
    HistoryCommittedAway {
        /// Label of the owning object
        object: String,
        /// Requested restore target
        target: u64,
        /// Lowest version still restorable
        floor: u64,
    },

    /// Object is already enrolled in a different live scope
    #[error("object '{object}' is already enrolled in a different live scope")]
    AmbiguousOwnership {
        /// Label of the contested object
        object: String,
    },
}

/// Convenience result alias for attach/commit/restore operations
pub type RollbackResult<T> = std::result::Result<T, RollbackError>;

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
