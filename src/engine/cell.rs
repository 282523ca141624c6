//! Versioned scalar fields
//!
//! `VersionedCell` wraps one mutable value together with its delta log.
//! Mutators take the owning scope handle and log the displaced value when the
//! scope is active; while the scope is inactive they behave like plain
//! assignment. `TrackedField` is the object-safe face the graph traversal
//! drives, so an object can expose all of its fields as one list.

use tracing::trace;

use crate::engine::error::{FieldError, FieldResult};
use crate::engine::log::VersionLog;
use crate::engine::scope::Checkpoint;

/// Per-field operations driven by attach, commit, and restore
///
/// Implementations keep their saved-state depth equal to the owning object's
/// recorded attachment depth; the traversal checks this before touching
/// values.
pub trait TrackedField {
    /// Field label used in diagnostics
    fn label(&self) -> &'static str;

    /// Lowest version a restore may still target
    fn committed_floor(&self) -> u64;

    /// Number of saved log states beneath the active one
    fn saved_depth(&self) -> usize;

    /// Park the active log state for a new scope attachment
    fn push_state(&mut self);

    /// Discard the active log state and resume the saved one
    fn pop_state(&mut self) -> FieldResult<()>;

    /// Prune history below `boundary` and drop the `drop_saved` oldest
    /// saved states
    fn commit(&mut self, boundary: u64, drop_saved: usize);

    /// Move the value to its state as of `target`
    fn restore(&mut self, target: u64, trim: bool) -> FieldResult<()>;
}

/// A single mutable value with rollback support
#[derive(Debug, Clone)]
pub struct VersionedCell<T> {
    label: &'static str,
    value: T,
    log: VersionLog<T>,
}

impl<T> VersionedCell<T> {
    /// Create a cell holding `value`
    pub fn new(label: &'static str, value: T) -> Self {
        VersionedCell {
            label,
            value,
            log: VersionLog::new(),
        }
    }

    /// Current value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Assign a new value, logging the displaced one when `scope` is active
    pub fn set(&mut self, scope: &Checkpoint, value: T) {
        let prior = std::mem::replace(&mut self.value, value);
        if scope.is_active() {
            trace!(field = self.label, version = scope.timestamp(), "logged assignment");
            self.log.record(prior, scope.timestamp());
        }
    }

    /// Assign the result of applying `f` to the current value
    ///
    /// Covers compound mutations such as increments: one delta is logged,
    /// then the derived value is written.
    pub fn update(&mut self, scope: &Checkpoint, f: impl FnOnce(&T) -> T) {
        let next = f(&self.value);
        self.set(scope, next);
    }

    /// Number of deltas in the active log state
    pub fn history_len(&self) -> usize {
        self.log.len()
    }
}

impl<T> TrackedField for VersionedCell<T> {
    fn label(&self) -> &'static str {
        self.label
    }

    fn committed_floor(&self) -> u64 {
        self.log.floor()
    }

    fn saved_depth(&self) -> usize {
        self.log.saved_depth()
    }

    fn push_state(&mut self) {
        self.log.push_state();
    }

    fn pop_state(&mut self) -> FieldResult<()> {
        if self.log.pop_state() {
            Ok(())
        } else {
            Err(FieldError::StackMismatch { field: self.label })
        }
    }

    fn commit(&mut self, boundary: u64, drop_saved: usize) {
        self.log.commit(boundary, drop_saved);
    }

    fn restore(&mut self, target: u64, trim: bool) -> FieldResult<()> {
        if target < self.log.floor() {
            return Err(FieldError::CommittedAway {
                field: self.label,
                target,
                floor: self.log.floor(),
            });
        }
        let VersionedCell { value, log, .. } = self;
        log.rewind(target, trim, |payload| std::mem::swap(payload, value));
        Ok(())
    }
}
