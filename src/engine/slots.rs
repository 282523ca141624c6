//! Versioned aggregate fields
//!
//! `VersionedSlots` tracks a field whose value is an indexed aggregate, such
//! as a vector or matrix. Element writes log only the displaced element, so
//! restoring one slot never disturbs its neighbours; whole-value writes and
//! pre-mutation backups log the full aggregate. Element deltas replay against
//! the aggregate shape that was live when they were recorded, which holds as
//! long as every shape change goes through `set` or `backup_with`.

use std::fmt;

use tracing::{trace, warn};

use crate::engine::cell::TrackedField;
use crate::engine::error::{FieldError, FieldResult};
use crate::engine::log::VersionLog;
use crate::engine::scope::Checkpoint;

/// An indexed container whose elements can be tracked one at a time
pub trait Aggregate: Clone + fmt::Debug {
    /// Address of one element
    type Index: Copy + Eq + fmt::Debug;
    /// Element type
    type Part: Clone + fmt::Debug;

    /// Element at `index`, if in range
    fn part(&self, index: Self::Index) -> Option<&Self::Part>;

    /// Mutable element at `index`, if in range
    ///
    /// Implementations must keep an index valid for as long as the aggregate
    /// shape that produced it is live.
    fn part_mut(&mut self, index: Self::Index) -> Option<&mut Self::Part>;
}

impl<T: Clone + fmt::Debug> Aggregate for Vec<T> {
    type Index = usize;
    type Part = T;

    fn part(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    fn part_mut(&mut self, index: usize) -> Option<&mut T> {
        self.get_mut(index)
    }
}

/// Dense row-major matrix addressed by `(row, col)`
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `fill`
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Grid {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }
}

impl<T> Grid<T> {
    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell at `(row, col)`, if in range
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }
}

impl<T: Clone + fmt::Debug> Aggregate for Grid<T> {
    type Index = (usize, usize);
    type Part = T;

    fn part(&self, (row, col): (usize, usize)) -> Option<&T> {
        self.get(row, col)
    }

    fn part_mut(&mut self, (row, col): (usize, usize)) -> Option<&mut T> {
        if row < self.rows && col < self.cols {
            self.cells.get_mut(row * self.cols + col)
        } else {
            None
        }
    }
}

/// Displaced state logged for one aggregate mutation
#[derive(Debug, Clone)]
pub enum SlotPrior<A: Aggregate> {
    /// The full aggregate, displaced by a whole-value write or backup
    Whole(A),
    /// A single element, displaced by an indexed write
    Part {
        /// Address of the element
        index: A::Index,
        /// The displaced element
        part: A::Part,
    },
}

/// An indexed aggregate field with element-granular rollback
#[derive(Debug, Clone)]
pub struct VersionedSlots<A: Aggregate> {
    label: &'static str,
    value: A,
    log: VersionLog<SlotPrior<A>>,
}

impl<A: Aggregate> VersionedSlots<A> {
    /// Create a slots field holding `value`
    pub fn new(label: &'static str, value: A) -> Self {
        VersionedSlots {
            label,
            value,
            log: VersionLog::new(),
        }
    }

    /// Current aggregate
    pub fn get(&self) -> &A {
        &self.value
    }

    /// Element at `index`, if in range
    pub fn part(&self, index: A::Index) -> Option<&A::Part> {
        self.value.part(index)
    }

    /// Replace the whole aggregate, logging the displaced one when `scope`
    /// is active
    pub fn set(&mut self, scope: &Checkpoint, value: A) {
        let prior = std::mem::replace(&mut self.value, value);
        if scope.is_active() {
            trace!(field = self.label, version = scope.timestamp(), "logged whole assignment");
            self.log.record(SlotPrior::Whole(prior), scope.timestamp());
        }
    }

    /// Replace one element, logging the displaced element when `scope` is
    /// active
    ///
    /// Returns false and leaves the aggregate untouched when `index` is out
    /// of range.
    pub fn set_part(&mut self, scope: &Checkpoint, index: A::Index, part: A::Part) -> bool {
        let Some(slot) = self.value.part_mut(index) else {
            return false;
        };
        let prior = std::mem::replace(slot, part);
        if scope.is_active() {
            trace!(
                field = self.label,
                index = ?index,
                version = scope.timestamp(),
                "logged element assignment"
            );
            self.log.record(SlotPrior::Part { index, part: prior }, scope.timestamp());
        }
        true
    }

    /// Log the full aggregate, then mutate it in place through `f`
    ///
    /// Required before bulk mutations that bypass `set_part`, such as
    /// sorting, so the restore baseline stays correct.
    pub fn backup_with<R>(&mut self, scope: &Checkpoint, f: impl FnOnce(&mut A) -> R) -> R {
        if scope.is_active() {
            trace!(field = self.label, version = scope.timestamp(), "logged backup");
            self.log
                .record(SlotPrior::Whole(self.value.clone()), scope.timestamp());
        }
        f(&mut self.value)
    }

    /// Number of deltas in the active log state
    pub fn history_len(&self) -> usize {
        self.log.len()
    }
}

impl<A: Aggregate> TrackedField for VersionedSlots<A> {
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
        let VersionedSlots { label, value, log } = self;
        let mut stray = None;
        log.rewind(target, trim, |payload| match payload {
            SlotPrior::Whole(aggregate) => std::mem::swap(aggregate, value),
            SlotPrior::Part { index, part } => match value.part_mut(*index) {
                Some(live) => std::mem::swap(live, part),
                None => stray = Some(format!("{index:?}")),
            },
        });
        if let Some(index) = stray {
            warn!(field = *label, index = %index, "slot vanished during restore");
            debug_assert!(false, "slot {index} vanished during restore of '{label}'");
        }
        Ok(())
    }
}
