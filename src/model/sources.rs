//! Single-object rollback participants
//!
//! `Counter` is the smallest useful participant: one tracked field behind
//! plain mutator methods. `Ramp` shows derived updates against a tracked
//! state register, and `Accumulator` mixes a scalar total with an indexed
//! sample window so individual slots roll back independently.

use anyhow::bail;

use crate::engine::cell::{TrackedField, VersionedCell};
use crate::engine::object::{Lineage, Versioned};
use crate::engine::slots::VersionedSlots;

/// Up/down counter with a single tracked field
#[derive(Debug)]
pub struct Counter {
    lineage: Lineage,
    count: VersionedCell<i64>,
}

impl Counter {
    /// Create a counter starting at zero
    pub fn new() -> Self {
        Counter {
            lineage: Lineage::new("counter"),
            count: VersionedCell::new("count", 0),
        }
    }

    /// Current count
    pub fn count(&self) -> i64 {
        *self.count.get()
    }

    /// Overwrite the count
    pub fn set_count(&mut self, value: i64) {
        self.count.set(self.lineage.scope(), value);
    }

    /// Add one
    pub fn increment(&mut self) {
        self.count.update(self.lineage.scope(), |c| c + 1);
    }

    /// Subtract one
    pub fn decrement(&mut self) {
        self.count.update(self.lineage.scope(), |c| c - 1);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Versioned for Counter {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn lineage_mut(&mut self) -> &mut Lineage {
        &mut self.lineage
    }

    fn fields(&mut self) -> Vec<&mut dyn TrackedField> {
        vec![&mut self.count]
    }
}

/// Source producing `init`, `init + step`, `init + 2 * step`, ...
///
/// The step is a plain parameter; only the state register is tracked, so a
/// restore rewinds the output sequence without disturbing configuration.
#[derive(Debug)]
pub struct Ramp {
    lineage: Lineage,
    step: i64,
    state: VersionedCell<i64>,
}

impl Ramp {
    /// Create a ramp starting at `init` and advancing by `step`
    pub fn new(init: i64, step: i64) -> Self {
        Ramp {
            lineage: Lineage::new("ramp"),
            step,
            state: VersionedCell::new("state", init),
        }
    }

    /// Value the next firing will produce
    pub fn state(&self) -> i64 {
        *self.state.get()
    }

    /// Produce the current value and advance the state register
    pub fn fire(&mut self) -> i64 {
        let output = *self.state.get();
        let step = self.step;
        self.state.update(self.lineage.scope(), |s| s + step);
        output
    }
}

impl Versioned for Ramp {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn lineage_mut(&mut self) -> &mut Lineage {
        &mut self.lineage
    }

    fn fields(&mut self) -> Vec<&mut dyn TrackedField> {
        vec![&mut self.state]
    }
}

/// Running total plus a fixed-width window of recent samples
///
/// The window is indexed storage: writing one slot logs only that slot,
/// while bulk operations such as [`sort_window`](Accumulator::sort_window)
/// log the whole window once.
#[derive(Debug)]
pub struct Accumulator {
    lineage: Lineage,
    sum: VersionedCell<i64>,
    window: VersionedSlots<Vec<i64>>,
}

impl Accumulator {
    /// Create an accumulator with a zeroed window of `window_len` slots
    pub fn new(window_len: usize) -> Self {
        Accumulator {
            lineage: Lineage::new("accumulator"),
            sum: VersionedCell::new("sum", 0),
            window: VersionedSlots::new("window", vec![0; window_len]),
        }
    }

    /// Running total
    pub fn sum(&self) -> i64 {
        *self.sum.get()
    }

    /// Current window contents
    pub fn window(&self) -> &[i64] {
        self.window.get()
    }

    /// Add `value` to the running total
    pub fn accumulate(&mut self, value: i64) {
        self.sum.update(self.lineage.scope(), |s| s + value);
    }

    /// Store `value` in window slot `slot`
    pub fn record_sample(&mut self, slot: usize, value: i64) -> anyhow::Result<()> {
        if !self.window.set_part(self.lineage.scope(), slot, value) {
            bail!(
                "sample slot {slot} is outside the {}-slot window",
                self.window.get().len()
            );
        }
        Ok(())
    }

    /// Sort the window in place as one undoable step
    pub fn sort_window(&mut self) {
        self.window.backup_with(self.lineage.scope(), |w| w.sort());
    }

    /// Clear the total and the window
    pub fn reset(&mut self) {
        self.sum.set(self.lineage.scope(), 0);
        let len = self.window.get().len();
        self.window.set(self.lineage.scope(), vec![0; len]);
    }
}

impl Versioned for Accumulator {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn lineage_mut(&mut self) -> &mut Lineage {
        &mut self.lineage
    }

    fn fields(&mut self) -> Vec<&mut dyn TrackedField> {
        vec![&mut self.sum, &mut self.window]
    }
}
