//! Per-object scope attachment history
//!
//! Every attachment to a new scope pushes one switch record holding the
//! previous scope handle and the version line boundary at which the switch
//! happened. Restores at or below a boundary pop the record and resume the
//! previous scope; commits discard the boundaries that can no longer be
//! unwound. Switch depth always equals the number of saved log states in
//! each of the object's fields.

use tracing::debug;

use crate::engine::scope::Checkpoint;

#[derive(Debug, Clone)]
struct Switch {
    previous: Checkpoint,
    version: u64,
}

/// Record of an object's scope reassignments
#[derive(Debug, Clone, Default)]
pub struct ScopeHistory {
    switches: Vec<Switch>,
    floor: u64,
}

impl ScopeHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attachments not yet unwound
    pub fn depth(&self) -> usize {
        self.switches.len()
    }

    /// Boundary version of the most recent attachment
    pub fn top_version(&self) -> Option<u64> {
        self.switches.last().map(|s| s.version)
    }

    /// Lowest version a restore may still target
    pub fn floor(&self) -> u64 {
        self.floor
    }

    pub(crate) fn record_switch(&mut self, previous: Checkpoint, version: u64) {
        debug_assert!(
            self.switches.last().is_none_or(|s| s.version <= version),
            "attachment boundaries regressed"
        );
        self.switches.push(Switch { previous, version });
    }

    /// Pop the most recent switch, returning the scope to resume and the
    /// boundary it was recorded at
    pub(crate) fn pop_switch(&mut self) -> Option<(Checkpoint, u64)> {
        self.switches.pop().map(|s| (s.previous, s.version))
    }

    /// Number of oldest switches whose boundary sits below `boundary`
    ///
    /// These can never be popped again once `boundary` is committed, because
    /// popping a switch requires a restore target at or below its version.
    pub(crate) fn dead_levels(&self, boundary: u64) -> usize {
        self.switches
            .iter()
            .take_while(|s| s.version < boundary)
            .count()
    }

    /// Discard dead switches and raise the floor; returns how many switches
    /// were dropped
    pub(crate) fn commit(&mut self, boundary: u64) -> usize {
        let dead = self.dead_levels(boundary);
        if dead > 0 {
            debug!(dropped = dead, boundary, "committed attachment history");
            self.switches.drain(..dead);
        }
        self.floor = self.floor.max(boundary);
        dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_pop_in_reverse_order() {
        let a = Checkpoint::new();
        let b = Checkpoint::new();
        let mut history = ScopeHistory::new();

        history.record_switch(a.clone(), 5);
        history.record_switch(b.clone(), 9);
        assert_eq!(history.depth(), 2);
        assert_eq!(history.top_version(), Some(9));

        let (popped, version) = history.pop_switch().unwrap();
        assert!(popped.same_scope(&b));
        assert_eq!(version, 9);

        let (popped, version) = history.pop_switch().unwrap();
        assert!(popped.same_scope(&a));
        assert_eq!(version, 5);
        assert!(history.pop_switch().is_none());
    }

    #[test]
    fn test_commit_drops_only_dead_boundaries() {
        let mut history = ScopeHistory::new();
        history.record_switch(Checkpoint::new(), 3);
        history.record_switch(Checkpoint::new(), 7);

        assert_eq!(history.dead_levels(5), 1);
        assert_eq!(history.commit(5), 1);
        assert_eq!(history.depth(), 1);
        assert_eq!(history.top_version(), Some(7));
        assert_eq!(history.floor(), 5);

        assert_eq!(history.commit(2), 0);
        assert_eq!(history.floor(), 5);
    }
}
