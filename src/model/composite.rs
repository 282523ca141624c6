//! Composite and linked participants
//!
//! `Assembly` nests participants through owned edges, so one attach, commit,
//! or restore covers the whole tree. `Relay` keeps its neighbour links in
//! tracked cells and reports them as linked edges, which is enough for
//! chains and rings that rewire themselves over time.

use anyhow::{Context, bail};

use crate::engine::cell::{TrackedField, VersionedCell};
use crate::engine::object::{Edge, Lineage, Shared, Versioned, attach_graph};
use crate::model::sources::{Accumulator, Ramp};

/// Composite participant owning a ramp that feeds an accumulator
///
/// Only the cycle counter is a direct field; the nested participants manage
/// their own state and are reached through owned edges.
#[derive(Debug)]
pub struct Assembly {
    lineage: Lineage,
    cycles: VersionedCell<u64>,
    ramp: Ramp,
    accumulator: Accumulator,
}

impl Assembly {
    /// Create an assembly around a fresh ramp and accumulator
    pub fn new(init: i64, step: i64, window_len: usize) -> Self {
        Assembly {
            lineage: Lineage::new("assembly"),
            cycles: VersionedCell::new("cycles", 0),
            ramp: Ramp::new(init, step),
            accumulator: Accumulator::new(window_len),
        }
    }

    /// Completed cycle count
    pub fn cycles(&self) -> u64 {
        *self.cycles.get()
    }

    /// The nested ramp
    pub fn ramp(&self) -> &Ramp {
        &self.ramp
    }

    /// The nested accumulator
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Fire the ramp, fold its output into the accumulator, and return the
    /// running total
    pub fn step(&mut self) -> anyhow::Result<i64> {
        let sample = self.ramp.fire();
        self.accumulator.accumulate(sample);
        let window_len = self.accumulator.window().len();
        if window_len == 0 {
            bail!("assembly has an empty sample window");
        }
        let slot = *self.cycles.get() as usize % window_len;
        self.accumulator
            .record_sample(slot, sample)
            .context("recording assembly sample")?;
        self.cycles.update(self.lineage.scope(), |c| c + 1);
        Ok(self.accumulator.sum())
    }
}

impl Versioned for Assembly {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn lineage_mut(&mut self) -> &mut Lineage {
        &mut self.lineage
    }

    fn fields(&mut self) -> Vec<&mut dyn TrackedField> {
        vec![&mut self.cycles]
    }

    fn edges(&mut self) -> Vec<Edge<'_>> {
        vec![
            Edge::Owned(&mut self.ramp),
            Edge::Owned(&mut self.accumulator),
        ]
    }
}

/// Pipeline node whose neighbour links are themselves rolled back
///
/// Links live in tracked cells, so severing or re-pointing one is just
/// another logged assignment and a restore brings back the topology of the
/// target version along with the payloads.
#[derive(Debug)]
pub struct Relay {
    lineage: Lineage,
    payload: VersionedCell<i64>,
    next: VersionedCell<Option<Shared<Relay>>>,
    prev: VersionedCell<Option<Shared<Relay>>>,
}

impl Relay {
    /// Create an unlinked relay
    pub fn new(label: impl Into<String>, payload: i64) -> Self {
        Relay {
            lineage: Lineage::new(label),
            payload: VersionedCell::new("payload", payload),
            next: VersionedCell::new("next", None),
            prev: VersionedCell::new("prev", None),
        }
    }

    /// Carried value
    pub fn payload(&self) -> i64 {
        *self.payload.get()
    }

    /// Overwrite the carried value
    pub fn set_payload(&mut self, value: i64) {
        self.payload.set(self.lineage.scope(), value);
    }

    /// Downstream neighbour, if linked
    pub fn next(&self) -> Option<Shared<Relay>> {
        self.next.get().clone()
    }

    /// Upstream neighbour, if linked
    pub fn prev(&self) -> Option<Shared<Relay>> {
        self.prev.get().clone()
    }

    fn set_next(&mut self, value: Option<Shared<Relay>>) {
        self.next.set(self.lineage.scope(), value);
    }

    fn set_prev(&mut self, value: Option<Shared<Relay>>) {
        self.prev.set(self.lineage.scope(), value);
    }
}

impl Versioned for Relay {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn lineage_mut(&mut self) -> &mut Lineage {
        &mut self.lineage
    }

    fn fields(&mut self) -> Vec<&mut dyn TrackedField> {
        vec![&mut self.payload, &mut self.next, &mut self.prev]
    }

    fn edges(&mut self) -> Vec<Edge<'_>> {
        let mut edges = Vec::new();
        if let Some(next) = self.next.get() {
            edges.push(Edge::Linked(next.as_versioned()));
        }
        if let Some(prev) = self.prev.get() {
            edges.push(Edge::Linked(prev.as_versioned()));
        }
        edges
    }
}

/// Link `left` to `right`, merging their rollback domains first
///
/// Whichever side is in a live scope pulls the other side's reachable chain
/// into it; linking two different live scopes is refused before anything is
/// mutated. Both link assignments are logged, so the link itself is undone
/// by a restore past this point.
pub fn link_relays(left: &Shared<Relay>, right: &Shared<Relay>) -> anyhow::Result<()> {
    let left_scope = left.read().lineage().scope().clone();
    let right_scope = right.read().lineage().scope().clone();
    if !left_scope.same_scope(&right_scope) {
        if left_scope.is_active() && right_scope.is_active() {
            bail!(
                "relays '{}' and '{}' belong to different live scopes",
                left.label(),
                right.label()
            );
        }
        if right_scope.is_active() {
            let mut node = left.write();
            attach_graph(&mut *node, &right_scope)
                .with_context(|| format!("enrolling relay '{}'", left.label()))?;
        } else {
            let mut node = right.write();
            attach_graph(&mut *node, &left_scope)
                .with_context(|| format!("enrolling relay '{}'", right.label()))?;
        }
    }
    left.write().set_next(Some(right.clone()));
    right.write().set_prev(Some(left.clone()));
    Ok(())
}

/// Sever the link between `left` and its downstream neighbour
///
/// Returns the detached neighbour, which stays enrolled in its scope. Both
/// sides of the severed link are logged.
pub fn unlink_next(left: &Shared<Relay>) -> Option<Shared<Relay>> {
    let right = {
        let mut node = left.write();
        let right = node.next()?;
        node.set_next(None);
        right
    };
    right.write().set_prev(None);
    Some(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::object::restore_graph;
    use crate::engine::scope::Checkpoint;

    #[test]
    fn test_assembly_rolls_back_as_one_unit() {
        let scope = Checkpoint::new();
        let mut asm = Assembly::new(5, 2, 3);
        asm.attach(&scope).unwrap();

        scope.advance();
        assert_eq!(asm.step().unwrap(), 5);
        scope.advance();
        assert_eq!(asm.step().unwrap(), 12);

        asm.restore(1, false).unwrap();
        assert_eq!(asm.cycles(), 1);
        assert_eq!(asm.ramp().state(), 7);
        assert_eq!(asm.accumulator().sum(), 5);
        assert_eq!(asm.accumulator().window(), &[5, 0, 0]);

        asm.restore(0, false).unwrap();
        assert_eq!(asm.cycles(), 0);
        assert_eq!(asm.ramp().state(), 5);
        assert_eq!(asm.accumulator().sum(), 0);
        assert_eq!(asm.accumulator().window(), &[0, 0, 0]);

        asm.restore(2, false).unwrap();
        assert_eq!(asm.cycles(), 2);
        assert_eq!(asm.accumulator().sum(), 12);
    }

    #[test]
    fn test_empty_window_assembly_refuses_to_step() {
        let mut asm = Assembly::new(1, 1, 0);
        assert!(asm.step().is_err());
    }

    #[test]
    fn test_relay_links_roll_back_with_payloads() {
        let scope = Checkpoint::new();
        let a = Shared::new(Relay::new("relay-a", 10));
        let b = Shared::new(Relay::new("relay-b", 20));
        attach_graph(&mut *a.write(), &scope).unwrap();

        scope.advance();
        a.write().set_payload(11);
        scope.advance();
        link_relays(&a, &b).unwrap();
        scope.advance();
        b.write().set_payload(21);
        a.write().set_payload(12);

        restore_graph(&mut *a.write(), 1, false).unwrap();
        assert_eq!(a.read().payload(), 11);
        assert!(a.read().next().is_none());
        assert_eq!(b.read().payload(), 20);
        assert!(b.read().prev().is_none());
        assert!(a.read().lineage().scope().same_scope(&scope));
        assert!(!b.read().lineage().scope().same_scope(&scope));
        assert!(!b.read().lineage().scope().is_active());
    }

    #[test]
    fn test_severed_link_is_restored_and_traversed() {
        let scope = Checkpoint::new();
        let a = Shared::new(Relay::new("relay-a", 1));
        let b = Shared::new(Relay::new("relay-b", 2));
        link_relays(&a, &b).unwrap();
        attach_graph(&mut *a.write(), &scope).unwrap();

        scope.advance();
        a.write().set_payload(100);
        b.write().set_payload(200);
        scope.advance();
        unlink_next(&a);
        scope.advance();
        b.write().set_payload(300);
        assert!(a.read().next().is_none());

        restore_graph(&mut *a.write(), 1, false).unwrap();
        assert_eq!(a.read().payload(), 100);
        assert_eq!(b.read().payload(), 200);
        assert!(a.read().next().is_some_and(|n| n.id() == b.id()));
        assert!(b.read().prev().is_some_and(|p| p.id() == a.id()));
    }

    #[test]
    fn test_linking_across_live_scopes_is_refused() {
        let scope_a = Checkpoint::new();
        let scope_b = Checkpoint::new();
        let a = Shared::new(Relay::new("relay-a", 1));
        let b = Shared::new(Relay::new("relay-b", 2));
        attach_graph(&mut *a.write(), &scope_a).unwrap();
        attach_graph(&mut *b.write(), &scope_b).unwrap();
        scope_a.advance();
        scope_b.advance();

        assert!(link_relays(&a, &b).is_err());
        assert!(a.read().next().is_none());
        assert!(b.read().prev().is_none());
    }

    #[test]
    fn test_inactive_chain_joins_the_live_domain() {
        let live = Checkpoint::new();
        let b = Shared::new(Relay::new("relay-b", 2));
        attach_graph(&mut *b.write(), &live).unwrap();
        live.advance();

        let a = Shared::new(Relay::new("relay-a", 1));
        link_relays(&a, &b).unwrap();
        assert!(a.read().lineage().scope().same_scope(&live));
        a.write().set_payload(5);

        restore_graph(&mut *b.write(), 0, false).unwrap();
        assert_eq!(a.read().payload(), 1);
        assert!(!a.read().lineage().scope().same_scope(&live));
        assert!(b.read().prev().is_none());
        assert!(a.read().next().is_none());
    }
}
