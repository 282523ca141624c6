//! Integration tests for single-scope rollback
//!
//! Drives the public surface the way a speculative driver would: advance the
//! version clock, mutate tracked state, then restore or commit.

use retrograde::engine::{Grid, Lineage, TrackedField, VersionedSlots};
use retrograde::model::Counter;
use retrograde::{Checkpoint, Versioned};

#[test]
fn test_counter_walkthrough() {
    let scope = Checkpoint::new();
    let mut counter = Counter::new();
    counter.attach(&scope).unwrap();
    assert_eq!(scope.timestamp(), 0);

    scope.advance();
    counter.set_count(1);
    scope.advance();
    counter.set_count(2);
    assert_eq!(counter.count(), 2);

    counter.restore(1, false).unwrap();
    assert_eq!(counter.count(), 1);
    counter.restore(0, false).unwrap();
    assert_eq!(counter.count(), 0);
    counter.restore(2, false).unwrap();
    assert_eq!(counter.count(), 2);
}

#[test]
fn test_trim_discards_the_redo_path() {
    let scope = Checkpoint::new();
    let mut counter = Counter::new();
    counter.attach(&scope).unwrap();

    scope.advance();
    counter.set_count(1);
    scope.advance();
    counter.set_count(2);

    counter.restore(1, true).unwrap();
    assert_eq!(counter.count(), 1);

    counter.restore(2, false).unwrap();
    assert_eq!(counter.count(), 1, "trimmed history cannot be replayed");
}

#[test]
fn test_mutation_after_restore_forks_history() {
    let scope = Checkpoint::new();
    let mut counter = Counter::new();
    counter.attach(&scope).unwrap();

    scope.advance();
    counter.set_count(1);
    scope.advance();
    counter.set_count(2);

    counter.restore(1, false).unwrap();
    scope.advance();
    counter.set_count(7);

    counter.restore(0, false).unwrap();
    assert_eq!(counter.count(), 0);
    counter.restore(3, false).unwrap();
    assert_eq!(counter.count(), 7);

    // The overwritten branch is gone: version 2 now resolves to the state
    // the fork grew from.
    counter.restore(2, false).unwrap();
    assert_eq!(counter.count(), 1);
}

struct Board {
    lineage: Lineage,
    cells: VersionedSlots<Grid<i32>>,
}

impl Board {
    fn new(rows: usize, cols: usize) -> Self {
        Board {
            lineage: Lineage::new("board"),
            cells: VersionedSlots::new("cells", Grid::new(rows, cols, 0)),
        }
    }
}

impl Versioned for Board {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn lineage_mut(&mut self) -> &mut Lineage {
        &mut self.lineage
    }

    fn fields(&mut self) -> Vec<&mut dyn TrackedField> {
        vec![&mut self.cells]
    }
}

#[test]
fn test_grid_slots_roll_back_independently() {
    let scope = Checkpoint::new();
    let mut board = Board::new(2, 2);
    board.attach(&scope).unwrap();

    scope.advance();
    assert!(board.cells.set_part(&scope, (0, 0), 5));
    scope.advance();
    assert!(board.cells.set_part(&scope, (1, 1), 9));
    assert_eq!(board.cells.get().get(0, 0), Some(&5));
    assert_eq!(board.cells.get().get(1, 1), Some(&9));

    board.restore(1, false).unwrap();
    assert_eq!(board.cells.get().get(0, 0), Some(&5));
    assert_eq!(board.cells.get().get(1, 1), Some(&0));

    assert!(!board.cells.set_part(&scope, (5, 5), 1));
}

#[test]
fn test_commit_retires_old_versions() {
    use retrograde::engine::RollbackError;

    let scope = Checkpoint::new();
    let mut counter = Counter::new();
    counter.attach(&scope).unwrap();
    for v in 1..=3 {
        scope.advance();
        counter.set_count(v * 11);
    }

    counter.commit(2);
    let err = counter.restore(1, false).unwrap_err();
    assert!(matches!(
        err,
        RollbackError::HistoryCommittedAway {
            target: 1,
            floor: 2,
            ..
        }
    ));
    assert_eq!(counter.count(), 33, "failed restore must not touch values");

    counter.restore(2, false).unwrap();
    assert_eq!(counter.count(), 22);
}

#[test]
fn test_failed_restore_leaves_the_graph_untouched() {
    use retrograde::engine::RollbackError;
    use retrograde::model::Assembly;

    let scope = Checkpoint::new();
    let mut asm = Assembly::new(5, 2, 3);
    asm.attach(&scope).unwrap();
    scope.advance();
    asm.step().unwrap();
    scope.advance();
    asm.step().unwrap();
    asm.commit(2);

    let err = asm.restore(1, false).unwrap_err();
    assert!(matches!(err, RollbackError::HistoryCommittedAway { .. }));
    assert_eq!(asm.cycles(), 2);
    assert_eq!(asm.accumulator().sum(), 12);
    assert_eq!(asm.ramp().state(), 9);
}

#[test]
fn test_inactive_scope_is_plain_assignment() {
    let scope = Checkpoint::new();
    let mut counter = Counter::new();
    counter.attach(&scope).unwrap();

    counter.set_count(5);
    assert!(!scope.is_active());

    counter.restore(0, false).unwrap();
    assert_eq!(counter.count(), 5, "nothing is logged before the clock starts");
}
