//! Per-field version logs
//!
//! A `VersionLog` holds the deltas recorded for one mutable field, ordered by
//! the version at which each mutation happened. Rewinding swaps logged
//! payloads with the live value supplied by the caller, which makes the same
//! walk serve both undo and redo: below the cursor an entry holds the value a
//! mutation displaced, above it the value a rewind displaced.

use tracing::trace;

/// One logged delta
#[derive(Debug, Clone)]
struct Entry<T> {
    version: u64,
    payload: T,
}

/// Entries recorded under one scope attachment
///
/// `cursor` counts the entries currently applied to the live value. Entries
/// below it are undo payloads, entries at or above it are redo payloads left
/// behind by an untrimmed rewind.
#[derive(Debug, Clone)]
struct Frame<T> {
    entries: Vec<Entry<T>>,
    cursor: usize,
}

impl<T> Frame<T> {
    fn fresh() -> Self {
        Frame {
            entries: Vec::new(),
            cursor: 0,
        }
    }

    /// Drop applied entries below `boundary`; they can no longer be rewind
    /// targets. Entries at or above the cursor stay whatever their version:
    /// they are unapplied redo payloads, and rewinds to targets at or past
    /// the boundary still replay through them.
    fn prune(&mut self, boundary: u64) {
        let dead = self
            .entries
            .partition_point(|e| e.version < boundary)
            .min(self.cursor);
        if dead > 0 {
            self.entries.drain(..dead);
            self.cursor -= dead;
        }
    }
}

/// Append-only delta log for a single field
///
/// The active frame receives new deltas; one saved frame is stacked beneath
/// it for every scope attachment that has not yet been unwound. Entries in a
/// frame are kept in non-decreasing version order, which holds as long as
/// versions are issued by an advancing checkpoint clock.
#[derive(Debug, Clone)]
pub struct VersionLog<T> {
    active: Frame<T>,
    saved: Vec<Frame<T>>,
    floor: u64,
}

impl<T> VersionLog<T> {
    /// Create an empty log
    pub fn new() -> Self {
        VersionLog {
            active: Frame::fresh(),
            saved: Vec::new(),
            floor: 0,
        }
    }

    /// Record the payload a mutation at `version` is about to displace
    ///
    /// Any redo entries left by an earlier untrimmed rewind are discarded
    /// first: a new write forks the timeline and the old branch can no longer
    /// be replayed.
    pub fn record(&mut self, payload: T, version: u64) {
        self.active.entries.truncate(self.active.cursor);
        debug_assert!(
            self.active.entries.last().is_none_or(|e| e.version <= version),
            "version clock regressed"
        );
        trace!(version, "recorded field delta");
        self.active.entries.push(Entry { version, payload });
        self.active.cursor = self.active.entries.len();
    }

    /// Move the live value to its state as of `target`
    ///
    /// `touch` is called once per crossed entry and must swap the entry
    /// payload with the corresponding live slot. Entries above `target` are
    /// unapplied newest-first, then entries at or below it are reapplied
    /// oldest-first, so a log parked in the past can move forward again. With
    /// `trim` the entries left unapplied are discarded and redo past `target`
    /// becomes impossible.
    ///
    /// Callers check `floor()` first; the field layer refuses a target below
    /// it with `CommittedAway` before any payload is touched.
    pub(crate) fn rewind(&mut self, target: u64, trim: bool, mut touch: impl FnMut(&mut T)) {
        debug_assert!(target >= self.floor, "rewind below committed boundary");
        let frame = &mut self.active;
        while frame.cursor > 0 && frame.entries[frame.cursor - 1].version > target {
            frame.cursor -= 1;
            touch(&mut frame.entries[frame.cursor].payload);
        }
        while frame.cursor < frame.entries.len() && frame.entries[frame.cursor].version <= target {
            touch(&mut frame.entries[frame.cursor].payload);
            frame.cursor += 1;
        }
        if trim {
            frame.entries.truncate(frame.cursor);
        }
    }

    /// Discard history that can no longer be rewound to
    ///
    /// Applied entries below `boundary` are pruned from the active frame and
    /// from every retained saved frame; entries parked for replay by an
    /// untrimmed rewind are kept. The `drop_saved` oldest saved frames are
    /// discarded outright because the attachments that produced them are
    /// gone. Raises the committed floor to `boundary`.
    pub fn commit(&mut self, boundary: u64, drop_saved: usize) {
        debug_assert!(drop_saved <= self.saved.len(), "saved frames out of step");
        let dead = drop_saved.min(self.saved.len());
        if dead > 0 {
            self.saved.drain(..dead);
        }
        for frame in &mut self.saved {
            frame.prune(boundary);
        }
        self.active.prune(boundary);
        self.floor = self.floor.max(boundary);
    }

    /// Lowest version a rewind may still target
    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// Number of saved frames beneath the active one
    pub fn saved_depth(&self) -> usize {
        self.saved.len()
    }

    /// Park the active frame and start a fresh one
    pub fn push_state(&mut self) {
        let parked = std::mem::replace(&mut self.active, Frame::fresh());
        self.saved.push(parked);
    }

    /// Discard the active frame and resume the most recently saved one
    ///
    /// Returns false when no saved frame exists. The discarded frame is not
    /// recoverable; redo across an attachment boundary is unsupported.
    pub fn pop_state(&mut self) -> bool {
        match self.saved.pop() {
            Some(frame) => {
                self.active = frame;
                true
            }
            None => false,
        }
    }

    /// Number of entries in the active frame
    pub fn len(&self) -> usize {
        self.active.entries.len()
    }

    /// True when the active frame holds no entries
    pub fn is_empty(&self) -> bool {
        self.active.entries.is_empty()
    }
}

impl<T> Default for VersionLog<T> {
    fn default() -> Self {
        Self::new()
    }
}
