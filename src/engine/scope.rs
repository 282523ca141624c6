//! Checkpoint scopes
//!
//! A `Checkpoint` is a shared rollback domain: one logical clock plus the set
//! of objects currently enrolled in it. Handles are cheap clones over shared
//! state; identity is the shared allocation, not the handle. The scope owns
//! no object data. Field logging consults only the clock, and the membership
//! set exists for bookkeeping and inspection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::object::ObjectId;

/// Scope identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub Uuid);

impl CheckpointId {
    /// Create a new random CheckpointId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ScopeState {
    id: CheckpointId,
    timestamp: u64,
    attached: HashMap<ObjectId, String>,
    created_at: DateTime<Utc>,
}

/// Shared handle to one rollback domain
///
/// A fresh scope is inactive: its clock sits at zero and no logging happens
/// under it. The clock moves only forward, through `advance` or through the
/// fast-forward applied when an object graph carrying a later clock is
/// attached.
#[derive(Clone)]
pub struct Checkpoint {
    state: Arc<RwLock<ScopeState>>,
}

impl Checkpoint {
    /// Create a new inactive scope
    pub fn new() -> Self {
        Checkpoint {
            state: Arc::new(RwLock::new(ScopeState {
                id: CheckpointId::new(),
                timestamp: 0,
                attached: HashMap::new(),
                created_at: Utc::now(),
            })),
        }
    }

    /// Scope identifier
    pub fn id(&self) -> CheckpointId {
        self.state.read().id.clone()
    }

    /// Current logical version; zero means inactive
    pub fn timestamp(&self) -> u64 {
        self.state.read().timestamp
    }

    /// True once the clock has been advanced at least once
    pub fn is_active(&self) -> bool {
        self.timestamp() > 0
    }

    /// Issue the next version number and return it
    pub fn advance(&self) -> u64 {
        let mut state = self.state.write();
        state.timestamp += 1;
        debug!(scope = %state.id, version = state.timestamp, "advanced checkpoint scope");
        state.timestamp
    }

    /// Fast-forward the clock to `version` if it is behind
    ///
    /// Keeps a graph's version line continuous when it is attached to a scope
    /// whose clock lags the graph's history. Never moves the clock backwards.
    pub(crate) fn sync_to(&self, version: u64) {
        let mut state = self.state.write();
        if state.timestamp < version {
            debug!(scope = %state.id, from = state.timestamp, to = version, "fast-forwarded scope clock");
            state.timestamp = version;
        }
    }

    /// True when both handles refer to the same scope
    pub fn same_scope(&self, other: &Checkpoint) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn enroll(&self, id: ObjectId, label: &str) {
        let mut state = self.state.write();
        debug!(scope = %state.id, object = label, "enrolled object");
        state.attached.insert(id, label.to_string());
    }

    pub(crate) fn withdraw(&self, id: &ObjectId) {
        let mut state = self.state.write();
        if let Some(label) = state.attached.remove(id) {
            debug!(scope = %state.id, object = %label, "withdrew object");
        }
    }

    /// Number of objects currently enrolled
    pub fn attached_len(&self) -> usize {
        self.state.read().attached.len()
    }

    /// True when the object is enrolled in this scope
    pub fn is_attached(&self, id: &ObjectId) -> bool {
        self.state.read().attached.contains_key(id)
    }

    /// Snapshot of the scope for inspection
    pub fn report(&self) -> ScopeReport {
        let state = self.state.read();
        let mut objects: Vec<ReportedObject> = state
            .attached
            .iter()
            .map(|(id, label)| ReportedObject {
                id: id.clone(),
                label: label.clone(),
            })
            .collect();
        objects.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.0.cmp(&b.id.0)));
        ScopeReport {
            id: state.id.clone(),
            timestamp: state.timestamp,
            created_at: state.created_at,
            objects,
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Checkpoint")
            .field("id", &state.id)
            .field("timestamp", &state.timestamp)
            .field("attached", &state.attached.len())
            .finish()
    }
}

/// One enrolled object in a scope report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedObject {
    /// Object identifier
    pub id: ObjectId,
    /// Object label
    pub label: String,
}

/// Serializable snapshot of a scope's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeReport {
    /// Scope identifier
    pub id: CheckpointId,
    /// Clock value at the time of the snapshot
    pub timestamp: u64,
    /// Wall-clock creation time, for inspection only
    pub created_at: DateTime<Utc>,
    /// Enrolled objects, sorted by label
    pub objects: Vec<ReportedObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_scopes_are_inactive() {
        let scope = Checkpoint::new();
        assert_eq!(scope.timestamp(), 0);
        assert!(!scope.is_active());
    }

    #[test]
    fn test_advance_issues_consecutive_versions() {
        let scope = Checkpoint::new();
        assert_eq!(scope.advance(), 1);
        assert_eq!(scope.advance(), 2);
        assert!(scope.is_active());
        assert_eq!(scope.timestamp(), 2);
    }

    #[test]
    fn test_clones_share_one_clock() {
        let scope = Checkpoint::new();
        let alias = scope.clone();
        scope.advance();
        assert_eq!(alias.timestamp(), 1);
        assert!(scope.same_scope(&alias));
        assert!(!scope.same_scope(&Checkpoint::new()));
    }

    #[test]
    fn test_sync_never_moves_the_clock_backwards() {
        let scope = Checkpoint::new();
        scope.sync_to(5);
        assert_eq!(scope.timestamp(), 5);
        scope.sync_to(3);
        assert_eq!(scope.timestamp(), 5);
    }

    #[test]
    fn test_membership_is_tracked_per_object() {
        let scope = Checkpoint::new();
        let id = ObjectId::new();
        scope.enroll(id.clone(), "counter");
        assert!(scope.is_attached(&id));
        assert_eq!(scope.attached_len(), 1);

        scope.withdraw(&id);
        assert!(!scope.is_attached(&id));
        assert_eq!(scope.attached_len(), 0);
    }

    #[test]
    fn test_report_lists_enrolled_objects_sorted() {
        let scope = Checkpoint::new();
        scope.advance();
        scope.enroll(ObjectId::new(), "relay");
        scope.enroll(ObjectId::new(), "counter");

        let report = scope.report();
        assert_eq!(report.timestamp, 1);
        let labels: Vec<&str> = report.objects.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["counter", "relay"]);
    }
}
