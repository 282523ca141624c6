//! Versioned objects and graph traversal
//!
//! `Versioned` is the capability every rollback participant implements: it
//! exposes the object's `Lineage` (identity, current scope, attachment
//! history), its tracked fields, and its edges to nested participants. The
//! traversal functions drive attach, commit, and restore across a whole
//! object graph from one root, carrying a visited set so shared and cyclic
//! structures are processed exactly once.
//!
//! Restores run in two phases: a validation walk checks committed floors and
//! stack depths across the reachable graph, then an applying walk rewinds
//! values and unwinds scope attachments. Unwinding is a loop, not a
//! recursion; each pop strictly shrinks the attachment stack.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::cell::TrackedField;
use crate::engine::error::{FieldError, RollbackError, RollbackResult};
use crate::engine::history::ScopeHistory;
use crate::engine::scope::Checkpoint;

/// Object identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    /// Create a new random ObjectId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-object rollback bookkeeping
///
/// Every participant embeds one `Lineage`. A fresh lineage carries its own
/// inactive scope, so an object is constructed outside any live rollback
/// domain and joins one only through an explicit attach.
#[derive(Debug)]
pub struct Lineage {
    id: ObjectId,
    label: String,
    scope: Checkpoint,
    history: ScopeHistory,
}

impl Lineage {
    /// Create a lineage with a fresh inactive scope
    pub fn new(label: impl Into<String>) -> Self {
        let id = ObjectId::new();
        let label = label.into();
        let scope = Checkpoint::new();
        scope.enroll(id.clone(), &label);
        Lineage {
            id,
            label,
            scope,
            history: ScopeHistory::new(),
        }
    }

    /// Object identifier
    pub fn id(&self) -> ObjectId {
        self.id.clone()
    }

    /// Object label used in diagnostics
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Scope the object currently belongs to
    pub fn scope(&self) -> &Checkpoint {
        &self.scope
    }

    /// Attachment history
    pub fn history(&self) -> &ScopeHistory {
        &self.history
    }

    fn set_scope(&mut self, scope: Checkpoint) {
        self.scope = scope;
    }
}

impl Drop for Lineage {
    fn drop(&mut self) {
        self.scope.withdraw(&self.id);
    }
}

/// One traversable link to a nested participant
pub enum Edge<'a> {
    /// A participant owned by the parent object
    Owned(&'a mut dyn Versioned),
    /// A co-owned participant behind a shared handle
    ///
    /// Visited-set checks use the handle's cached id and happen before the
    /// lock is taken, so cyclic links cannot self-deadlock.
    Linked(Shared<dyn Versioned>),
}

/// Shared ownership of a versioned participant
///
/// The object's id and label are cached on the handle so identity checks
/// never require the lock.
pub struct Shared<T: ?Sized> {
    id: ObjectId,
    label: String,
    cell: Arc<RwLock<T>>,
}

impl<T: Versioned + 'static> Shared<T> {
    /// Move `value` behind a shared handle
    pub fn new(value: T) -> Self {
        let id = value.lineage().id();
        let label = value.lineage().label().to_string();
        Shared {
            id,
            label,
            cell: Arc::new(RwLock::new(value)),
        }
    }

    /// Erase the concrete type for traversal
    pub fn as_versioned(&self) -> Shared<dyn Versioned> {
        Shared {
            id: self.id.clone(),
            label: self.label.clone(),
            cell: self.cell.clone(),
        }
    }
}

impl<T: ?Sized> Shared<T> {
    /// Identifier of the held object
    pub fn id(&self) -> ObjectId {
        self.id.clone()
    }

    /// Label of the held object
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lock the object for reading
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read()
    }

    /// Lock the object for writing
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.write()
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared {
            id: self.id.clone(),
            label: self.label.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

/// Capability of a rollback participant
///
/// Implementations report every tracked field through `fields` and every
/// nested participant through `edges`. Owned edges form the ownership tree;
/// linked edges may form cycles. A back-reference that must not be traversed
/// is simply not reported.
pub trait Versioned {
    /// The object's rollback bookkeeping
    fn lineage(&self) -> &Lineage;

    /// Mutable access to the bookkeeping
    fn lineage_mut(&mut self) -> &mut Lineage;

    /// All tracked fields of this object
    fn fields(&mut self) -> Vec<&mut dyn TrackedField>;

    /// Nested participants to traverse
    fn edges(&mut self) -> Vec<Edge<'_>> {
        Vec::new()
    }

    /// Join `scope`, propagating through the reachable graph
    fn attach(&mut self, scope: &Checkpoint) -> RollbackResult<()>
    where
        Self: Sized,
    {
        attach_graph(self, scope)
    }

    /// Make history below `boundary` permanent across the reachable graph
    fn commit(&mut self, boundary: u64)
    where
        Self: Sized,
    {
        commit_graph(self, boundary)
    }

    /// Roll the reachable graph back to `target`
    fn restore(&mut self, target: u64, trim: bool) -> RollbackResult<()>
    where
        Self: Sized,
    {
        restore_graph(self, target, trim)
    }
}

/// Attach an object graph to `scope`
///
/// Each reached object parks its field logs, records the switch boundary,
/// and adopts the scope. The scope clock is fast-forwarded to the graph's
/// version line when it lags behind, so versions stay continuous across
/// nested attachments. Objects already in `scope` are left untouched.
pub fn attach_graph(root: &mut dyn Versioned, scope: &Checkpoint) -> RollbackResult<()> {
    let mut seen = HashSet::new();
    attach_walk(root, scope, None, &mut seen)
}

fn attach_walk(
    obj: &mut dyn Versioned,
    scope: &Checkpoint,
    parent_prev: Option<&Checkpoint>,
    seen: &mut HashSet<ObjectId>,
) -> RollbackResult<()> {
    if !seen.insert(obj.lineage().id()) {
        return Ok(());
    }
    let current = obj.lineage().scope().clone();
    if current.same_scope(scope) {
        return Ok(());
    }
    if let Some(prev) = parent_prev {
        // A child reached by propagation must come from the parent's old
        // domain; a live scope of its own means it is enrolled elsewhere.
        if current.is_active() && !current.same_scope(prev) {
            return Err(RollbackError::AmbiguousOwnership {
                object: obj.lineage().label().to_string(),
            });
        }
    }

    let boundary = current.timestamp().max(scope.timestamp());
    scope.sync_to(boundary);
    if boundary > 0 {
        obj.lineage_mut().history.record_switch(current.clone(), boundary);
        for field in obj.fields() {
            field.push_state();
        }
    }

    let id = obj.lineage().id();
    let label = obj.lineage().label().to_string();
    current.withdraw(&id);
    scope.enroll(id, &label);
    obj.lineage_mut().set_scope(scope.clone());
    debug!(object = %label, scope = %scope.id(), boundary, "attached object");

    for edge in obj.edges() {
        match edge {
            Edge::Owned(child) => attach_walk(child, scope, Some(&current), seen)?,
            Edge::Linked(shared) => {
                let sid = shared.id();
                if seen.contains(&sid) {
                    continue;
                }
                let mut guard = shared.write();
                attach_walk(&mut *guard, scope, Some(&current), seen)?;
            }
        }
    }
    Ok(())
}

/// Make history below `boundary` permanent for an object graph
///
/// Dead attachment levels collapse together with their parked field logs,
/// and every surviving log is pruned. After this call, restores below
/// `boundary` are contract violations.
pub fn commit_graph(root: &mut dyn Versioned, boundary: u64) {
    debug!(object = %root.lineage().label(), boundary, "committing object graph");
    let mut seen = HashSet::new();
    commit_walk(root, boundary, &mut seen);
}

fn commit_walk(obj: &mut dyn Versioned, boundary: u64, seen: &mut HashSet<ObjectId>) {
    if !seen.insert(obj.lineage().id()) {
        return;
    }
    let dead = obj.lineage().history.dead_levels(boundary);
    for field in obj.fields() {
        field.commit(boundary, dead);
    }
    let dropped = obj.lineage_mut().history.commit(boundary);
    debug_assert_eq!(dropped, dead, "attachment history out of step");

    for edge in obj.edges() {
        match edge {
            Edge::Owned(child) => commit_walk(child, boundary, seen),
            Edge::Linked(shared) => {
                let sid = shared.id();
                if seen.contains(&sid) {
                    continue;
                }
                let mut guard = shared.write();
                commit_walk(&mut *guard, boundary, seen);
            }
        }
    }
}

/// Roll an object graph back to `target`
///
/// Fails without touching any value when some reachable object can no longer
/// reach `target`; on success every reached object holds the values it had
/// at `target` and belongs to the scope it was in at `target`. With `trim`
/// the undone history is discarded, otherwise a later restore may move
/// forward again.
pub fn restore_graph(root: &mut dyn Versioned, target: u64, trim: bool) -> RollbackResult<()> {
    debug!(object = %root.lineage().label(), target, trim, "restoring object graph");
    let mut seen = HashSet::new();
    validate_restore(root, target, &mut seen)?;
    seen.clear();
    apply_restore(root, target, trim, &mut seen)
}

fn validate_restore(
    obj: &mut dyn Versioned,
    target: u64,
    seen: &mut HashSet<ObjectId>,
) -> RollbackResult<()> {
    if !seen.insert(obj.lineage().id()) {
        return Ok(());
    }
    let label = obj.lineage().label().to_string();
    let depth = obj.lineage().history.depth();
    let history_floor = obj.lineage().history.floor();
    if target < history_floor {
        return Err(RollbackError::HistoryCommittedAway {
            object: label,
            target,
            floor: history_floor,
        });
    }
    for field in obj.fields() {
        if target < field.committed_floor() {
            return Err(RollbackError::Field {
                object: label.clone(),
                source: FieldError::CommittedAway {
                    field: field.label(),
                    target,
                    floor: field.committed_floor(),
                },
            });
        }
        if field.saved_depth() != depth {
            return Err(RollbackError::Field {
                object: label.clone(),
                source: FieldError::StackMismatch {
                    field: field.label(),
                },
            });
        }
    }
    for edge in obj.edges() {
        match edge {
            Edge::Owned(child) => validate_restore(child, target, seen)?,
            Edge::Linked(shared) => {
                let sid = shared.id();
                if seen.contains(&sid) {
                    continue;
                }
                let mut guard = shared.write();
                validate_restore(&mut *guard, target, seen)?;
            }
        }
    }
    Ok(())
}

fn apply_restore(
    obj: &mut dyn Versioned,
    target: u64,
    trim: bool,
    seen: &mut HashSet<ObjectId>,
) -> RollbackResult<()> {
    if !seen.insert(obj.lineage().id()) {
        return Ok(());
    }
    let id = obj.lineage().id();
    let label = obj.lineage().label().to_string();

    // First edge walk: reach everything linked right now, before rewinding
    // this object's fields severs any of those links.
    apply_to_edges(obj, target, trim, seen)?;

    loop {
        for field in obj.fields() {
            field
                .restore(target, trim)
                .map_err(|source| RollbackError::Field {
                    object: label.clone(),
                    source,
                })?;
        }
        let unwind = obj
            .lineage()
            .history
            .top_version()
            .is_some_and(|top| target <= top);
        if !unwind {
            break;
        }
        let Some((previous, boundary)) = obj.lineage_mut().history.pop_switch() else {
            break;
        };
        for field in obj.fields() {
            field
                .pop_state()
                .map_err(|source| RollbackError::Field {
                    object: label.clone(),
                    source,
                })?;
        }
        let current = obj.lineage().scope().clone();
        current.withdraw(&id);
        previous.enroll(id.clone(), &label);
        debug!(object = %label, boundary, resumed = %previous.id(), "unwound scope attachment");
        obj.lineage_mut().set_scope(previous);
    }

    // Second edge walk: the rewind may have re-created links that were
    // severed after `target`, so the restored topology is traversed too.
    // Objects reached by both walks are restored once.
    apply_to_edges(obj, target, trim, seen)
}

fn apply_to_edges(
    obj: &mut dyn Versioned,
    target: u64,
    trim: bool,
    seen: &mut HashSet<ObjectId>,
) -> RollbackResult<()> {
    for edge in obj.edges() {
        match edge {
            Edge::Owned(child) => apply_restore(child, target, trim, seen)?,
            Edge::Linked(shared) => {
                let sid = shared.id();
                if seen.contains(&sid) {
                    continue;
                }
                let mut guard = shared.write();
                apply_restore(&mut *guard, target, trim, seen)?;
            }
        }
    }
    Ok(())
}
