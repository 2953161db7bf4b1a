//! Entity state tracking: the heap and per-entity persistence state.
//!
//! The heap is the single source of truth for "is this a new or existing
//! row". It is keyed by entity reference identity, not by primary key,
//! because a key may not exist until an insert commits. Exactly one state
//! exists per live tracked entity.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use unitwork_core::{ColumnMap, EntityRef, Error, Result, Value, entity_key};

/// Persistence status of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Known but not yet scheduled for anything.
    New,
    /// An insert command has been queued.
    ScheduledInsert,
    /// An update command has been queued.
    ScheduledUpdate,
    /// A delete command has been queued.
    ScheduledDelete,
    /// In sync with storage.
    Loaded,
}

/// Observer invoked when a tracked entity's key or status changes.
///
/// This is the channel through which a generated key reaches commands that
/// were built before the key existed.
pub type StateHook = Box<dyn Fn(&EntityState)>;

/// Shared handle to a tracked entity's state.
pub type StateRef = Rc<EntityState>;

struct StateData {
    status: Status,
    primary_key: Option<Value>,
    snapshot: ColumnMap,
    relations: HashMap<String, Option<EntityRef>>,
    ref_count: u32,
}

/// Per-entity persistence state.
///
/// Interior-mutable and shared: the mapper, the relation resolver and
/// command hooks all hold references to the same state. Listeners live
/// beside the data cell so a notification can read state while its hooks
/// mutate other commands.
pub struct EntityState {
    data: RefCell<StateData>,
    listeners: RefCell<Vec<StateHook>>,
}

impl EntityState {
    /// Create a new state with the given key, status and snapshot.
    #[must_use]
    pub fn new(primary_key: Option<Value>, status: Status, snapshot: ColumnMap) -> StateRef {
        Rc::new(Self {
            data: RefCell::new(StateData {
                status,
                primary_key,
                snapshot,
                relations: HashMap::new(),
                ref_count: 0,
            }),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Current persistence status.
    pub fn status(&self) -> Status {
        self.data.borrow().status
    }

    /// Change the status, notifying listeners if it actually changed.
    pub fn set_status(&self, status: Status) {
        {
            let mut data = self.data.borrow_mut();
            if data.status == status {
                return;
            }
            data.status = status;
        }
        self.notify();
    }

    /// The primary key, once known.
    pub fn primary_key(&self) -> Option<Value> {
        self.data.borrow().primary_key.clone()
    }

    /// Set the primary key, notifying listeners if it actually changed.
    pub fn set_primary_key(&self, value: Value) {
        {
            let mut data = self.data.borrow_mut();
            if data.primary_key.as_ref() == Some(&value) {
                return;
            }
            data.primary_key = Some(value);
        }
        self.notify();
    }

    /// Last-known-persisted column values, used to compute update diffs.
    pub fn snapshot(&self) -> ColumnMap {
        self.data.borrow().snapshot.clone()
    }

    /// Merge values over the snapshot.
    pub fn merge_snapshot(&self, values: &ColumnMap) {
        let mut data = self.data.borrow_mut();
        for (column, value) in values {
            data.snapshot.insert(column.clone(), value.clone());
        }
    }

    /// Replace the snapshot wholesale.
    pub fn set_snapshot(&self, snapshot: ColumnMap) {
        self.data.borrow_mut().snapshot = snapshot;
    }

    /// The entity currently recorded under the given relation name.
    pub fn relation(&self, name: &str) -> Option<EntityRef> {
        self.data.borrow().relations.get(name).cloned().flatten()
    }

    /// Record the current link for a relation.
    pub fn set_relation(&self, name: &str, related: Option<EntityRef>) {
        self.data
            .borrow_mut()
            .relations
            .insert(name.to_string(), related);
    }

    /// Number of live references into this entity from other entities'
    /// relations.
    pub fn ref_count(&self) -> u32 {
        self.data.borrow().ref_count
    }

    /// Count one more incoming reference.
    pub fn add_ref(&self) {
        self.data.borrow_mut().ref_count += 1;
    }

    /// Drop one incoming reference, saturating at zero.
    pub fn del_ref(&self) {
        let mut data = self.data.borrow_mut();
        data.ref_count = data.ref_count.saturating_sub(1);
    }

    /// Register an observer for key/status changes.
    pub fn on_update(&self, hook: impl Fn(&EntityState) + 'static) {
        self.listeners.borrow_mut().push(Box::new(hook));
    }

    fn notify(&self) {
        let listeners = self.listeners.borrow();
        for listener in listeners.iter() {
            listener(self);
        }
    }
}

/// Identity-keyed map from tracked entity to its state.
///
/// Holds a strong reference to each tracked entity so the identity address
/// stays stable for as long as the entity is tracked.
#[derive(Default)]
pub struct Heap {
    entries: HashMap<usize, (EntityRef, StateRef)>,
}

impl Heap {
    /// Create an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the state for an entity.
    pub fn get(&self, entity: &EntityRef) -> Option<StateRef> {
        self.entries
            .get(&entity_key(entity))
            .map(|(_, state)| Rc::clone(state))
    }

    /// Start tracking an entity.
    ///
    /// Attaching an already-tracked entity is an error, never a duplicate.
    pub fn attach(&mut self, entity: &EntityRef, state: StateRef) -> Result<()> {
        let key = entity_key(entity);
        if self.entries.contains_key(&key) {
            return Err(Error::AlreadyTracked {
                role: entity.borrow().role().to_string(),
            });
        }
        tracing::debug!(role = entity.borrow().role(), "attaching entity");
        self.entries.insert(key, (Rc::clone(entity), state));
        Ok(())
    }

    /// Stop tracking an entity, returning its state if it was tracked.
    pub fn detach(&mut self, entity: &EntityRef) -> Option<StateRef> {
        let removed = self.entries.remove(&entity_key(entity));
        if removed.is_some() {
            tracing::debug!(role = entity.borrow().role(), "detached entity");
        }
        removed.map(|(_, state)| state)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all tracking.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
