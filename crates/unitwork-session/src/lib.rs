//! Session layer for the unitwork persistence engine.
//!
//! A [`Session`] is one logical unit-of-work scope: it owns the heap of
//! tracked entities, the schema registry and the driver registry, and
//! hands out [`Mapper`]s and [`Transaction`]s that share them.
//!
//! # Overview
//!
//! - The **heap** tracks per-entity persistence state so the same object
//!   is never inserted twice and deletes target the correct identity.
//! - The **mapper** turns a store/delete request for one entity into a
//!   base command by comparing tracked state to current field values.
//! - The **relation resolver** expands that command with the commands
//!   needed to keep related entities consistent, including ref-counted
//!   cascade deletes.
//! - The **transaction** executes the resulting forest in dependency
//!   respecting waves against the involved drivers, committing everything
//!   or rolling everything back.
//!
//! # Example
//!
//! ```ignore
//! let schema = Schema::new().define(
//!     EntitySchema::new("user", "default", "user", "id",
//!         vec!["id".into(), "email".into()]),
//! );
//! let session = Session::single(schema, driver);
//!
//! let mut tx = session.transaction();
//! tx.store(&user)?;
//! tx.run()?;
//! ```

pub mod heap;
pub mod mapper;
pub mod relation;
pub mod transaction;

pub use heap::{EntityState, Heap, StateRef, Status};
pub use mapper::Mapper;
pub use relation::{HasOneRelation, Relation, RelationMap};
pub use transaction::Transaction;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use unitwork_core::{DriverRef, EntityRef, Error, Result, Schema};

struct SessionInner {
    schema: Schema,
    heap: Rc<RefCell<Heap>>,
    drivers: HashMap<String, DriverRef>,
}

/// One logical work session.
///
/// Cheap to clone; clones share the same heap, schema and drivers. The
/// session's lifetime bounds entity tracking: it is never process-wide
/// state.
#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

impl Session {
    /// Create a session over the given schema and named drivers.
    #[must_use]
    pub fn new(schema: Schema, drivers: HashMap<String, DriverRef>) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                schema,
                heap: Rc::new(RefCell::new(Heap::new())),
                drivers,
            }),
        }
    }

    /// Create a session with a single driver registered as `"default"`.
    #[must_use]
    pub fn single(schema: Schema, driver: DriverRef) -> Self {
        let mut drivers = HashMap::new();
        drivers.insert("default".to_string(), driver);
        Self::new(schema, drivers)
    }

    /// The schema registry.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The heap of tracked entities.
    #[must_use]
    pub fn heap(&self) -> &Rc<RefCell<Heap>> {
        &self.inner.heap
    }

    /// Resolve a logical database name to its driver.
    pub fn driver(&self, database: &str) -> Result<DriverRef> {
        self.inner
            .drivers
            .get(database)
            .cloned()
            .ok_or_else(|| Error::UnknownDatabase {
                database: database.to_string(),
            })
    }

    /// Build a mapper for the given role.
    pub fn mapper(&self, role: &str) -> Result<Mapper> {
        Mapper::new(self, role)
    }

    /// Build a mapper for the given entity's role.
    pub fn mapper_for(&self, entity: &EntityRef) -> Result<Mapper> {
        let role = entity.borrow().role();
        self.mapper(role)
    }

    /// Start an empty transaction bound to this session.
    #[must_use]
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self)
    }
}
