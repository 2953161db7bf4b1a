//! Unitwork - a unit-of-work persistence engine.
//!
//! Unitwork persists in-memory entities to one or more backing stores by
//! translating object-graph mutations into an ordered set of storage
//! commands executed as a single atomic unit of work:
//!
//! - Per-entity identity tracking, so the same object is never inserted
//!   twice and deletes target the correct row
//! - Relation resolution with ref-counted cascade deletes for shared
//!   ownership
//! - A command forest executed in dependency-respecting waves, so a child
//!   row can be queued before its parent's generated key exists
//! - All-or-nothing commit across multiple independent drivers (one local
//!   transaction per driver plus compensating rollback)
//!
//! # Quick Start
//!
//! ```ignore
//! use unitwork::prelude::*;
//!
//! let schema = Schema::new()
//!     .define(
//!         EntitySchema::new("user", "default", "user", "id",
//!             vec!["id".into(), "email".into(), "balance".into()])
//!         .relation(RelationSchema::has_one("profile", "profile", "id", "user_id")),
//!     )
//!     .define(EntitySchema::new("profile", "default", "profile", "id",
//!         vec!["id".into(), "user_id".into(), "image".into()]));
//!
//! let session = Session::single(schema, driver);
//!
//! // Store a brand-new user together with its brand-new profile; the
//! // profile's foreign key is filled from the user's generated id.
//! let mut tx = session.transaction();
//! tx.store(&user)?;
//! tx.run()?;
//! ```

pub use unitwork_core::{
    ChainCommand, ColumnMap, Command, CommandRef, ConditionalCommand, DEFAULT_FAN_IN_LIMIT,
    DeleteCommand, Driver, DriverError, DriverRef, Entity, EntityRef, EntitySchema, Error,
    InsertCommand, NullCommand, RelationKind, RelationSchema, Result, Schema, UpdateCommand,
    Value, entity_key, entity_ref, flatten, same_driver,
};
pub use unitwork_session::{
    EntityState, HasOneRelation, Heap, Mapper, Relation, RelationMap, Session, StateRef, Status,
    Transaction,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        ColumnMap, Driver, Entity, EntityRef, EntitySchema, Error, RelationSchema, Result, Schema,
        Session, Transaction, Value, entity_ref,
    };
}
