//! Core types for the unitwork persistence engine.
//!
//! This crate provides the foundational abstractions the session layer
//! builds on:
//!
//! - `Value` and `ColumnMap` for dynamically-typed column data
//! - the `Command` model (insert/update/delete plus chain, conditional and
//!   null composition) with context injection and hook lists
//! - the `Entity` trait for extraction/hydration and reference identity
//! - the `Schema` registry describing tables, keys and relations
//! - the `Driver` seam for storage backends

pub mod command;
pub mod driver;
pub mod entity;
pub mod error;
pub mod schema;
pub mod value;

pub use command::{
    ChainCommand, Command, CommandRef, ConditionalCommand, DeleteCommand, InsertCommand,
    NullCommand, UpdateCommand, flatten,
};
pub use driver::{Driver, DriverRef, same_driver};
pub use entity::{Entity, EntityRef, entity_key, entity_ref};
pub use error::{DriverError, Error, Result};
pub use schema::{
    DEFAULT_FAN_IN_LIMIT, EntitySchema, RelationKind, RelationSchema, Schema,
};
pub use value::{ColumnMap, Value};
