//! The storage driver seam.
//!
//! A driver owns one physical connection/database. The executor opens at
//! most one local transaction per driver per run, shared by every command
//! targeting it. Drivers are synchronous; interior mutability is the
//! implementor's concern.

use crate::error::Result;
use crate::value::{ColumnMap, Value};
use std::rc::Rc;

/// One physical storage backend.
pub trait Driver {
    /// Stable name, used in logs.
    fn name(&self) -> &str;

    /// Open a local transaction.
    fn begin_transaction(&self) -> Result<()>;

    /// Commit the open local transaction.
    fn commit_transaction(&self) -> Result<()>;

    /// Roll back the open local transaction.
    fn rollback_transaction(&self) -> Result<()>;

    /// Insert a row and return the generated key.
    fn insert(&self, table: &str, row: &ColumnMap) -> Result<Value>;

    /// Update the row identified by `key` with the given changes.
    fn update(&self, table: &str, changes: &ColumnMap, key: (&str, &Value)) -> Result<()>;

    /// Delete the row identified by `key`.
    fn delete(&self, table: &str, key: (&str, &Value)) -> Result<()>;
}

/// Shared handle to a driver.
pub type DriverRef = Rc<dyn Driver>;

/// Whether two handles point at the same driver.
///
/// The executor's begun-set is keyed by driver identity, not by name.
#[must_use]
pub fn same_driver(a: &DriverRef, b: &DriverRef) -> bool {
    Rc::ptr_eq(a, b)
}
