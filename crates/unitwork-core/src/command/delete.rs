//! Row deletion.

use super::{CompleteHook, RollbackHook};
use crate::driver::DriverRef;
use crate::error::{Error, Result};
use crate::value::Value;
use std::rc::Rc;

/// Deletes the row identified by its primary key.
///
/// Like updates, the predicate may start unset (deleting an entity whose
/// insert has not committed yet) and is rewritten by a state listener once
/// the key is known.
pub struct DeleteCommand {
    driver: DriverRef,
    table: String,
    where_column: String,
    where_value: Option<Value>,
    executed: bool,
    on_complete: Vec<CompleteHook>,
    on_rollback: Vec<RollbackHook>,
}

impl DeleteCommand {
    /// Create a delete for the given table and identifying predicate.
    #[must_use]
    pub fn new(
        driver: DriverRef,
        table: impl Into<String>,
        where_column: impl Into<String>,
        where_value: Option<Value>,
    ) -> Self {
        Self {
            driver,
            table: table.into(),
            where_column: where_column.into(),
            where_value,
            executed: false,
            on_complete: Vec::new(),
            on_rollback: Vec::new(),
        }
    }

    /// Register a hook fired after the transaction commits.
    pub fn on_complete(&mut self, hook: impl Fn(Option<&Value>, &crate::value::ColumnMap) + 'static) {
        self.on_complete.push(Box::new(hook));
    }

    /// Register a hook fired if the transaction aborts after execution.
    pub fn on_rollback(&mut self, hook: impl Fn() + 'static) {
        self.on_rollback.push(Box::new(hook));
    }

    pub(super) fn is_ready(&self) -> bool {
        self.where_value.is_some()
    }

    pub(super) fn set_where(&mut self, value: Option<Value>) {
        self.where_value = value;
    }

    pub(super) fn execute(&mut self) -> Result<()> {
        let key = self.where_value.clone().ok_or_else(|| Error::MissingIdentity {
            table: self.table.clone(),
        })?;

        tracing::trace!(table = %self.table, "executing delete");
        self.driver
            .delete(&self.table, (&self.where_column, &key))?;
        self.executed = true;
        Ok(())
    }

    pub(super) fn complete(&self) {
        let empty = crate::value::ColumnMap::new();
        for hook in &self.on_complete {
            hook(None, &empty);
        }
    }

    pub(super) fn rollback(&self) {
        if !self.executed {
            return;
        }
        for hook in &self.on_rollback {
            hook();
        }
    }

    pub(super) fn missing_identity(&self) -> Option<String> {
        if self.where_value.is_none() {
            Some(self.table.clone())
        } else {
            None
        }
    }

    /// The table this delete targets.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    pub(super) fn driver(&self) -> DriverRef {
        Rc::clone(&self.driver)
    }
}
