//! Row updates.

use super::{CompleteHook, RollbackHook};
use crate::driver::DriverRef;
use crate::error::{Error, Result};
use crate::value::{ColumnMap, Value};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Updates the row identified by its primary key.
///
/// The identifying predicate is not fixed at build time: the entity's key
/// may still be pending from an insert that has not executed yet. State
/// listeners rewrite it through [`UpdateCommand::set_where`] the moment the
/// key becomes known.
pub struct UpdateCommand {
    driver: DriverRef,
    table: String,
    changes: ColumnMap,
    context: ColumnMap,
    waiting: BTreeSet<String>,
    where_column: String,
    where_value: Option<Value>,
    executed: bool,
    on_complete: Vec<CompleteHook>,
    on_rollback: Vec<RollbackHook>,
}

impl UpdateCommand {
    /// Create an update carrying only changed columns.
    #[must_use]
    pub fn new(
        driver: DriverRef,
        table: impl Into<String>,
        changes: ColumnMap,
        where_column: impl Into<String>,
        where_value: Option<Value>,
    ) -> Self {
        Self {
            driver,
            table: table.into(),
            changes,
            context: ColumnMap::new(),
            waiting: BTreeSet::new(),
            where_column: where_column.into(),
            where_value,
            executed: false,
            on_complete: Vec::new(),
            on_rollback: Vec::new(),
        }
    }

    /// Register a hook fired after the transaction commits.
    pub fn on_complete(&mut self, hook: impl Fn(Option<&Value>, &ColumnMap) + 'static) {
        self.on_complete.push(Box::new(hook));
    }

    /// Register a hook fired if the transaction aborts after execution.
    pub fn on_rollback(&mut self, hook: impl Fn() + 'static) {
        self.on_rollback.push(Box::new(hook));
    }

    pub(super) fn is_ready(&self) -> bool {
        self.waiting.is_empty() && self.where_value.is_some()
    }

    /// Inject a context value, freeing the matching wait if present.
    pub fn set_context(&mut self, key: &str, value: Value) {
        self.waiting.remove(key);
        self.context.insert(key.to_string(), value);
    }

    /// Declare that execution must wait for a context key.
    pub fn wait_context(&mut self, key: &str) {
        if !self.context.contains_key(key) {
            self.waiting.insert(key.to_string());
        }
    }

    pub(super) fn set_where(&mut self, value: Option<Value>) {
        self.where_value = value;
    }

    pub(super) fn execute(&mut self) -> Result<()> {
        let key = self.where_value.clone().ok_or_else(|| Error::MissingIdentity {
            table: self.table.clone(),
        })?;

        let mut changes = self.changes.clone();
        changes.extend(self.context.iter().map(|(k, v)| (k.clone(), v.clone())));

        // An empty change set is a semantic no-op; completion and rollback
        // bookkeeping still run so tracked state stays consistent.
        if changes.is_empty() {
            tracing::trace!(table = %self.table, "empty update, skipping driver call");
        } else {
            tracing::trace!(table = %self.table, columns = changes.len(), "executing update");
            self.driver
                .update(&self.table, &changes, (&self.where_column, &key))?;
        }
        self.executed = true;
        Ok(())
    }

    pub(super) fn complete(&self) {
        for hook in &self.on_complete {
            hook(None, &self.context);
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

    /// If only the identifying key is missing, report the table.
    pub(super) fn missing_identity(&self) -> Option<String> {
        if self.waiting.is_empty() && self.where_value.is_none() {
            Some(self.table.clone())
        } else {
            None
        }
    }

    /// The table this update targets.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    pub(super) fn driver(&self) -> DriverRef {
        Rc::clone(&self.driver)
    }
}
