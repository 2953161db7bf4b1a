//! Row insertion.

use super::{CompleteHook, ExecuteHook, RollbackHook};
use crate::driver::DriverRef;
use crate::error::Result;
use crate::value::{ColumnMap, Value};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Inserts a row and captures the generated key.
///
/// The column map excludes the primary key; values injected through the
/// context map (foreign keys supplied by other commands) are merged over
/// the build-time columns at execution.
pub struct InsertCommand {
    driver: DriverRef,
    table: String,
    columns: ColumnMap,
    context: ColumnMap,
    waiting: BTreeSet<String>,
    generated_key: Option<Value>,
    executed: bool,
    on_execute: Vec<ExecuteHook>,
    on_complete: Vec<CompleteHook>,
    on_rollback: Vec<RollbackHook>,
}

impl InsertCommand {
    /// Create an insert for the given table and column values.
    #[must_use]
    pub fn new(driver: DriverRef, table: impl Into<String>, columns: ColumnMap) -> Self {
        Self {
            driver,
            table: table.into(),
            columns,
            context: ColumnMap::new(),
            waiting: BTreeSet::new(),
            generated_key: None,
            executed: false,
            on_execute: Vec::new(),
            on_complete: Vec::new(),
            on_rollback: Vec::new(),
        }
    }

    /// Register a hook fired during execution with the generated key.
    pub fn on_execute(&mut self, hook: impl Fn(&Value) + 'static) {
        self.on_execute.push(Box::new(hook));
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
        self.waiting.is_empty()
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

    pub(super) fn execute(&mut self) -> Result<()> {
        let mut row = self.columns.clone();
        row.extend(self.context.iter().map(|(k, v)| (k.clone(), v.clone())));

        tracing::trace!(table = %self.table, columns = row.len(), "executing insert");
        let key = self.driver.insert(&self.table, &row)?;

        self.generated_key = Some(key.clone());
        self.executed = true;
        for hook in &self.on_execute {
            hook(&key);
        }
        Ok(())
    }

    pub(super) fn complete(&self) {
        for hook in &self.on_complete {
            hook(self.generated_key.as_ref(), &self.context);
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

    /// The table this insert targets.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The generated key, once executed.
    #[must_use]
    pub fn generated_key(&self) -> Option<&Value> {
        self.generated_key.as_ref()
    }

    pub(super) fn driver(&self) -> DriverRef {
        Rc::clone(&self.driver)
    }
}
