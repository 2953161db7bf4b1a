//! The command model: units of storage work and their composition.
//!
//! A command is the unit the transaction executor schedules. Database
//! commands (insert, update, delete) carry a driver, a context map of
//! injectable values (for example a foreign key awaiting a parent's
//! generated id) and hook lists. Composition commands (chain, conditional,
//! null) organize database commands into a forest without touching storage
//! themselves.
//!
//! Commands are shared as [`CommandRef`] (`Rc<RefCell<Command>>`) because
//! they are mutated after construction: state listeners rewrite predicates
//! and inject context while the graph executes.

mod compose;
mod delete;
mod insert;
mod update;

pub use compose::{ChainCommand, ConditionalCommand, NullCommand};
pub use delete::DeleteCommand;
pub use insert::InsertCommand;
pub use update::UpdateCommand;

use crate::driver::DriverRef;
use crate::error::Result;
use crate::value::{ColumnMap, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Hook fired while an insert executes, with the generated key.
pub type ExecuteHook = Box<dyn Fn(&Value)>;

/// Hook fired after the whole transaction commits.
///
/// Receives the generated key (inserts only) and the command's context map.
pub type CompleteHook = Box<dyn Fn(Option<&Value>, &ColumnMap)>;

/// Hook fired when the transaction aborts after this command executed.
pub type RollbackHook = Box<dyn Fn()>;

/// A shared, mutable handle to a command in the forest.
pub type CommandRef = Rc<RefCell<Command>>;

/// A unit of storage work or a composite thereof.
pub enum Command {
    /// Insert a row; produces a generated key on execution.
    Insert(InsertCommand),
    /// Update the columns of a row identified by its primary key.
    Update(UpdateCommand),
    /// Delete a row identified by its primary key.
    Delete(DeleteCommand),
    /// Ordered composite of commands.
    Chain(ChainCommand),
    /// Wraps an inner command behind a predicate evaluated at run time.
    Conditional(ConditionalCommand),
    /// No-op placeholder.
    Null(NullCommand),
}

impl Command {
    /// Whether this command can run now.
    ///
    /// A command reports itself delayed while a context value it needs has
    /// not been produced, or while its identifying predicate is unset.
    pub fn is_ready(&self) -> bool {
        match self {
            Command::Insert(c) => c.is_ready(),
            Command::Update(c) => c.is_ready(),
            Command::Delete(c) => c.is_ready(),
            Command::Conditional(c) => c.is_ready(),
            Command::Chain(_) | Command::Null(_) => true,
        }
    }

    /// Run the side effect against storage.
    ///
    /// Executes at most once per transaction attempt; the executor only
    /// calls this once a command reports itself ready.
    pub fn execute(&mut self) -> Result<()> {
        match self {
            Command::Insert(c) => c.execute(),
            Command::Update(c) => c.execute(),
            Command::Delete(c) => c.execute(),
            Command::Conditional(c) => c.execute(),
            Command::Chain(_) | Command::Null(_) => Ok(()),
        }
    }

    /// Fire completion hooks; called after every driver committed.
    pub fn complete(&self) {
        match self {
            Command::Insert(c) => c.complete(),
            Command::Update(c) => c.complete(),
            Command::Delete(c) => c.complete(),
            Command::Conditional(c) => c.complete(),
            Command::Chain(_) | Command::Null(_) => {}
        }
    }

    /// Fire rollback hooks; called only if this command already executed.
    pub fn rollback(&self) {
        match self {
            Command::Insert(c) => c.rollback(),
            Command::Update(c) => c.rollback(),
            Command::Delete(c) => c.rollback(),
            Command::Conditional(c) => c.rollback(),
            Command::Chain(_) | Command::Null(_) => {}
        }
    }

    /// Inject a context value, freeing the matching wait if present.
    ///
    /// Chains forward to their target command.
    pub fn set_context(&mut self, key: &str, value: Value) {
        match self {
            Command::Insert(c) => c.set_context(key, value),
            Command::Update(c) => c.set_context(key, value),
            Command::Chain(c) => c.forward_context(key, value),
            Command::Conditional(c) => c.inner().borrow_mut().set_context(key, value),
            Command::Delete(_) | Command::Null(_) => {}
        }
    }

    /// Declare that execution must wait for a context key.
    pub fn wait_context(&mut self, key: &str) {
        match self {
            Command::Insert(c) => c.wait_context(key),
            Command::Update(c) => c.wait_context(key),
            Command::Chain(c) => c.forward_wait(key),
            Command::Conditional(c) => c.inner().borrow_mut().wait_context(key),
            Command::Delete(_) | Command::Null(_) => {}
        }
    }

    /// Rewrite the identifying predicate (update/delete only).
    pub fn set_where(&mut self, value: Option<Value>) {
        match self {
            Command::Update(c) => c.set_where(value),
            Command::Delete(c) => c.set_where(value),
            Command::Conditional(c) => c.inner().borrow_mut().set_where(value),
            _ => {}
        }
    }

    /// The driver this command targets, if any.
    ///
    /// Conditionals report their inner driver so the executor can open its
    /// transaction before the predicate is evaluated.
    pub fn driver(&self) -> Option<DriverRef> {
        match self {
            Command::Insert(c) => Some(c.driver()),
            Command::Update(c) => Some(c.driver()),
            Command::Delete(c) => Some(c.driver()),
            Command::Conditional(c) => c.inner().borrow().driver(),
            Command::Chain(_) | Command::Null(_) => None,
        }
    }

    /// Human-readable label, used in stall errors and logs.
    pub fn describe(&self) -> String {
        match self {
            Command::Insert(c) => format!("insert({})", c.table()),
            Command::Update(c) => format!("update({})", c.table()),
            Command::Delete(c) => format!("delete({})", c.table()),
            Command::Chain(_) => "chain".to_string(),
            Command::Conditional(c) => format!("conditional({})", c.inner().borrow().describe()),
            Command::Null(_) => "null".to_string(),
        }
    }

    /// If the only thing keeping this command delayed is its identifying
    /// key, report the affected table.
    pub fn missing_identity(&self) -> Option<String> {
        match self {
            Command::Update(c) => c.missing_identity(),
            Command::Delete(c) => c.missing_identity(),
            Command::Conditional(c) => c.inner().borrow().missing_identity(),
            _ => None,
        }
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn into_ref(self) -> CommandRef {
        Rc::new(RefCell::new(self))
    }
}

/// Depth-first expansion of a command forest into a flat sequence.
///
/// Chains unpack to their members in order and contribute nothing
/// themselves; every other command (conditionals included) is a leaf the
/// executor schedules directly.
pub fn flatten(roots: &[CommandRef]) -> Vec<CommandRef> {
    let mut out = Vec::new();
    for root in roots {
        flatten_into(root, &mut out);
    }
    out
}

fn flatten_into(command: &CommandRef, out: &mut Vec<CommandRef>) {
    let is_chain = matches!(&*command.borrow(), Command::Chain(_));
    if is_chain {
        let members = match &*command.borrow() {
            Command::Chain(chain) => chain.members().to_vec(),
            _ => unreachable!(),
        };
        for member in &members {
            flatten_into(member, out);
        }
    } else {
        out.push(Rc::clone(command));
    }
}
