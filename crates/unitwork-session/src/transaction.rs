//! The transaction executor: wave-scheduled, all-or-nothing execution of a
//! command forest against one or more storage drivers.
//!
//! A static topological sort is not enough here: a command's runnability
//! depends on data produced by another command (a generated key), and that
//! dependency is only discovered as execution proceeds. The executor runs
//! the flattened forest in waves, postponing commands whose context is not
//! yet available, until everything ran or a wave makes zero progress.

use crate::Session;
use unitwork_core::{CommandRef, DriverRef, EntityRef, Error, Result, flatten, same_driver};

/// A unit of work executed atomically across all involved drivers.
///
/// Atomicity is best effort: one local transaction per driver, plus
/// in-memory compensating rollback of already-executed commands if
/// anything fails.
pub struct Transaction {
    session: Session,
    commands: Vec<CommandRef>,
}

impl Transaction {
    /// Create an empty transaction bound to a session.
    #[must_use]
    pub fn new(session: &Session) -> Self {
        Self {
            session: session.clone(),
            commands: Vec::new(),
        }
    }

    /// Queue a store of the given entity.
    pub fn store(&mut self, entity: &EntityRef) -> Result<()> {
        let command = self.session.mapper_for(entity)?.queue_store(entity)?;
        self.add_command(command);
        Ok(())
    }

    /// Queue a delete of the given entity.
    pub fn delete(&mut self, entity: &EntityRef) -> Result<()> {
        let command = self.session.mapper_for(entity)?.queue_delete(entity)?;
        self.add_command(command);
        Ok(())
    }

    /// Append a root command to the forest.
    pub fn add_command(&mut self, command: CommandRef) {
        self.commands.push(command);
    }

    /// Number of queued root commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Execute the whole forest to completion, or roll everything back.
    ///
    /// On success every begun driver commits (reverse begin order) and
    /// completion hooks fire in execution order, so entities are hydrated
    /// with generated keys only after the writes are durably committed. On
    /// any failure, begun drivers roll back in reverse begin order, then
    /// executed commands roll back in reverse execution order, and the
    /// original error is re-raised. The root set is cleared either way.
    #[tracing::instrument(level = "info", skip(self), fields(commands = self.commands.len()))]
    pub fn run(&mut self) -> Result<()> {
        let mut pending = flatten(&self.commands);
        self.commands.clear();

        let mut executed: Vec<CommandRef> = Vec::new();
        let mut begun: Vec<DriverRef> = Vec::new();

        if let Err(error) = Self::run_waves(&mut pending, &mut executed, &mut begun) {
            Self::abort(&begun, &executed);
            return Err(error);
        }

        // Commit in reverse begin order. A commit failure rolls back the
        // failing driver along with everything not committed yet, so no
        // local transaction is left open for a later retry to trip over.
        for (index, driver) in begun.iter().enumerate().rev() {
            if let Err(error) = driver.commit_transaction() {
                tracing::error!(driver = driver.name(), "commit failed, rolling back");
                Self::abort(&begun[..=index], &executed);
                return Err(error);
            }
            tracing::debug!(driver = driver.name(), "committed");
        }

        // This is the point where entities receive generated keys and
        // foreign keys: only after every driver committed.
        for command in &executed {
            command.borrow().complete();
        }

        tracing::info!(executed = executed.len(), "transaction complete");
        Ok(())
    }

    fn run_waves(
        pending: &mut Vec<CommandRef>,
        executed: &mut Vec<CommandRef>,
        begun: &mut Vec<DriverRef>,
    ) -> Result<()> {
        while !pending.is_empty() {
            let wait = pending.len();
            let mut delayed = Vec::new();

            for command in pending.drain(..) {
                if !command.borrow().is_ready() {
                    delayed.push(command);
                    continue;
                }

                if let Some(driver) = command.borrow().driver() {
                    if !begun.iter().any(|known| same_driver(known, &driver)) {
                        driver.begin_transaction()?;
                        tracing::debug!(driver = driver.name(), "began transaction");
                        begun.push(driver);
                    }
                }

                command.borrow_mut().execute()?;
                executed.push(command);
            }

            if delayed.len() == wait {
                return Err(Self::stall_error(&delayed));
            }

            tracing::debug!(
                executed = executed.len(),
                delayed = delayed.len(),
                "wave complete"
            );
            *pending = delayed;
        }
        Ok(())
    }

    /// Zero progress over a wave: an unresolvable dependency.
    ///
    /// When a stalled command's only missing input is its identifying key,
    /// the failure is reported as a missing identity; otherwise as a
    /// scheduling stall naming the stalled commands.
    fn stall_error(delayed: &[CommandRef]) -> Error {
        if let Some(table) = delayed
            .iter()
            .find_map(|command| command.borrow().missing_identity())
        {
            return Error::MissingIdentity { table };
        }
        Error::SchedulingStall {
            commands: delayed
                .iter()
                .map(|command| command.borrow().describe())
                .collect(),
        }
    }

    fn abort(begun: &[DriverRef], executed: &[CommandRef]) {
        for driver in begun.iter().rev() {
            if let Err(error) = driver.rollback_transaction() {
                tracing::error!(driver = driver.name(), %error, "rollback failed");
            }
        }
        for command in executed.iter().rev() {
            command.borrow().rollback();
        }
    }

    /// The session this transaction is bound to.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}
