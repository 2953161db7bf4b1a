//! Composition commands: chain, conditional and null.

use super::CommandRef;
use crate::error::Result;
use crate::value::Value;
use std::rc::Rc;

/// Ordered composite of commands.
///
/// The executor never schedules a chain itself; flattening expands its
/// members in order. The target member is the command whose completion
/// matters for outer bookkeeping: context injected into the chain is
/// forwarded to it.
pub struct ChainCommand {
    members: Vec<CommandRef>,
    target: Option<CommandRef>,
}

impl ChainCommand {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            target: None,
        }
    }

    /// Append a member command.
    pub fn add(&mut self, command: CommandRef) {
        self.members.push(command);
    }

    /// Append a member and mark it as the chain's target.
    pub fn add_target(&mut self, command: CommandRef) {
        self.target = Some(Rc::clone(&command));
        self.members.push(command);
    }

    /// The members, in execution order.
    #[must_use]
    pub fn members(&self) -> &[CommandRef] {
        &self.members
    }

    /// The target command, if one was marked.
    #[must_use]
    pub fn target(&self) -> Option<&CommandRef> {
        self.target.as_ref()
    }

    pub(super) fn forward_context(&self, key: &str, value: Value) {
        if let Some(target) = &self.target {
            target.borrow_mut().set_context(key, value);
        } else {
            tracing::debug!(key, "context injected into a chain without a target");
        }
    }

    pub(super) fn forward_wait(&self, key: &str) {
        if let Some(target) = &self.target {
            target.borrow_mut().wait_context(key);
        }
    }
}

impl Default for ChainCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps an inner command behind a predicate evaluated at execution time.
///
/// A false predicate skips the inner command entirely; the skip is not an
/// error, and a skipped inner command neither completes nor rolls back.
/// Skip hooks let the builder undo bookkeeping it applied while queueing
/// the inner command.
pub struct ConditionalCommand {
    inner: CommandRef,
    predicate: Box<dyn Fn() -> bool>,
    ran_inner: bool,
    on_skip: Vec<Box<dyn Fn()>>,
}

impl ConditionalCommand {
    /// Wrap a command behind a run-time predicate.
    #[must_use]
    pub fn new(inner: CommandRef, predicate: impl Fn() -> bool + 'static) -> Self {
        Self {
            inner,
            predicate: Box::new(predicate),
            ran_inner: false,
            on_skip: Vec::new(),
        }
    }

    /// Register a hook fired when the predicate rejects execution.
    pub fn on_skip(&mut self, hook: impl Fn() + 'static) {
        self.on_skip.push(Box::new(hook));
    }

    /// The wrapped command.
    #[must_use]
    pub fn inner(&self) -> &CommandRef {
        &self.inner
    }

    pub(super) fn is_ready(&self) -> bool {
        self.inner.borrow().is_ready()
    }

    pub(super) fn execute(&mut self) -> Result<()> {
        if (self.predicate)() {
            self.ran_inner = true;
            self.inner.borrow_mut().execute()
        } else {
            tracing::trace!(
                inner = %self.inner.borrow().describe(),
                "conditional predicate false, skipping"
            );
            for hook in &self.on_skip {
                hook();
            }
            Ok(())
        }
    }

    pub(super) fn complete(&self) {
        if self.ran_inner {
            self.inner.borrow().complete();
        }
    }

    pub(super) fn rollback(&self) {
        if self.ran_inner {
            self.inner.borrow().rollback();
        }
    }
}

/// A no-op placeholder.
///
/// Returned where cascade logic determines no action is needed, for example
/// a shared entity still referenced elsewhere.
pub struct NullCommand;
