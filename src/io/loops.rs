use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::context::ContextId;
use crate::error::{Error, Result};
use super::completion::Completion;
use super::fdtable::{self, FdTable};
use super::global;
use super::{Direction, IoCallbacks, IoEvent, IoHandler, IoTag, RawFd};


/// How the next operation should complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Use the caller's loop if one is set, else the shared loop.
    Asynchronous,

    /// Always use a private loop, the caller blocks until completion.
    Synchronous,

    /// Use a private loop unless the caller supplied one.
    AsynchronousPrivate,
}


/// Loop driving the descriptors of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStrategy {
    /// Dedicated wait queue scoped to one operation.
    Private,

    /// Shared loop of the current thread.
    Global,

    /// Loop supplied by the caller.
    User,
}


/// Chooses the loop for an operation.
///
/// * `mode` - reset mode requested by the operation driver
/// * `has_user_loop` - whether the caller installed their own callbacks
pub fn select_strategy(mode: ResetMode, has_user_loop: bool) -> LoopStrategy {
    match mode {
        ResetMode::Synchronous => LoopStrategy::Private,
        ResetMode::AsynchronousPrivate if !has_user_loop => LoopStrategy::Private,
        _ if has_user_loop => LoopStrategy::User,
        _ => LoopStrategy::Global,
    }
}


/// Loop binding of one operation attempt.
pub(crate) struct OperationLoop {
    strategy: LoopStrategy,
    owner: ContextId,
    completion: Completion,

    /// Set once the engine accepted the operation
    armed: Cell<bool>,

    /// Descriptor table for private and shared loops
    table: Option<Rc<RefCell<FdTable>>>,
}


impl OperationLoop {
    /// Binds a new operation to a loop.
    ///
    /// Returns the binding and callbacks to hand to the engine. The
    /// operation counts as running only after [`OperationLoop::arm`].
    ///
    /// * `strategy` - loop to use
    /// * `owner` - context starting the operation
    /// * `user` - caller's callbacks, required for [`LoopStrategy::User`]
    pub(crate) fn bind(strategy: LoopStrategy, owner: ContextId, user: Option<&Rc<dyn IoCallbacks>>)
        -> Result<(Self, Rc<dyn IoCallbacks>)>
    {
        let completion = Completion::new();

        let (table, callbacks): (Option<Rc<RefCell<FdTable>>>, Rc<dyn IoCallbacks>) = match strategy {
            LoopStrategy::Private => {
                let table = Rc::new(RefCell::new(FdTable::new()));
                let callbacks = TableCallbacks::new(table.clone(), owner, completion.clone());
                (Some(table), Rc::new(callbacks))
            }

            LoopStrategy::Global => {
                let table = global::table();
                let callbacks = TableCallbacks::new(table.clone(), owner, completion.clone());
                (Some(table), Rc::new(callbacks))
            }

            LoopStrategy::User => {
                let user = user
                    .ok_or_else(|| Error::invalid_value("User event loop is not configured"))?;

                (None, Rc::new(UserCallbacks { user: user.clone(), completion: completion.clone() }))
            }
        };

        tracing::trace!(?strategy, owner = owner.0, "operation bound to event loop");

        let binding = OperationLoop {
            strategy: strategy,
            owner: owner,
            completion: completion,
            armed: Cell::new(false),
            table: table,
        };

        Ok((binding, callbacks))
    }

    /// Loop the operation runs on.
    pub(crate) fn strategy(&self) -> LoopStrategy {
        self.strategy
    }

    /// Marks the operation as dispatched to the engine.
    ///
    /// Operations on the shared loop become visible to
    /// [`super::global_wait`] from here on.
    pub(crate) fn arm(&self) {
        if self.armed.replace(true) {
            return;
        }

        if self.strategy == LoopStrategy::Global {
            global::enroll(self.owner, self.completion.clone());
        }
    }

    /// Outcome slot of the operation.
    pub(crate) fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Drives the loop once.
    ///
    /// * `hang` - block until at least one descriptor is ready
    pub(crate) fn step(&self, hang: bool) -> Result<()> {
        if !self.armed.get() {
            return Err(Error::invalid_value("Operation was not started"));
        }

        let Some(table) = &self.table else {
            if hang && !self.completion.is_done() {
                return Err(Error::invalid_value("User event loop must be driven by the caller"));
            }

            return Ok(());
        };

        if !table.borrow().has_pending(self.owner) {
            //
            // Nothing left that could finish the operation
            //

            self.completion.complete(Ok(()));
            return Ok(());
        }

        fdtable::run_once(table, if hang { -1 } else { 0 })?;
        Ok(())
    }

    /// Waits for the operation to finish.
    ///
    /// Returns `None` if `hang` is false and the operation is still running.
    ///
    /// * `hang` - block until completion
    pub(crate) fn wait(&self, hang: bool) -> Result<Option<Result<()>>> {
        loop {
            if let Some(outcome) = self.completion.outcome() {
                if self.strategy == LoopStrategy::Global {
                    global::retire(self.owner);
                }

                return Ok(Some(outcome));
            }

            self.step(hang)?;
            if !hang {
                return Ok(self.completion.outcome());
            }
        }
    }

    /// Abandons the operation, dropping its registrations.
    pub(crate) fn release(&self) {
        if let Some(table) = &self.table {
            let orphans = table
                .borrow_mut()
                .remove_owner(self.owner);

            drop(orphans);
        }

        if self.strategy == LoopStrategy::Global {
            global::retire(self.owner);
        }
    }
}


/// Callbacks backed by one of our descriptor tables.
struct TableCallbacks {
    table: Rc<RefCell<FdTable>>,
    owner: ContextId,
    completion: Completion,
}


impl TableCallbacks {
    fn new(table: Rc<RefCell<FdTable>>, owner: ContextId, completion: Completion) -> Self {
        TableCallbacks { table, owner, completion }
    }
}


impl IoCallbacks for TableCallbacks {
    fn add(&self, fd: RawFd, dir: Direction, handler: IoHandler) -> Result<IoTag> {
        self.table
            .borrow_mut()
            .add(fd, dir, handler, self.owner, self.completion.clone())
    }

    fn remove(&self, tag: IoTag) {
        let handler = self.table
            .borrow_mut()
            .remove(tag);

        drop(handler);
    }

    fn event(&self, event: IoEvent) {
        match event {
            IoEvent::Start => tracing::trace!(owner = self.owner.0, "operation started"),
            IoEvent::Done(outcome) => {
                tracing::debug!(owner = self.owner.0, ok = outcome.is_ok(), "operation done");
                self.completion.complete(outcome);
            }
        }
    }
}


/// Callbacks forwarding to the caller's loop.
struct UserCallbacks {
    user: Rc<dyn IoCallbacks>,
    completion: Completion,
}


impl IoCallbacks for UserCallbacks {
    fn add(&self, fd: RawFd, dir: Direction, handler: IoHandler) -> Result<IoTag> {
        self.user
            .add(fd, dir, handler)
    }

    fn remove(&self, tag: IoTag) {
        self.user
            .remove(tag)
    }

    fn event(&self, event: IoEvent) {
        if let IoEvent::Done(outcome) = &event {
            self.completion.complete(outcome.clone());
        }

        self.user
            .event(event)
    }
}
