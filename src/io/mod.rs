//! Event loop integration.
//!
//! Engines never block on their pipes. Instead they register every file
//! descriptor with an [`IoCallbacks`] implementation and get called back
//! when the descriptor is ready. Three implementations exist: a private
//! loop scoped to one operation, a shared loop (one per thread), and a
//! caller-supplied loop.

mod completion;
mod fdtable;
mod loops;
mod global;

use crate::error::Result;

pub use std::os::fd::RawFd;

pub use self::loops::{ResetMode, LoopStrategy, select_strategy};
pub use self::global::global_wait;

pub(crate) use self::loops::OperationLoop;


/// Readiness an engine waits for on a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Descriptor has data to read (or reached end of file).
    Read,

    /// Descriptor accepts more data.
    Write,
}


/// Registration handle returned by [`IoCallbacks::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoTag(pub u64);


/// Lifecycle notification emitted by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum IoEvent {
    /// All descriptors of the operation are registered.
    Start,

    /// The operation finished with the given outcome.
    Done(Result<()>),
}


/// Function invoked when a registered descriptor becomes ready.
///
/// The engine owning the descriptor removes the registration itself
/// once it is done with it.
pub type IoHandler = Box<dyn FnMut() -> Result<()>>;


/// Set of callbacks an engine uses to talk to an event loop.
pub trait IoCallbacks {
    /// Starts watching a descriptor.
    ///
    /// * `fd` - descriptor to watch
    /// * `dir` - readiness to wait for
    /// * `handler` - function to call on readiness
    fn add(&self, fd: RawFd, dir: Direction, handler: IoHandler) -> Result<IoTag>;

    /// Stops watching a descriptor.
    ///
    /// * `tag` - registration returned by [`IoCallbacks::add`]
    fn remove(&self, tag: IoTag);

    /// Receives a lifecycle notification.
    ///
    /// * `event` - what happened
    fn event(&self, event: IoEvent);
}
