use std::cell::RefCell;

use crate::context::ContextId;
use crate::error::Result;
use super::completion::Completion;
use super::{Direction, IoHandler, IoTag, RawFd};


/// One watched descriptor.
struct FdEntry {
    tag: IoTag,
    fd: RawFd,
    dir: Direction,

    /// Taken out while the handler runs
    handler: Option<IoHandler>,

    /// Context the descriptor belongs to
    owner: ContextId,

    /// Operation the descriptor belongs to
    completion: Completion,
}


/// Table of descriptors driven by the private and shared loops.
#[derive(Default)]
pub(crate) struct FdTable {
    entries: Vec<FdEntry>,
    next_tag: u64,
}


impl FdTable {
    /// Creates an empty table.
    pub(crate) fn new() -> Self {
        FdTable::default()
    }

    /// Starts watching a descriptor on behalf of an operation.
    pub(crate) fn add(&mut self, fd: RawFd, dir: Direction, handler: IoHandler, owner: ContextId,
        completion: Completion) -> Result<IoTag>
    {
        self.entries.try_reserve(1)?;

        self.next_tag += 1;
        let tag = IoTag(self.next_tag);

        self.entries.push(FdEntry {
            tag: tag,
            fd: fd,
            dir: dir,
            handler: Some(handler),
            owner: owner,
            completion: completion,
        });

        Ok(tag)
    }

    /// Stops watching a descriptor, returns its handler if it was idle.
    pub(crate) fn remove(&mut self, tag: IoTag) -> Option<IoHandler> {
        let index = self.entries
            .iter()
            .position(|e| e.tag == tag)?;

        self.entries
            .remove(index)
            .handler
    }

    /// Drops every registration of a context.
    pub(crate) fn remove_owner(&mut self, owner: ContextId) -> Vec<IoHandler> {
        let (removed, kept): (Vec<_>, Vec<_>) = self.entries
            .drain(..)
            .partition(|e| e.owner == owner);

        self.entries = kept;
        removed.into_iter()
            .filter_map(|e| e.handler)
            .collect()
    }

    /// Check if a context still has watched descriptors.
    pub(crate) fn has_pending(&self, owner: ContextId) -> bool {
        self.entries
            .iter()
            .any(|e| e.owner == owner)
    }

    /// Check if nothing is watched.
    pub(crate) fn is_empty(&self) -> bool {
        self.entries
            .is_empty()
    }

    fn take_handler(&mut self, tag: IoTag) -> Option<(IoHandler, ContextId, Completion)> {
        let entry = self.entries
            .iter_mut()
            .find(|e| e.tag == tag)?;

        let handler = entry.handler.take()?;
        Some((handler, entry.owner, entry.completion.clone()))
    }

    fn restore_handler(&mut self, tag: IoTag, handler: IoHandler) -> Option<IoHandler> {
        match self.entries.iter_mut().find(|e| e.tag == tag) {
            Some(entry) => {
                entry.handler = Some(handler);
                None
            }

            //
            // Registration was removed by the handler itself
            //

            None => Some(handler)
        }
    }
}


/// Waits for readiness once and dispatches ready handlers.
///
/// Returns number of dispatched handlers. A handler failure completes
/// its operation with the error and drops the rest of its registrations.
///
/// * `table` - descriptors to drive
/// * `timeout_ms` - poll timeout, negative value blocks
pub(crate) fn run_once(table: &RefCell<FdTable>, timeout_ms: i32) -> Result<usize> {
    let (mut pollfds, tags): (Vec<libc::pollfd>, Vec<IoTag>) = table
        .borrow()
        .entries
        .iter()
        .filter(|e| e.handler.is_some())
        .map(|e| (pollfd(e.fd, e.dir), e.tag))
        .unzip();

    if pollfds.is_empty() {
        return Ok(0);
    }

    if 0 == poll(&mut pollfds, timeout_ms)? {
        return Ok(0);
    }

    let ready: Vec<IoTag> = pollfds
        .iter()
        .zip(tags)
        .filter(|(p, _)| p.revents != 0)
        .map(|(_, tag)| tag)
        .collect();

    let mut dispatched = 0;
    for tag in ready {
        let taken = table
            .borrow_mut()
            .take_handler(tag);

        let Some((mut handler, owner, completion)) = taken else {
            continue;
        };

        dispatched += 1;
        match handler() {
            Ok(()) => {
                let orphan = table
                    .borrow_mut()
                    .restore_handler(tag, handler);

                drop(orphan);
            }

            Err(err) => {
                tracing::debug!(error = %err, "I/O handler failed, abandoning operation");

                let orphans = table
                    .borrow_mut()
                    .remove_owner(owner);

                drop(orphans);
                drop(handler);
                completion.complete(Err(err));
            }
        }
    }

    Ok(dispatched)
}


fn pollfd(fd: RawFd, dir: Direction) -> libc::pollfd {
    let events = match dir {
        Direction::Read  => libc::POLLIN,
        Direction::Write => libc::POLLOUT,
    };

    libc::pollfd { fd: fd, events: events, revents: 0 }
}


fn poll(fds: &mut [libc::pollfd], timeout_ms: i32) -> Result<usize> {
    loop {
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc >= 0 {
            return Ok(rc as usize);
        }

        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err.into());
        }
    }
}
