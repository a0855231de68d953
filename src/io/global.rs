use std::cell::RefCell;
use std::rc::Rc;

use crate::context::ContextId;
use crate::error::Result;
use super::completion::Completion;
use super::fdtable::{self, FdTable};


/// Shared loop state.
#[derive(Default)]
struct GlobalLoop {
    table: Rc<RefCell<FdTable>>,

    /// Operations started on the shared loop and not yet collected
    pending: RefCell<Vec<(ContextId, Completion)>>,
}


thread_local! {
    static GLOBAL: GlobalLoop = GlobalLoop::default();
}


/// Descriptor table of the shared loop.
pub(super) fn table() -> Rc<RefCell<FdTable>> {
    GLOBAL.with(|global| global.table.clone())
}


/// Registers a dispatched operation with the shared loop.
pub(super) fn enroll(owner: ContextId, completion: Completion) {
    GLOBAL.with(|global| {
        let mut pending = global.pending.borrow_mut();
        pending.retain(|(id, _)| *id != owner);
        pending.push((owner, completion));
    })
}


/// Forgets an operation, it will not be reported by [`global_wait`].
pub(super) fn retire(owner: ContextId) {
    GLOBAL.with(|global| {
        global.pending
            .borrow_mut()
            .retain(|(id, _)| *id != owner)
    })
}


fn take_finished() -> Option<(ContextId, Result<()>)> {
    GLOBAL.with(|global| {
        let mut pending = global.pending.borrow_mut();
        let index = pending
            .iter()
            .position(|(_, completion)| completion.is_done())?;

        let (owner, completion) = pending.remove(index);
        completion.outcome()
            .map(|outcome| (owner, outcome))
    })
}


/// Drives the shared loop of the current thread.
///
/// Returns the context whose operation finished together with its outcome,
/// or `None` if nothing finished (only possible without `hang`, or when no
/// operation is in flight).
///
/// * `hang` - block until some operation finishes
pub fn global_wait(hang: bool) -> Result<Option<(ContextId, Result<()>)>> {
    let table = table();

    loop {
        if let Some(finished) = take_finished() {
            return Ok(Some(finished));
        }

        if table.borrow().is_empty() {
            //
            // Operations without descriptors left cannot make progress anymore
            //

            GLOBAL.with(|global| {
                for (_, completion) in global.pending.borrow().iter() {
                    completion.complete(Ok(()));
                }
            });

            return Ok(take_finished());
        }

        fdtable::run_once(&table, if hang { -1 } else { 0 })?;
        if !hang {
            return Ok(take_finished());
        }
    }
}
