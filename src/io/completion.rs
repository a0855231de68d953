use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;


/// Slot receiving the final outcome of one operation attempt.
///
/// The first outcome wins, later ones are ignored.
#[derive(Clone, Default)]
pub(crate) struct Completion {
    outcome: Rc<RefCell<Option<Result<()>>>>
}


impl Completion {
    /// Creates an empty slot.
    pub(crate) fn new() -> Self {
        Completion::default()
    }

    /// Stores an outcome unless one is present already.
    ///
    /// Returns true if this call completed the operation.
    ///
    /// * `outcome` - final result of the operation
    pub(crate) fn complete(&self, outcome: Result<()>) -> bool {
        let mut slot = self.outcome.borrow_mut();
        if slot.is_some() {
            return false;
        }

        *slot = Some(outcome);
        true
    }

    /// Returns the outcome, if the operation has finished.
    pub(crate) fn outcome(&self) -> Option<Result<()>> {
        self.outcome
            .borrow()
            .clone()
    }

    /// Check if the operation has finished.
    pub(crate) fn is_done(&self) -> bool {
        self.outcome
            .borrow()
            .is_some()
    }
}
