use crate::context::{Context, OpDataKind};
use crate::engine::{StatusCode, StatusHandler};
use crate::error::{Error, ErrorKind, Result};
use crate::io::ResetMode;
use crate::key::KeyId;
use super::args::StatusArgs;


/// Marker data of a delete operation.
#[derive(Default)]
struct DeleteOpData;


/// Maps a `DELETE_PROBLEM` code to an error.
fn delete_problem(args: &str) -> Error {
    let code = StatusArgs::new(args)
        .last_int::<i64>()
        .unwrap_or(0);

    match code {
        1 => Error::new(ErrorKind::InvalidKey, "No such key"),
        2 => Error::new(ErrorKind::Conflict, "Secret key must be deleted first"),
        3 => Error::new(ErrorKind::AmbiguousName, "Key specification is ambiguous"),
        _ => Error::with_extra(ErrorKind::GeneralError, "Deletion failed", args),
    }
}


fn status_handler() -> StatusHandler {
    Box::new(|code: StatusCode, args: &str| match code {
        StatusCode::DeleteProblem => Err(delete_problem(args)),
        _ => Ok(()),
    })
}


impl Context {
    fn delete_begin(&mut self, mode: ResetMode, key: &KeyId, allow_secret: bool) -> Result<()> {
        self.reset(mode)?;

        if key.is_empty() {
            return Err(Error::invalid_value("Key to delete is not specified"));
        }

        self.op_data()
            .borrow_mut()
            .lookup_or_create::<DeleteOpData>(OpDataKind::Delete, None)?;

        self.install_status_chain(status_handler(), false)?;
        self.engine_mut()?
            .delete(key, allow_secret)
    }

    /// Starts deleting a key, completion is observed through the event loop.
    ///
    /// * `key` - key to delete
    /// * `allow_secret` - delete the secret key as well
    pub fn delete_start(&mut self, key: &KeyId, allow_secret: bool) -> Result<()> {
        let started = self.delete_begin(ResetMode::Asynchronous, key, allow_secret);
        self.launch(started)
    }

    /// Deletes a key and waits for the result.
    pub fn delete(&mut self, key: &KeyId, allow_secret: bool) -> Result<()> {
        let started = self.delete_begin(ResetMode::Synchronous, key, allow_secret);
        self.launch(started)?;
        self.wait_one()
    }
}
