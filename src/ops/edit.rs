use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, OpDataKind, OpDataRegistry};
use crate::data::Data;
use crate::engine::{StatusCode, StatusHandler, CommandHandler};
use crate::error::{Error, Result};
use crate::io::ResetMode;
use crate::key::KeyId;
use super::passphrase::{self, PassphraseCallback};


/// Callback driving a key edit session.
///
/// Receives every status line and command request. For command requests
/// the returned text is written back to the backend, `Ok(None)` sends an
/// empty line. Answers to plain status lines are ignored.
pub type EditCallback = Box<dyn FnMut(StatusCode, &str) -> Result<Option<String>>>;


#[derive(Default)]
struct EditOpData {
    callback: Option<Rc<RefCell<EditCallback>>>,
}


fn release_callback(data: &mut EditOpData) {
    data.callback = None;
}


/// Fetches the edit callback of the running operation.
fn edit_callback(op_data: &Rc<RefCell<OpDataRegistry>>) -> Option<Rc<RefCell<EditCallback>>> {
    op_data
        .borrow_mut()
        .lookup::<EditOpData>(OpDataKind::Edit)?
        .callback
        .clone()
}


fn call(callback: &Rc<RefCell<EditCallback>>, code: StatusCode, args: &str) -> Result<Option<String>> {
    let mut callback = callback
        .try_borrow_mut()
        .map_err(|_| Error::invalid_value("Edit callback is already running"))?;

    callback(code, args)
}


fn status_handler(op_data: Rc<RefCell<OpDataRegistry>>) -> StatusHandler {
    Box::new(move |code: StatusCode, args: &str| {
        if let Some(callback) = edit_callback(&op_data) {
            call(&callback, code, args)?;
        }

        Ok(())
    })
}


/// Offers requests to the passphrase callback first, then to the edit callback.
fn command_handler(op_data: Rc<RefCell<OpDataRegistry>>, passphrase_cb: Option<Rc<RefCell<PassphraseCallback>>>)
    -> CommandHandler
{
    Box::new(move |code: StatusCode, args: &str| {
        if let Some(passphrase_cb) = &passphrase_cb {
            if let Some(answer) = passphrase::answer(&op_data, passphrase_cb, code, args)? {
                return Ok(Some(answer));
            }
        }

        match edit_callback(&op_data) {
            Some(callback) => call(&callback, code, args),
            None => Ok(None),
        }
    })
}


impl Context {
    fn edit_begin(&mut self, mode: ResetMode, key: &KeyId, callback: EditCallback, out: &Data) -> Result<()> {
        self.reset(mode)?;

        if key.is_empty() {
            return Err(Error::invalid_value("Key to edit is not specified"));
        }

        self.op_data()
            .borrow_mut()
            .lookup_or_create::<EditOpData>(OpDataKind::Edit, Some(release_callback))?
            .callback = Some(Rc::new(RefCell::new(callback)));

        let handler = command_handler(self.op_data(), self.passphrase_cb());
        self.engine_mut()?
            .set_command_handler(handler)?;

        self.install_status_chain(status_handler(self.op_data()), true)?;
        self.engine_mut()?
            .edit(key, out)
    }

    /// Starts editing a key, completion is observed through the event loop.
    ///
    /// * `key` - key to edit
    /// * `callback` - answers the backend's questions
    /// * `out` - receives the backend's output
    pub fn edit_start<F>(&mut self, key: &KeyId, callback: F, out: &Data) -> Result<()>
    where
        F: FnMut(StatusCode, &str) -> Result<Option<String>> + 'static
    {
        let started = self.edit_begin(ResetMode::Asynchronous, key, Box::new(callback), out);
        self.launch(started)
    }

    /// Edits a key and waits for the session to finish.
    pub fn edit<F>(&mut self, key: &KeyId, callback: F, out: &Data) -> Result<()>
    where
        F: FnMut(StatusCode, &str) -> Result<Option<String>> + 'static
    {
        let started = self.edit_begin(ResetMode::Synchronous, key, Box::new(callback), out);
        self.launch(started)?;
        self.wait_one()
    }
}
