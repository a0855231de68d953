use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, OpDataKind, OpDataRegistry};
use crate::data::Data;
use crate::engine::{StatusCode, StatusHandler};
use crate::error::{Error, ErrorKind, Result};
use crate::io::ResetMode;
use crate::key::KeyId;
use super::{InvalidKey, parse_invalid_key};


/// Result of an encrypt operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptResult {
    /// Recipients rejected by the backend, in the order reported.
    pub invalid_recipients: Vec<InvalidKey>,
}


#[derive(Default)]
struct EncryptOpData {
    result: EncryptResult,

    /// Backend found no usable recipient at all
    no_recipients: bool,
}


fn status_handler(op_data: Rc<RefCell<OpDataRegistry>>) -> StatusHandler {
    Box::new(move |code: StatusCode, args: &str| {
        let mut registry = op_data.borrow_mut();
        let data = registry.lookup_or_create::<EncryptOpData>(OpDataKind::Encrypt, None)?;

        match code {
            StatusCode::InvRecp => {
                let key = parse_invalid_key(args)?;
                data.result.invalid_recipients.try_reserve(1)?;
                data.result.invalid_recipients.push(key);
            }

            StatusCode::NoRecp => data.no_recipients = true,

            StatusCode::Eof if !data.result.invalid_recipients.is_empty() => {
                return Err(Error::with_extra(ErrorKind::InvalidUserID, "Some recipients were rejected",
                    data.result.invalid_recipients.len().to_string()));
            }

            StatusCode::Eof if data.no_recipients => {
                return Err(Error::new(ErrorKind::NoRecipients, "No usable recipients"));
            }

            _ => {}
        }

        Ok(())
    })
}


impl Context {
    fn encrypt_begin(&mut self, mode: ResetMode, recipients: &[KeyId], plain: &Data, cipher: &Data) -> Result<()> {
        self.reset(mode)?;

        if plain.is_empty() {
            return Err(Error::new(ErrorKind::NoData, "Nothing to encrypt"));
        }

        self.op_data()
            .borrow_mut()
            .lookup_or_create::<EncryptOpData>(OpDataKind::Encrypt, None)?;

        self.install_passphrase_command()?;
        self.install_status_chain(status_handler(self.op_data()), true)?;

        let armor = self.armor();
        self.engine_mut()?
            .encrypt(recipients, plain, cipher, armor)
    }

    /// Starts encryption, completion is observed through the event loop.
    ///
    /// Without recipients the data is encrypted symmetrically.
    ///
    /// * `recipients` - keys to encrypt to
    /// * `plain` - data to encrypt
    /// * `cipher` - receives the ciphertext
    pub fn encrypt_start(&mut self, recipients: &[KeyId], plain: &Data, cipher: &Data) -> Result<()> {
        let started = self.encrypt_begin(ResetMode::Asynchronous, recipients, plain, cipher);
        self.launch(started)
    }

    /// Encrypts data and waits for the result.
    pub fn encrypt(&mut self, recipients: &[KeyId], plain: &Data, cipher: &Data) -> Result<()> {
        let started = self.encrypt_begin(ResetMode::Synchronous, recipients, plain, cipher);
        self.launch(started)?;
        self.wait_one()
    }

    /// Result of the last encrypt operation, once it has finished.
    pub fn encrypt_result(&self) -> Option<EncryptResult> {
        self.op_result(OpDataKind::Encrypt, |data: &EncryptOpData| data.result.clone())
    }
}
