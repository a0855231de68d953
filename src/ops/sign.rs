use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, OpDataKind, OpDataRegistry};
use crate::data::Data;
use crate::datetime::{self, Timestamp};
use crate::engine::{SigMode, StatusCode, StatusHandler};
use crate::error::{Error, ErrorKind, Result};
use crate::io::ResetMode;
use super::args::StatusArgs;
use super::{InvalidKey, parse_invalid_key};


/// Signature created by a sign operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSignature {
    pub mode: SigMode,
    pub pubkey_algo: i32,
    pub hash_algo: i32,
    pub sig_class: u32,

    /// Creation time, seconds since the epoch.
    pub timestamp: i64,
    pub fingerprint: String,
}


impl NewSignature {
    /// Creation time, `None` if it cannot be represented.
    pub fn created(&self) -> Option<Timestamp> {
        datetime::from_unix(self.timestamp)
    }
}


/// Result of a sign operation, in the order the backend reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignResult {
    pub invalid_signers: Vec<InvalidKey>,
    pub signatures: Vec<NewSignature>,
}


/// Parses `SIG_CREATED` arguments.
///
/// * `args` - status line arguments
pub(crate) fn parse_sig_created(args: &str) -> Result<NewSignature> {
    let mut fields = StatusArgs::new(args);

    let mode = match fields.tag()? {
        'S' => SigMode::Normal,
        'D' => SigMode::Detach,
        'C' => SigMode::Clear,
        _ => return Err(Error::misbehaving_backend(args)),
    };

    Ok(NewSignature {
        mode: mode,
        pubkey_algo: fields.int()?,
        hash_algo: fields.int()?,
        sig_class: fields.int()?,
        timestamp: fields.int()?,
        fingerprint: fields.word()?.to_owned(),
    })
}


fn status_handler(op_data: Rc<RefCell<OpDataRegistry>>) -> StatusHandler {
    Box::new(move |code: StatusCode, args: &str| {
        let mut registry = op_data.borrow_mut();
        let result = registry.lookup_or_create::<SignResult>(OpDataKind::Sign, None)?;

        match code {
            StatusCode::SigCreated => {
                let signature = parse_sig_created(args)?;
                result.signatures.try_reserve(1)?;
                result.signatures.push(signature);
            }

            StatusCode::InvRecp => {
                let key = parse_invalid_key(args)?;
                result.invalid_signers.try_reserve(1)?;
                result.invalid_signers.push(key);
            }

            StatusCode::Eof if !result.invalid_signers.is_empty() => {
                return Err(Error::with_extra(ErrorKind::InvalidUserID, "Some signers were rejected",
                    result.invalid_signers.len().to_string()));
            }

            _ => {}
        }

        Ok(())
    })
}


impl Context {
    fn sign_begin(&mut self, mode: ResetMode, plain: &Data, sig: &Data, sig_mode: SigMode) -> Result<()> {
        self.reset(mode)?;

        if plain.is_empty() {
            return Err(Error::new(ErrorKind::NoData, "Nothing to sign"));
        }

        self.op_data()
            .borrow_mut()
            .lookup_or_create::<SignResult>(OpDataKind::Sign, None)?;

        self.install_passphrase_command()?;
        self.install_status_chain(status_handler(self.op_data()), true)?;

        let options = self.sign_options();
        self.engine_mut()?
            .sign(plain, sig, sig_mode, &options)
    }

    /// Starts signing, completion is observed through the event loop.
    ///
    /// * `plain` - data to sign
    /// * `sig` - receives the signature
    /// * `mode` - kind of signature
    pub fn sign_start(&mut self, plain: &Data, sig: &Data, mode: SigMode) -> Result<()> {
        let started = self.sign_begin(ResetMode::Asynchronous, plain, sig, mode);
        self.launch(started)
    }

    /// Signs data and waits for the result.
    ///
    /// * `plain` - data to sign
    /// * `sig` - receives the signature
    /// * `mode` - kind of signature
    pub fn sign(&mut self, plain: &Data, sig: &Data, mode: SigMode) -> Result<()> {
        let started = self.sign_begin(ResetMode::Synchronous, plain, sig, mode);
        self.launch(started)?;
        self.wait_one()
    }

    /// Result of the last sign operation, once it has finished.
    pub fn sign_result(&self) -> Option<SignResult> {
        self.op_result(OpDataKind::Sign, SignResult::clone)
    }
}
