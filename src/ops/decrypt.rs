use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, OpDataKind, OpDataRegistry};
use crate::data::Data;
use crate::engine::{StatusCode, StatusHandler};
use crate::error::{Error, ErrorKind, Result};
use crate::io::ResetMode;


/// Location keyword of algorithm errors in `ERROR` status lines.
const DECRYPT_ALGORITHM: &str = "decrypt.algorithm";


/// Result of a decrypt operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptResult {
    /// Algorithm the backend does not support, if that stopped decryption.
    pub unsupported_algorithm: Option<String>,
}


#[derive(Default)]
struct DecryptOpData {
    result: DecryptResult,
    okay: bool,
    failed: bool,
}


/// Extracts the algorithm from `ERROR decrypt.algorithm <code> <algo>`.
fn unsupported_algorithm(args: &str) -> Option<&str> {
    let mut fields = args.split(' ').filter(|f| !f.is_empty());
    if fields.next()? != DECRYPT_ALGORITHM {
        return None;
    }

    let _code = fields.next()?;
    fields.next()
        .filter(|algo| *algo != "?")
}


fn status_handler(op_data: Rc<RefCell<OpDataRegistry>>) -> StatusHandler {
    Box::new(move |code: StatusCode, args: &str| {
        let mut registry = op_data.borrow_mut();
        let data = registry.lookup_or_create::<DecryptOpData>(OpDataKind::Decrypt, None)?;

        match code {
            StatusCode::DecryptionOkay => data.okay = true,
            StatusCode::DecryptionFailed => data.failed = true,

            StatusCode::Error => {
                if let Some(algo) = unsupported_algorithm(args) {
                    data.result.unsupported_algorithm = Some(algo.to_owned());
                }
            }

            StatusCode::Eof if data.failed => {
                return Err(Error::new(ErrorKind::DecryptionFailed, "Backend could not decrypt the data"));
            }

            StatusCode::Eof if !data.okay => {
                return Err(Error::new(ErrorKind::NoData, "No encrypted data found"));
            }

            _ => {}
        }

        Ok(())
    })
}


impl Context {
    fn decrypt_begin(&mut self, mode: ResetMode, cipher: &Data, plain: &Data) -> Result<()> {
        self.reset(mode)?;

        if cipher.is_empty() {
            return Err(Error::new(ErrorKind::NoData, "Nothing to decrypt"));
        }

        self.op_data()
            .borrow_mut()
            .lookup_or_create::<DecryptOpData>(OpDataKind::Decrypt, None)?;

        self.install_passphrase_command()?;
        self.install_status_chain(status_handler(self.op_data()), true)?;

        self.engine_mut()?
            .decrypt(cipher, plain)
    }

    /// Starts decryption, completion is observed through the event loop.
    ///
    /// * `cipher` - data to decrypt
    /// * `plain` - receives the plaintext
    pub fn decrypt_start(&mut self, cipher: &Data, plain: &Data) -> Result<()> {
        let started = self.decrypt_begin(ResetMode::Asynchronous, cipher, plain);
        self.launch(started)
    }

    /// Decrypts data and waits for the result.
    pub fn decrypt(&mut self, cipher: &Data, plain: &Data) -> Result<()> {
        let started = self.decrypt_begin(ResetMode::Synchronous, cipher, plain);
        self.launch(started)?;
        self.wait_one()
    }

    /// Result of the last decrypt operation, once it has finished.
    pub fn decrypt_result(&self) -> Option<DecryptResult> {
        self.op_result(OpDataKind::Decrypt, |data: &DecryptOpData| data.result.clone())
    }
}
