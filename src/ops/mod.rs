mod args;
mod passphrase;
mod progress;
mod sign;
mod encrypt;
mod decrypt;
mod delete;
mod edit;
mod trustlist;

use crate::context::Context;
use crate::engine::{StatusChain, StatusHandler};
use crate::error::Result;
use self::args::StatusArgs;

pub use self::passphrase::PassphraseCallback;
pub use self::progress::ProgressCallback;
pub use self::sign::{SignResult, NewSignature};
pub use self::encrypt::EncryptResult;
pub use self::decrypt::DecryptResult;
pub use self::edit::EditCallback;
pub use self::trustlist::{TrustItem, TrustItemType};


/// Why the backend rejected a recipient or signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// No reason given, or a code this library does not know.
    Unknown,
    NotFound,
    Ambiguous,
    WrongKeyUsage,
    Revoked,
    Expired,
    NoCrlKnown,
    CrlTooOld,
    NoPolicyMatch,
    NoSecretKey,
    NotTrusted,
}


impl InvalidReason {
    /// Decodes a reason code reported by the backend.
    ///
    /// * `code` - reason code
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => InvalidReason::NotFound,
            2 => InvalidReason::Ambiguous,
            3 => InvalidReason::WrongKeyUsage,
            4 => InvalidReason::Revoked,
            5 => InvalidReason::Expired,
            6 => InvalidReason::NoCrlKnown,
            7 => InvalidReason::CrlTooOld,
            8 => InvalidReason::NoPolicyMatch,
            9 => InvalidReason::NoSecretKey,
            10 => InvalidReason::NotTrusted,
            _ => InvalidReason::Unknown,
        }
    }
}


/// Recipient or signer rejected by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKey {
    pub reason: InvalidReason,

    /// Rejected identity, if the backend named it.
    pub id: Option<String>,
}


/// Parses arguments of `INV_RECP`: reason code and optional identity.
///
/// * `args` - status line arguments
pub(crate) fn parse_invalid_key(args: &str) -> Result<InvalidKey> {
    let mut args = StatusArgs::new(args);
    let code: i64 = args.last_int()?;

    Ok(InvalidKey {
        reason: InvalidReason::from_code(code),
        id: args.tail().map(str::to_owned),
    })
}


impl Context {
    /// Installs the status handler chain for a new operation.
    ///
    /// Passphrase tracking (if requested) comes first, then progress
    /// reporting, then the operation's own handler.
    ///
    /// * `op_handler` - operation specific handler
    /// * `with_passphrase` - whether the operation may need a passphrase
    pub(crate) fn install_status_chain(&mut self, op_handler: StatusHandler, with_passphrase: bool) -> Result<()> {
        let mut chain = StatusChain::new();
        if with_passphrase {
            chain = chain.with(passphrase::status_handler(self.op_data())?);
        }

        chain = chain
            .with(progress::status_handler(self.progress_cb()))
            .with(op_handler);

        self.engine_mut()?
            .set_status_handler(chain.into_handler());

        Ok(())
    }

    /// Lets the passphrase callback answer command requests, if one is set.
    ///
    /// Fails with `NotImplemented` if the backend has no command channel
    /// while a callback is installed.
    pub(crate) fn install_passphrase_command(&mut self) -> Result<()> {
        let Some(callback) = self.passphrase_cb() else {
            return Ok(());
        };

        let handler = passphrase::command_handler(self.op_data(), callback);
        self.engine_mut()?
            .set_command_handler(handler)
    }
}
