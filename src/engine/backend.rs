use std::rc::Rc;

use crate::data::Data;
use crate::error::{Error, Result};
use crate::io::{IoCallbacks, IoEvent};
use crate::key::KeyId;
use super::status::{StatusHandler, CommandHandler, ColonLineHandler};


/// Protocols a backend can be selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// OpenPGP, served by `gpg`.
    OpenPgp = 0,

    /// CMS, served by `gpgsm`.
    Cms = 1,
}


impl Protocol {
    /// Every known protocol, in table order.
    pub const ALL: [Protocol; 2] = [Protocol::OpenPgp, Protocol::Cms];

    /// Position of the protocol in the backend table.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Human-readable protocol name.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::OpenPgp => "OpenPGP",
            Protocol::Cms => "CMS",
        }
    }
}


impl TryFrom<u32> for Protocol {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Protocol::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| Error::invalid_value(format!("Unknown protocol {}", value)))
    }
}


/// Kind of signature to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigMode {
    /// Signature wrapping the signed data.
    Normal = 0,

    /// Detached signature.
    Detach = 1,

    /// Cleartext signature.
    Clear = 2,
}


impl TryFrom<u32> for SigMode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(SigMode::Normal),
            1 => Ok(SigMode::Detach),
            2 => Ok(SigMode::Clear),
            _ => Err(Error::invalid_value(format!("Unknown signature mode {}", value))),
        }
    }
}


/// Context settings forwarded with a signing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignOptions {
    /// ASCII armored output.
    pub armor: bool,

    /// Canonical text mode.
    pub textmode: bool,

    /// Number of certificates to include, CMS only. Negative means backend default.
    pub include_certs: i32,

    /// Keys to sign with, backend default key if empty.
    pub signers: Vec<KeyId>,
}


/// Static part of a backend: what is installed and how to start it.
///
/// One implementation exists per protocol. Instances are shared between
/// all engines of that protocol.
pub trait Backend: Send + Sync {
    /// Path to the backend program, `None` if it is not installed.
    fn file_name(&self) -> Option<&str>;

    /// Version of the installed backend.
    fn version(&self) -> Option<&str>;

    /// Minimal version this library works with.
    fn required_version(&self) -> Option<&str>;

    /// Creates a handle for one engine.
    fn new_handle(&self) -> Result<Box<dyn BackendHandle>>;
}


/// Running part of a backend owned by one engine.
///
/// Operations a backend does not support keep the default implementation,
/// which fails with `NotImplemented` without touching any I/O.
#[allow(unused_variables)]
pub trait BackendHandle {
    /// Installs the handler receiving status lines.
    fn set_status_handler(&mut self, handler: StatusHandler);

    /// Installs the handler answering command requests.
    fn set_command_handler(&mut self, handler: CommandHandler) -> Result<()> {
        Err(Error::not_implemented("command handler"))
    }

    /// Installs the handler receiving colon-delimited listing lines.
    fn set_colon_line_handler(&mut self, handler: ColonLineHandler) -> Result<()> {
        Err(Error::not_implemented("colon line handler"))
    }

    /// Installs event loop callbacks used for the next operation.
    fn set_io_callbacks(&mut self, io: Rc<dyn IoCallbacks>);

    /// Receives lifecycle notifications observed by the context.
    fn io_event(&mut self, event: &IoEvent) {}

    fn decrypt(&mut self, ciphertext: &Data, plaintext: &Data) -> Result<()> {
        Err(Error::not_implemented("decrypt"))
    }

    fn delete(&mut self, key: &KeyId, allow_secret: bool) -> Result<()> {
        Err(Error::not_implemented("delete"))
    }

    fn edit(&mut self, key: &KeyId, out: &Data) -> Result<()> {
        Err(Error::not_implemented("edit"))
    }

    fn encrypt(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data, armor: bool) -> Result<()> {
        Err(Error::not_implemented("encrypt"))
    }

    fn encrypt_sign(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data,
        options: &SignOptions) -> Result<()>
    {
        Err(Error::not_implemented("encrypt_sign"))
    }

    fn export(&mut self, patterns: &[String], keydata: &Data, armor: bool) -> Result<()> {
        Err(Error::not_implemented("export"))
    }

    fn genkey(&mut self, params: &Data, armor: bool, pubkey: Option<&Data>, seckey: Option<&Data>) -> Result<()> {
        Err(Error::not_implemented("genkey"))
    }

    fn import(&mut self, keydata: &Data) -> Result<()> {
        Err(Error::not_implemented("import"))
    }

    fn keylist(&mut self, pattern: Option<&str>, secret_only: bool) -> Result<()> {
        Err(Error::not_implemented("keylist"))
    }

    fn keylist_ext(&mut self, patterns: &[String], secret_only: bool) -> Result<()> {
        Err(Error::not_implemented("keylist_ext"))
    }

    fn sign(&mut self, input: &Data, output: &Data, mode: SigMode, options: &SignOptions) -> Result<()> {
        Err(Error::not_implemented("sign"))
    }

    fn trustlist(&mut self, pattern: &str) -> Result<()> {
        Err(Error::not_implemented("trustlist"))
    }

    fn verify(&mut self, signature: &Data, signed_text: Option<&Data>, plaintext: Option<&Data>) -> Result<()> {
        Err(Error::not_implemented("verify"))
    }
}
