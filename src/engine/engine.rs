use std::rc::Rc;
use std::sync::Arc;

use crate::data::Data;
use crate::error::{Error, ErrorKind, Result};
use crate::io::{IoCallbacks, IoEvent};
use crate::key::KeyId;
use super::backend::{Backend, BackendHandle, Protocol, SigMode, SignOptions};
use super::status::{StatusHandler, CommandHandler, ColonLineHandler};
use super::table::BackendTable;


/// Message for protocols without a usable backend.
const UNSUPPORTED_PROTOCOL: &str = "No usable backend for protocol";


/// Handle to one backend instance of a given protocol.
///
/// Errors returned by the backend are passed through unchanged.
pub struct Engine {
    /// Backend the engine was created from
    backend: Arc<dyn Backend>,

    /// Backend-specific handle
    handle: Box<dyn BackendHandle>,

    protocol: Protocol,
}


impl Engine {
    /// Creates an engine for a protocol.
    ///
    /// Fails with `InvalidEngine` if the protocol has no backend or the
    /// backend cannot report its program and version.
    ///
    /// * `table` - backend selection table
    /// * `protocol` - protocol to create an engine for
    pub fn new(table: &BackendTable, protocol: Protocol) -> Result<Self> {
        let backend = table
            .backend(protocol)
            .ok_or_else(|| Error::with_extra(ErrorKind::InvalidEngine, UNSUPPORTED_PROTOCOL, protocol.name()))?;

        let file_name = backend.file_name();
        let version = backend.version();

        if file_name.is_none() || version.is_none() {
            return Err(Error::with_extra(ErrorKind::InvalidEngine, UNSUPPORTED_PROTOCOL, protocol.name()));
        }

        tracing::debug!(protocol = protocol.name(), file_name, version, "creating engine");

        let handle = backend.new_handle()?;
        Ok(Engine {
            backend: backend,
            handle: handle,
            protocol: protocol,
        })
    }

    /// Protocol of the engine.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Path to the backend program.
    pub fn file_name(&self) -> Option<&str> {
        self.backend
            .file_name()
    }

    /// Version of the backend program.
    pub fn version(&self) -> Option<&str> {
        self.backend
            .version()
    }

    /// Installs the handler receiving status lines.
    pub fn set_status_handler(&mut self, handler: StatusHandler) {
        self.handle
            .set_status_handler(handler)
    }

    /// Installs the handler answering command requests.
    ///
    /// Fails with `NotImplemented` if the backend has no command channel.
    pub fn set_command_handler(&mut self, handler: CommandHandler) -> Result<()> {
        self.handle
            .set_command_handler(handler)
    }

    /// Installs the handler receiving colon listing lines.
    pub fn set_colon_line_handler(&mut self, handler: ColonLineHandler) -> Result<()> {
        self.handle
            .set_colon_line_handler(handler)
    }

    /// Selects the event loop the backend registers its descriptors with.
    pub fn set_io_callbacks(&mut self, io: Rc<dyn IoCallbacks>) {
        self.handle
            .set_io_callbacks(io)
    }

    /// Notifies the backend of a lifecycle event.
    pub fn io_event(&mut self, event: &IoEvent) {
        self.handle
            .io_event(event)
    }

    /// Starts decrypting `ciphertext` into `plaintext`.
    pub fn decrypt(&mut self, ciphertext: &Data, plaintext: &Data) -> Result<()> {
        self.handle
            .decrypt(ciphertext, plaintext)
    }

    /// Starts deleting a key.
    pub fn delete(&mut self, key: &KeyId, allow_secret: bool) -> Result<()> {
        self.handle
            .delete(key, allow_secret)
    }

    /// Starts an interactive key editing session.
    pub fn edit(&mut self, key: &KeyId, out: &Data) -> Result<()> {
        self.handle
            .edit(key, out)
    }

    /// Starts encrypting to `recipients`, symmetrically if there are none.
    pub fn encrypt(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data, armor: bool) -> Result<()> {
        self.handle
            .encrypt(recipients, plaintext, ciphertext, armor)
    }

    /// Starts encrypting and signing in one pass.
    pub fn encrypt_sign(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data,
        options: &SignOptions) -> Result<()>
    {
        self.handle
            .encrypt_sign(recipients, plaintext, ciphertext, options)
    }

    /// Starts exporting keys matching `patterns`.
    pub fn export(&mut self, patterns: &[String], keydata: &Data, armor: bool) -> Result<()> {
        self.handle
            .export(patterns, keydata, armor)
    }

    /// Starts generating a key from a parameter block.
    pub fn genkey(&mut self, params: &Data, armor: bool, pubkey: Option<&Data>, seckey: Option<&Data>) -> Result<()> {
        self.handle
            .genkey(params, armor, pubkey, seckey)
    }

    /// Starts importing keys.
    pub fn import(&mut self, keydata: &Data) -> Result<()> {
        self.handle
            .import(keydata)
    }

    /// Starts listing keys matching a pattern.
    pub fn keylist(&mut self, pattern: Option<&str>, secret_only: bool) -> Result<()> {
        self.handle
            .keylist(pattern, secret_only)
    }

    /// Starts listing keys matching any of `patterns`.
    pub fn keylist_ext(&mut self, patterns: &[String], secret_only: bool) -> Result<()> {
        self.handle
            .keylist_ext(patterns, secret_only)
    }

    /// Starts signing `input` into `output`.
    pub fn sign(&mut self, input: &Data, output: &Data, mode: SigMode, options: &SignOptions) -> Result<()> {
        self.handle
            .sign(input, output, mode, options)
    }

    /// Starts listing the trust path of keys matching a pattern.
    pub fn trustlist(&mut self, pattern: &str) -> Result<()> {
        self.handle
            .trustlist(pattern)
    }

    /// Starts verifying a signature.
    pub fn verify(&mut self, signature: &Data, signed_text: Option<&Data>, plaintext: Option<&Data>) -> Result<()> {
        self.handle
            .verify(signature, signed_text, plaintext)
    }
}


impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("protocol", &self.protocol)
            .field("file_name", &self.file_name())
            .finish()
    }
}
