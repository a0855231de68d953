use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::engine::{BackendTable, Engine, Protocol, SignOptions};
use crate::io::{IoCallbacks, IoEvent, LoopStrategy, OperationLoop, ResetMode, select_strategy};
use crate::key::KeyId;
use crate::ops::{PassphraseCallback, ProgressCallback};
use super::op_data::{OpDataKind, OpDataRegistry};


/// Source of context identifiers.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);


/// Identifier of a context, reported by [`crate::io::global_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u64);


impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}


/// Caller-facing handle running operations on a backend.
///
/// A context runs one operation at a time. Every operation starts with a
/// reset, which throws away the previous engine and its results.
pub struct Context {
    id: ContextId,

    protocol: Protocol,
    armor: bool,
    textmode: bool,
    include_certs: i32,
    signers: Vec<KeyId>,

    passphrase_cb: Option<Rc<RefCell<PassphraseCallback>>>,
    progress_cb: Option<Rc<RefCell<ProgressCallback>>>,

    /// Caller's event loop
    io_callbacks: Option<Rc<dyn IoCallbacks>>,

    backends: Arc<BackendTable>,

    /// Engine of the current operation attempt
    engine: Option<Engine>,

    op_data: Rc<RefCell<OpDataRegistry>>,

    /// Loop binding of the current operation attempt
    op_loop: Option<OperationLoop>,
}


impl Context {
    /// Creates a context using the standard backend table.
    pub fn new() -> Self {
        Self::with_backends(BackendTable::default_table())
    }

    /// Creates a context using a custom backend table.
    ///
    /// * `backends` - protocol to backend mapping
    pub fn with_backends(backends: Arc<BackendTable>) -> Self {
        Context {
            id: ContextId::next(),
            protocol: Protocol::OpenPgp,
            armor: false,
            textmode: false,
            include_certs: 1,
            signers: Vec::new(),
            passphrase_cb: None,
            progress_cb: None,
            io_callbacks: None,
            backends: backends,
            engine: None,
            op_data: Rc::new(RefCell::new(OpDataRegistry::new())),
            op_loop: None,
        }
    }

    /// Identifier reported by [`crate::io::global_wait`].
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Protocol used by the next operation.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Selects the protocol, effective from the next operation.
    pub fn set_protocol(&mut self, protocol: Protocol) {
        self.protocol = protocol;
    }

    /// Check if output is ASCII armored.
    pub fn armor(&self) -> bool {
        self.armor
    }

    /// Enables or disables ASCII armored output.
    pub fn set_armor(&mut self, armor: bool) {
        self.armor = armor;
    }

    /// Check if input is treated as text.
    pub fn textmode(&self) -> bool {
        self.textmode
    }

    /// Enables or disables text mode for signing.
    pub fn set_textmode(&mut self, textmode: bool) {
        self.textmode = textmode;
    }

    /// Number of certificates included into CMS signatures.
    pub fn include_certs(&self) -> i32 {
        self.include_certs
    }

    /// Number of certificates to include into CMS signatures.
    /// Negative value leaves the decision to the backend.
    pub fn set_include_certs(&mut self, count: i32) {
        self.include_certs = count;
    }

    /// Keys used for signing, the backend default if empty.
    pub fn signers(&self) -> &[KeyId] {
        &self.signers
    }

    /// Adds a key to sign with.
    pub fn add_signer(&mut self, signer: KeyId) {
        self.signers.push(signer);
    }

    /// Forgets all signing keys.
    pub fn clear_signers(&mut self) {
        self.signers.clear();
    }

    /// Installs the passphrase callback.
    ///
    /// The callback receives the user id hint, passphrase information from
    /// the backend and whether the previous attempt was bad. Returning
    /// `Ok(None)` declines to answer.
    pub fn set_passphrase_cb<F>(&mut self, callback: F)
    where
        F: FnMut(Option<&str>, Option<&str>, bool) -> Result<Option<String>> + 'static
    {
        let callback: PassphraseCallback = Box::new(callback);
        self.passphrase_cb = Some(Rc::new(RefCell::new(callback)));
    }

    /// Removes the passphrase callback.
    pub fn clear_passphrase_cb(&mut self) {
        self.passphrase_cb = None;
    }

    /// Installs the progress callback.
    ///
    /// The callback receives what is being done, a type character,
    /// the current amount and the total amount.
    pub fn set_progress_cb<F>(&mut self, callback: F)
    where
        F: FnMut(&str, char, u64, u64) + 'static
    {
        let callback: ProgressCallback = Box::new(callback);
        self.progress_cb = Some(Rc::new(RefCell::new(callback)));
    }

    /// Removes the progress callback.
    pub fn clear_progress_cb(&mut self) {
        self.progress_cb = None;
    }

    /// Installs the caller's event loop, `None` returns to built-in loops.
    ///
    /// Takes effect on the next operation.
    pub fn set_io_callbacks(&mut self, io: Option<Rc<dyn IoCallbacks>>) {
        self.io_callbacks = io;
    }

    /// Engine of the current operation, `InvalidValue` before the first one.
    pub fn engine_mut(&mut self) -> Result<&mut Engine> {
        self.engine
            .as_mut()
            .ok_or_else(|| Error::invalid_value("Context has no engine yet"))
    }

    /// Loop the current operation runs on.
    pub fn loop_strategy(&self) -> Option<LoopStrategy> {
        self.op_loop
            .as_ref()
            .map(OperationLoop::strategy)
    }

    /// Check if the current operation has finished.
    pub fn is_finished(&self) -> bool {
        self.op_loop
            .as_ref()
            .map(|op_loop| op_loop.completion().is_done())
            .unwrap_or(false)
    }

    /// Waits for the current operation.
    ///
    /// Returns `None` if `hang` is false and the operation still runs,
    /// otherwise the outcome of the operation.
    ///
    /// * `hang` - block until the operation finishes
    pub fn wait(&mut self, hang: bool) -> Result<Option<Result<()>>> {
        let op_loop = self.op_loop
            .as_ref()
            .ok_or_else(|| Error::invalid_value("No operation was started"))?;

        let outcome = op_loop.wait(hang)?;
        if let Some(outcome) = &outcome {
            self.observe_completion(outcome);
        }

        Ok(outcome)
    }

    /// Blocks until the current operation finishes and returns its outcome.
    pub(crate) fn wait_one(&mut self) -> Result<()> {
        match self.wait(true)? {
            Some(outcome) => outcome,
            None => Err(Error::invalid_value("Operation did not finish")),
        }
    }

    /// Starts a new operation attempt.
    ///
    /// Releases results and the engine of the previous attempt, creates a new
    /// engine and binds it to the loop chosen for `mode`.
    ///
    /// * `mode` - how the operation is going to complete
    pub(crate) fn reset(&mut self, mode: ResetMode) -> Result<()> {
        self.release();

        let strategy = select_strategy(mode, self.io_callbacks.is_some());
        let mut engine = Engine::new(&self.backends, self.protocol)?;
        let (op_loop, callbacks) = OperationLoop::bind(strategy, self.id, self.io_callbacks.as_ref())?;

        engine.set_io_callbacks(callbacks);

        tracing::debug!(context = self.id.0, ?mode, ?strategy, "context reset");

        self.engine = Some(engine);
        self.op_loop = Some(op_loop);
        Ok(())
    }

    /// Settles the start of an operation begun by [`Context::reset`].
    ///
    /// On success the operation is armed and its completion becomes
    /// observable. On failure the attempt is dropped, so neither
    /// [`Context::wait`] nor [`crate::io::global_wait`] report it.
    ///
    /// * `started` - outcome of handing the operation to the engine
    pub(crate) fn launch(&mut self, started: Result<()>) -> Result<()> {
        if let Err(err) = started {
            tracing::debug!(context = self.id.0, kind = ?err.kind(), "operation failed to start");
            self.release();
            return Err(err);
        }

        self.op_loop()?
            .arm();

        Ok(())
    }

    /// Current loop binding, `InvalidValue` without an operation.
    pub(crate) fn op_loop(&self) -> Result<&OperationLoop> {
        self.op_loop
            .as_ref()
            .ok_or_else(|| Error::invalid_value("No operation was started"))
    }

    /// Tells the engine that its completion was seen.
    pub(crate) fn observe_completion(&mut self, outcome: &Result<()>) {
        if let Some(engine) = self.engine.as_mut() {
            engine.io_event(&IoEvent::Done(outcome.clone()));
        }
    }

    pub(crate) fn op_data(&self) -> Rc<RefCell<OpDataRegistry>> {
        self.op_data
            .clone()
    }

    pub(crate) fn passphrase_cb(&self) -> Option<Rc<RefCell<PassphraseCallback>>> {
        self.passphrase_cb
            .clone()
    }

    pub(crate) fn progress_cb(&self) -> Option<Rc<RefCell<ProgressCallback>>> {
        self.progress_cb
            .clone()
    }

    pub(crate) fn sign_options(&self) -> SignOptions {
        SignOptions {
            armor: self.armor,
            textmode: self.textmode,
            include_certs: self.include_certs,
            signers: self.signers.clone(),
        }
    }

    /// Extracts a result of a finished operation.
    ///
    /// * `kind` - kind of operation data holding the result
    /// * `extract` - builds the result from operation data
    pub(crate) fn op_result<T: Any, R>(&self, kind: OpDataKind, extract: impl FnOnce(&T) -> R) -> Option<R> {
        if !self.is_finished() {
            return None;
        }

        self.op_data
            .borrow_mut()
            .lookup::<T>(kind)
            .map(|data| extract(data))
    }

    fn release(&mut self) {
        if let Some(op_loop) = self.op_loop.take() {
            op_loop.release();
        }

        //
        // Engine goes first, so the backend stops feeding handlers
        // that refer to operation data
        //

        self.engine = None;
        self.op_data
            .borrow_mut()
            .release_all();
    }
}


impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}


impl Drop for Context {
    fn drop(&mut self) {
        self.release();
    }
}


impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("armor", &self.armor)
            .field("textmode", &self.textmode)
            .field("engine", &self.engine)
            .finish()
    }
}
