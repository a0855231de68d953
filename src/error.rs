use std::collections::TryReserveError;


/// Kind of failure reported by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Caller violated an argument contract.
    #[error("Invalid value")]
    InvalidValue,

    /// The backend for the selected protocol lacks the requested capability.
    #[error("Not implemented")]
    NotImplemented,

    /// Backend is missing or its version is insufficient.
    #[error("Invalid crypto engine")]
    InvalidEngine,

    /// Required data is absent or empty.
    #[error("No data")]
    NoData,

    /// Allocation failed.
    #[error("Out of core")]
    OutOfMemory,

    /// The backend violated the status or command protocol.
    #[error("General error")]
    GeneralError,

    /// Operation completed, but some recipients or signers were rejected.
    #[error("Invalid user ID")]
    InvalidUserID,

    /// No more items.
    #[error("End of file")]
    Eof,

    /// Passphrase was wrong or missing.
    #[error("Bad passphrase")]
    BadPassphrase,

    /// None of the recipients could be used.
    #[error("No recipients")]
    NoRecipients,

    /// Backend failed to decrypt the data.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Key does not exist.
    #[error("Invalid key")]
    InvalidKey,

    /// Secret key must be removed first.
    #[error("Conflict")]
    Conflict,

    /// Key specification matches more than one key.
    #[error("Ambiguous name")]
    AmbiguousName,

    /// Pipe or process failure.
    #[error("I/O error")]
    Io,

    /// Configuration could not be read.
    #[error("Configuration error")]
    Config,
}


/// Structure, that describes all errors in the library.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    extra: String
}


impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        write!(f, r#"{}: "{}" (extra: "{}")"#, self.kind, self.msg, self.extra)
    }
}


impl std::error::Error for Error {}


impl Error {
    /// Creates an error of a specific kind with a message.
    ///
    /// * `kind` - failure kind
    /// * `msg` - human-readable message
    pub fn new<M: Into<String>>(kind: ErrorKind, msg: M) -> Self {
        Error {
            kind: kind,
            msg: msg.into(),
            extra: String::new()
        }
    }

    /// Creates an error with an additional detail string.
    ///
    /// * `kind` - failure kind
    /// * `msg` - human-readable message
    /// * `extra` - detail, e.g. offending input
    pub fn with_extra<M: Into<String>, E: Into<String>>(kind: ErrorKind, msg: M, extra: E) -> Self {
        Error {
            kind: kind,
            msg: msg.into(),
            extra: extra.into()
        }
    }

    /// Kind of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message of the failure.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Additional detail.
    pub fn extra(&self) -> &str {
        &self.extra
    }

    pub(crate) fn invalid_value<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::InvalidValue, msg)
    }

    pub(crate) fn not_implemented<M: Into<String>>(what: M) -> Self {
        Self::with_extra(ErrorKind::NotImplemented, NOT_IMPLEMENTED, what)
    }

    pub(crate) fn misbehaving_backend<E: Into<String>>(input: E) -> Self {
        Self::with_extra(ErrorKind::GeneralError, BACKEND_MISBEHAVES, input)
    }
}


/// Message for missing backend capabilities.
const NOT_IMPLEMENTED: &str = "Backend does not implement the operation";

/// Message for status protocol violations.
const BACKEND_MISBEHAVES: &str = "The crypto backend is not behaving";


impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        let msg = value.to_string();
        let extra = format!("os error: {:?}", value.raw_os_error());

        Error {
            kind: ErrorKind::Io,
            msg: msg,
            extra: extra
        }
    }
}


impl From<TryReserveError> for Error {
    fn from(value: TryReserveError) -> Self {
        Error::with_extra(ErrorKind::OutOfMemory, "Allocation failed", value.to_string())
    }
}


impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Error::with_extra(ErrorKind::Config, "Malformed configuration file", value.message())
    }
}


/// Crate-specific alias for [`std::result::Result`] instantiated
/// with [`crate::error::Error`].
pub type Result<T> = std::result::Result<T, Error>;
