//! # libgpgctx
//!
//! `libgpgctx` runs cryptographic operations on out-of-process GnuPG
//! backends (`gpg` for OpenPGP, `gpgsm` for CMS). Backends are driven
//! through their status and command protocol over pipes, operations can
//! complete synchronously or on an event loop.

extern crate dirs;
extern crate libc;
extern crate chrono;
extern crate lazy_static;

//
// Public modules
//

pub mod location;
pub mod config;
pub mod error;
pub mod data;
pub mod key;
pub mod io;
pub mod engine;
pub mod context;
pub mod ops;

//
// Private modules
//

mod datetime;

//
// Commonly used items
//

pub use self::context::{Context, ContextId};
pub use self::data::Data;
pub use self::datetime::{Clock, Timestamp};
pub use self::engine::{Protocol, SigMode, check_version, get_engine_info};
pub use self::error::{Error, ErrorKind, Result};
pub use self::io::{IoCallbacks, global_wait};
pub use self::key::KeyId;
