use std::sync::{Arc, Mutex, OnceLock};

use lazy_static::lazy_static;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::location::HomeLocation;
use super::backend::{Backend, Protocol};
use super::gpg_engine::GpgBackend;
use super::gpgsm_engine::GpgsmBackend;
use super::version::compare_versions;


/// Number of slots in the backend table.
const PROTOCOL_COUNT: usize = Protocol::ALL.len();

/// Message for backends not satisfying the version requirement.
const VERSION_MISMATCH: &str = "Backend version is missing or too old";


/// Information about one installed backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    /// Protocol served by the backend.
    pub protocol: Protocol,

    /// Path to the backend program.
    pub file_name: String,

    /// Installed version.
    pub version: Option<String>,

    /// Minimal version required by this library.
    pub required_version: Option<String>,
}


/// Table mapping protocols to backends.
///
/// Adding a backend means implementing [`Backend`] and putting it into
/// the table, nothing else has to change.
#[derive(Clone, Default)]
pub struct BackendTable {
    backends: [Option<Arc<dyn Backend>>; PROTOCOL_COUNT]
}


impl BackendTable {
    /// Creates a table without any backends.
    pub fn empty() -> Self {
        BackendTable::default()
    }

    /// Creates the standard table: `gpg` for OpenPGP, `gpgsm` for CMS.
    ///
    /// * `config` - backend locations
    pub fn from_config(config: &Config) -> Self {
        BackendTable::empty()
            .with_backend(Protocol::OpenPgp, Arc::new(GpgBackend::new(config)))
            .with_backend(Protocol::Cms, Arc::new(GpgsmBackend::new(config)))
    }

    /// Shared standard table configured from the user's home location.
    pub fn default_table() -> Arc<BackendTable> {
        DEFAULT_TABLE.clone()
    }

    /// Puts a backend into the slot of a protocol.
    ///
    /// * `protocol` - protocol served by the backend
    /// * `backend` - backend implementation
    pub fn with_backend(mut self, protocol: Protocol, backend: Arc<dyn Backend>) -> Self {
        self.backends[protocol.index()] = Some(backend);
        self
    }

    /// Backend selected for a protocol.
    ///
    /// * `protocol` - protocol to look up
    pub fn backend(&self, protocol: Protocol) -> Option<Arc<dyn Backend>> {
        self.backends[protocol.index()]
            .clone()
    }

    /// Verifies that a usable backend of a sufficient version is installed.
    ///
    /// * `protocol` - protocol to check
    pub fn check_version(&self, protocol: Protocol) -> Result<()> {
        let satisfied = self.backend(protocol)
            .map(|backend| compare_versions(backend.version(), backend.required_version()))
            .unwrap_or(false);

        satisfied
            .then_some(())
            .ok_or_else(|| Error::with_extra(ErrorKind::InvalidEngine, VERSION_MISMATCH, protocol.name()))
    }

    /// Describes every protocol whose backend program is installed.
    pub fn engine_info(&self) -> Result<Vec<EngineInfo>> {
        let mut info = Vec::new();
        info.try_reserve(Protocol::ALL.len())?;

        for protocol in Protocol::ALL {
            let Some(backend) = self.backend(protocol) else {
                continue;
            };

            let Some(file_name) = backend.file_name() else {
                continue;
            };

            info.push(EngineInfo {
                protocol: protocol,
                file_name: file_name.to_owned(),
                version: backend.version().map(str::to_owned),
                required_version: backend.required_version().map(str::to_owned),
            });
        }

        Ok(info)
    }
}


/// Engine information built once and kept for the rest of the process.
///
/// Construction runs under a lock. The list is published only if it was
/// built completely, a failed attempt leaves the cache empty.
pub struct EngineInfoCache {
    published: OnceLock<&'static [EngineInfo]>,
    lock: Mutex<()>,
}


impl EngineInfoCache {
    /// Creates an empty cache.
    pub const fn new() -> Self {
        EngineInfoCache {
            published: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// Published list, `None` until a build succeeded.
    pub fn get(&self) -> Option<&'static [EngineInfo]> {
        self.published
            .get()
            .copied()
    }

    /// Returns the published list, building it first if necessary.
    ///
    /// * `build` - produces the list, its error is returned as is
    pub fn get_or_build<F>(&self, build: F) -> Result<&'static [EngineInfo]>
    where
        F: FnOnce() -> Result<Vec<EngineInfo>>
    {
        if let Some(info) = self.get() {
            return Ok(info);
        }

        let _guard = self.lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(info) = self.get() {
            return Ok(info);
        }

        let info = build().map_err(|err| {
            tracing::debug!(kind = ?err.kind(), "engine information not cached");
            err
        })?;

        let info: &'static [EngineInfo] = Box::leak(info.into_boxed_slice());
        Ok(self.published.get_or_init(|| info))
    }
}


impl Default for EngineInfoCache {
    fn default() -> Self {
        EngineInfoCache::new()
    }
}


lazy_static! {
    static ref DEFAULT_TABLE: Arc<BackendTable> = Arc::new(BackendTable::from_config(&default_config()));
}


/// Engine information of the standard table.
static ENGINE_INFO: EngineInfoCache = EngineInfoCache::new();


fn default_config() -> Config {
    Config::open(&HomeLocation::new())
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring unreadable engine configuration");
            Config::default()
        })
}


/// Verifies the backend of a protocol in the standard table.
///
/// * `protocol` - protocol to check
pub fn check_version(protocol: Protocol) -> Result<()> {
    DEFAULT_TABLE.check_version(protocol)
}


/// Returns information about installed backends of the standard table.
///
/// The list is built once per process and stays valid forever. If building
/// fails, nothing is cached and a later call tries again.
pub fn get_engine_info() -> Result<&'static [EngineInfo]> {
    ENGINE_INFO.get_or_build(|| DEFAULT_TABLE.engine_info())
}
