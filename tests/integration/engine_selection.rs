//! Backend tables, engine creation and configuration

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use libgpgctx::config::{BackendConfig, Config};
use libgpgctx::engine::{Backend, BackendHandle, BackendTable, Engine, EngineInfoCache, Protocol, StatusCode};
use libgpgctx::io::IoCallbacks;
use libgpgctx::location::Location;
use libgpgctx::{Context, Data, ErrorKind, SigMode};
use libgpgctx::error::Result;
use tempfile::TempDir;

use super::test_utils::{MinimalBackend, MockBackend, RecordingLoop};

/// Configuration location inside of a temporary directory
struct TempLocation {
    dir: TempDir,
}

impl Location for TempLocation {
    fn root(&self) -> PathBuf {
        self.dir.path().join("gpgctx")
    }

    fn exists(&self) -> bool {
        self.root().exists()
    }

    fn create_if_absent(&self) -> libgpgctx::Result<()> {
        std::fs::create_dir_all(self.root())?;
        Ok(())
    }
}

/// Backend older than the version it requires
struct OutdatedBackend;

impl Backend for OutdatedBackend {
    fn file_name(&self) -> Option<&str> {
        Some("/usr/bin/old-gpg")
    }

    fn version(&self) -> Option<&str> {
        Some("0.4.3")
    }

    fn required_version(&self) -> Option<&str> {
        Some("1.2.2")
    }

    fn new_handle(&self) -> Result<Box<dyn BackendHandle>> {
        MinimalBackend.new_handle()
    }
}

/// Engine information of a table whose OpenPGP backend passed the version check
fn checked_engine_info(table: &BackendTable) -> Result<Vec<libgpgctx::engine::EngineInfo>> {
    table.check_version(Protocol::OpenPgp)?;
    table.engine_info()
}

#[test]
fn test_engine_info_cache_retries_after_failed_build() {
    let cache = EngineInfoCache::new();
    let outdated = BackendTable::empty().with_backend(Protocol::OpenPgp, Arc::new(OutdatedBackend));
    let current = BackendTable::empty().with_backend(Protocol::OpenPgp, Arc::new(MockBackend::new(&[])));

    let err = cache.get_or_build(|| checked_engine_info(&outdated)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEngine);
    assert!(cache.get().is_none());

    let info = cache.get_or_build(|| checked_engine_info(&current)).unwrap();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].file_name, "/usr/bin/mock-gpg");

    // Published once, later builds never run
    let again = cache.get_or_build(|| checked_engine_info(&outdated)).unwrap();
    assert!(std::ptr::eq(info, again));
}

#[test]
fn test_cms_passphrase_callback_needs_command_channel() {
    let backend = MockBackend::new(&["[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF"])
        .without_command_channel();

    let mut ctx = Context::with_backends(backend.cms_table());
    ctx.set_protocol(Protocol::Cms);
    ctx.set_passphrase_cb(|_: Option<&str>, _: Option<&str>, _: bool| Ok(Some("secret".to_owned())));

    let err = ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    assert!(backend.calls().is_empty());
    assert!(ctx.sign_result().is_none());

    // Without a callback the backend handles passphrases itself
    ctx.clear_passphrase_cb();
    ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(ctx.sign_result().unwrap().signatures.len(), 1);
}

#[test]
fn test_unsupported_operation_does_not_touch_io() {
    let table = BackendTable::empty().with_backend(Protocol::OpenPgp, Arc::new(MinimalBackend));
    let event_loop = RecordingLoop::new();

    let mut engine = Engine::new(&table, Protocol::OpenPgp).unwrap();
    engine.set_io_callbacks(event_loop.clone() as Rc<dyn IoCallbacks>);

    let err = engine.verify(&Data::from("sig"), None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);

    let err = engine.set_command_handler(Box::new(|_: StatusCode, _: &str| Ok(None))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);

    assert_eq!(event_loop.registered(), 0);
    assert!(event_loop.events().is_empty());
}

#[test]
fn test_context_forwards_not_implemented() {
    let table = BackendTable::empty().with_backend(Protocol::OpenPgp, Arc::new(MinimalBackend));
    let mut ctx = Context::with_backends(Arc::new(table));

    let err = ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);

    let err = ctx.trustlist_start("alice", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
}

#[test]
fn test_empty_table_has_no_engines() {
    let table = BackendTable::empty();

    assert_eq!(Engine::new(&table, Protocol::OpenPgp).unwrap_err().kind(), ErrorKind::InvalidEngine);
    assert_eq!(table.check_version(Protocol::Cms).unwrap_err().kind(), ErrorKind::InvalidEngine);
    assert!(table.engine_info().unwrap().is_empty());

    let mut ctx = Context::with_backends(Arc::new(table));
    let err = ctx.delete(&"0123456789ABCDEF".into(), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEngine);
}

#[test]
fn test_engine_info_lists_installed_backends() {
    let mock = MockBackend::new(&[]);
    let table = BackendTable::empty()
        .with_backend(Protocol::OpenPgp, Arc::new(mock))
        .with_backend(Protocol::Cms, Arc::new(MinimalBackend));

    table.check_version(Protocol::OpenPgp).unwrap();
    table.check_version(Protocol::Cms).unwrap();

    let info = table.engine_info().unwrap();
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].protocol, Protocol::OpenPgp);
    assert_eq!(info[0].file_name, "/usr/bin/mock-gpg");
    assert_eq!(info[0].version.as_deref(), Some("2.4.0"));
    assert_eq!(info[0].required_version.as_deref(), Some("1.2.2"));
    assert_eq!(info[1].protocol, Protocol::Cms);
    assert_eq!(info[1].version.as_deref(), Some("1.0.0"));
}

#[test]
fn test_protocol_codes() {
    assert_eq!(Protocol::try_from(0).unwrap(), Protocol::OpenPgp);
    assert_eq!(Protocol::try_from(1).unwrap(), Protocol::Cms);
    assert_eq!(Protocol::try_from(7).unwrap_err().kind(), ErrorKind::InvalidValue);
    assert_eq!(SigMode::try_from(3).unwrap_err().kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_config_round_trips_through_location() {
    let location = TempLocation { dir: TempDir::new().unwrap() };

    // Absent file means defaults
    assert_eq!(Config::open(&location).unwrap(), Config::default());

    let config = Config {
        homedir: Some(location.dir.path().join("gnupg")),
        openpgp: BackendConfig { file_name: Some(PathBuf::from("/opt/gnupg/bin/gpg")) },
        cms: BackendConfig::default(),
    };

    config.store(&location).unwrap();
    assert!(location.exists());
    assert_eq!(Config::open(&location).unwrap(), config);
}

#[test]
fn test_malformed_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engines.toml");
    std::fs::write(&path, "openpgp = 5\n").unwrap();

    assert_eq!(Config::from_file(&path).unwrap_err().kind(), ErrorKind::Config);
    assert_eq!(Config::from_file(&dir.path().join("missing.toml")).unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn test_configured_program_that_does_not_exist() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        homedir: None,
        openpgp: BackendConfig { file_name: Some(dir.path().join("no-such-gpg")) },
        cms: BackendConfig { file_name: Some(dir.path().join("no-such-gpgsm")) },
    };

    let table = BackendTable::from_config(&config);
    assert!(table.engine_info().unwrap().is_empty());
    assert_eq!(table.check_version(Protocol::OpenPgp).unwrap_err().kind(), ErrorKind::InvalidEngine);
    assert_eq!(Engine::new(&table, Protocol::Cms).unwrap_err().kind(), ErrorKind::InvalidEngine);
}
