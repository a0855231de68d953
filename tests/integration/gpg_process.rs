//! Runs the gpg backend against a shell script speaking the status protocol

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use libgpgctx::config::{BackendConfig, Config};
use libgpgctx::engine::{BackendTable, Protocol};
use libgpgctx::{Context, Data, ErrorKind, KeyId, SigMode};
use tempfile::TempDir;

const FAKE_GPG: &str = r#"#!/bin/sh
status_fd=2
mode=
while [ $# -gt 0 ]; do
    case "$1" in
        --version) echo "gpg (GnuPG) 2.4.3"; exit 0 ;;
        --status-fd) status_fd=$2; shift ;;
        --sign|--delete-key) mode=$1 ;;
    esac
    shift
done

case "$mode" in
    --sign)
        cat > /dev/null
        echo "[GNUPG:] PROGRESS fake + 1 1" >&$status_fd
        echo "[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF" >&$status_fd
        printf 'signed by fake gpg'
        ;;
    --delete-key)
        echo "[GNUPG:] DELETE_PROBLEM 1" >&$status_fd
        ;;
esac
exit 0
"#;

fn install_fake_gpg(dir: &Path) -> Config {
    let program = dir.join("fake-gpg");
    std::fs::write(&program, FAKE_GPG).unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

    Config {
        homedir: Some(dir.join("gnupg")),
        openpgp: BackendConfig { file_name: Some(program) },
        cms: BackendConfig::default(),
    }
}

// Script creation and every spawn stay on one thread, a script still
// open for writing in a forked child cannot be executed
#[test]
fn test_fake_gpg_drives_operations_over_pipes() {
    let dir = TempDir::new().unwrap();
    let config = install_fake_gpg(dir.path());
    let table = Arc::new(BackendTable::from_config(&config));

    let info = table.engine_info().unwrap();
    assert_eq!(info[0].protocol, Protocol::OpenPgp);
    assert_eq!(info[0].version.as_deref(), Some("2.4.3"));
    table.check_version(Protocol::OpenPgp).unwrap();

    let mut ctx = Context::with_backends(table.clone());
    let progress = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = progress.clone();
    ctx.set_progress_cb(move |_: &str, _: char, _: u64, _: u64| counter.set(counter.get() + 1));

    let sig = Data::new();
    ctx.sign(&Data::from("hello from the test"), &sig, SigMode::Normal).unwrap();

    assert_eq!(sig.to_string_lossy(), "signed by fake gpg");
    assert_eq!(progress.get(), 1);

    let result = ctx.sign_result().unwrap();
    assert_eq!(result.signatures.len(), 1);
    assert_eq!(result.signatures[0].fingerprint, "0123456789ABCDEF");

    let err = ctx.delete(&KeyId::new("0123456789ABCDEF"), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidKey);
}
