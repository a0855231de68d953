//! Command requests, passphrases and progress reporting

use std::cell::RefCell;
use std::rc::Rc;

use libgpgctx::engine::StatusCode;
use libgpgctx::{Context, Data, ErrorKind, KeyId, SigMode};

use super::test_utils::{MockBackend, MOCK_OUTPUT};

const SIGNATURE: &str = "[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF";

#[test]
fn test_edit_callback_answers_prompts() {
    let backend = MockBackend::new(&[
        "[GNUPG:] GET_LINE keyedit.prompt",
        "[GNUPG:] GOT_IT",
        "[GNUPG:] GET_BOOL keyedit.save.okay",
        "[GNUPG:] GOT_IT",
    ]);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut ctx = Context::with_backends(backend.table());
    let out = Data::new();
    ctx.edit(&KeyId::new("0123456789ABCDEF"), move |code: StatusCode, args: &str| {
        sink.borrow_mut().push(code);
        match (code, args) {
            (StatusCode::GetLine, "keyedit.prompt") => Ok(Some("quit".to_owned())),
            (StatusCode::GetBool, "keyedit.save.okay") => Ok(Some("Y".to_owned())),
            _ => Ok(None),
        }
    }, &out).unwrap();

    assert_eq!(backend.calls(), vec!["edit 0123456789ABCDEF"]);
    assert_eq!(backend.answers(), vec!["quit", "Y"]);
    assert_eq!(out.to_vec(), MOCK_OUTPUT);
    assert_eq!(*seen.borrow(), vec![
        StatusCode::GetLine,
        StatusCode::GotIt,
        StatusCode::GetBool,
        StatusCode::GotIt,
        StatusCode::Eof,
    ]);
}

#[test]
fn test_edit_callback_error_aborts_session() {
    let backend = MockBackend::new(&["[GNUPG:] GET_LINE keyedit.prompt", "[GNUPG:] GOT_IT"]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.edit(&KeyId::new("0123456789ABCDEF"), |_: StatusCode, _: &str| {
        Err(libgpgctx::Error::new(ErrorKind::Conflict, "refusing"))
    }, &Data::new()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(backend.answers().is_empty());
}

#[test]
fn test_passphrase_callback_receives_hint() {
    let backend = MockBackend::new(&[
        "[GNUPG:] USERID_HINT 0123456789ABCDEF Alice <alice@example.com>",
        "[GNUPG:] NEED_PASSPHRASE 0123456789ABCDEF 0123456789ABCDEF 1 0",
        "[GNUPG:] GET_HIDDEN passphrase.enter",
        "[GNUPG:] GOOD_PASSPHRASE",
        SIGNATURE,
    ]);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_passphrase_cb(move |hint: Option<&str>, info: Option<&str>, bad: bool| {
        sink.borrow_mut().push((hint.map(str::to_owned), info.map(str::to_owned), bad));
        Ok(Some("correct horse".to_owned()))
    });

    ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();

    assert_eq!(backend.answers(), vec!["correct horse"]);
    assert_eq!(*seen.borrow(), vec![(
        Some("0123456789ABCDEF Alice <alice@example.com>".to_owned()),
        Some("0123456789ABCDEF 0123456789ABCDEF 1 0".to_owned()),
        false,
    )]);
    assert_eq!(ctx.sign_result().unwrap().signatures.len(), 1);
}

#[test]
fn test_repeated_bad_passphrase_fails() {
    let backend = MockBackend::new(&[
        "[GNUPG:] GET_HIDDEN passphrase.enter",
        "[GNUPG:] BAD_PASSPHRASE 0123456789ABCDEF",
        "[GNUPG:] GET_HIDDEN passphrase.enter",
        "[GNUPG:] BAD_PASSPHRASE 0123456789ABCDEF",
    ]);

    let flags = Rc::new(RefCell::new(Vec::new()));
    let sink = flags.clone();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_passphrase_cb(move |_: Option<&str>, _: Option<&str>, bad: bool| {
        sink.borrow_mut().push(bad);
        Ok(Some("wrong".to_owned()))
    });

    let err = ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadPassphrase);
    assert_eq!(*flags.borrow(), vec![false, true]);
}

#[test]
fn test_unanswered_request_gets_empty_line() {
    let backend = MockBackend::new(&["[GNUPG:] GET_LINE sign_uid.class", SIGNATURE]);

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_passphrase_cb(|_: Option<&str>, _: Option<&str>, _: bool| Ok(Some("unused".to_owned())));

    ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();
    assert_eq!(backend.answers(), vec![""]);
}

#[test]
fn test_progress_reaches_callback() {
    let backend = MockBackend::new(&[
        "[GNUPG:] PROGRESS primegen + 1 10",
        "[GNUPG:] PROGRESS garbage",
        "[GNUPG:] PROGRESS primegen + 10 10",
        SIGNATURE,
    ]);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_progress_cb(move |what: &str, kind: char, current: u64, total: u64| {
        sink.borrow_mut().push((what.to_owned(), kind, current, total));
    });

    ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();

    assert_eq!(*seen.borrow(), vec![
        ("primegen".to_owned(), '+', 1, 10),
        ("primegen".to_owned(), '+', 10, 10),
    ]);
}
