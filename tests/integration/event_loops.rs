//! Operations completing on the shared loop and on a caller's loop

use std::rc::Rc;
use std::sync::Arc;

use libgpgctx::engine::{BackendTable, Protocol};
use libgpgctx::io::{IoCallbacks, LoopStrategy};
use libgpgctx::{global_wait, Context, Data, ErrorKind, SigMode};

use super::test_utils::{MinimalBackend, MockBackend, RecordingLoop, MOCK_OUTPUT};

const SIGNATURE: &str = "[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF";

#[test]
fn test_async_sign_completes_on_shared_loop() {
    let backend = MockBackend::new(&[SIGNATURE]);
    let mut ctx = Context::with_backends(backend.table());

    let sig = Data::new();
    ctx.sign_start(&Data::from("hello"), &sig, SigMode::Normal).unwrap();
    assert_eq!(ctx.loop_strategy(), Some(LoopStrategy::Global));
    assert!(ctx.sign_result().is_none());

    let (id, outcome) = global_wait(true).unwrap().unwrap();
    assert_eq!(id, ctx.id());
    assert!(outcome.is_ok());

    assert!(ctx.is_finished());
    assert_eq!(sig.to_vec(), MOCK_OUTPUT);
    assert_eq!(ctx.sign_result().unwrap().signatures.len(), 1);

    // Nothing else is in flight on this thread
    assert!(global_wait(false).unwrap().is_none());
}

#[test]
fn test_shared_loop_reports_every_context() {
    let good = MockBackend::new(&[SIGNATURE]);
    let bad = MockBackend::new(&["[GNUPG:] INV_RECP 1 nobody"]);

    let mut first = Context::with_backends(good.table());
    let mut second = Context::with_backends(bad.table());

    first.sign_start(&Data::from("one"), &Data::new(), SigMode::Normal).unwrap();
    second.sign_start(&Data::from("two"), &Data::new(), SigMode::Normal).unwrap();

    let mut finished = Vec::new();
    while let Some((id, outcome)) = global_wait(true).unwrap() {
        finished.push((id, outcome.map_err(|err| err.kind())));
    }

    finished.sort_by_key(|(id, _)| id.get());
    assert_eq!(finished, vec![
        (first.id(), Ok(())),
        (second.id(), Err(ErrorKind::InvalidUserID)),
    ]);
}

#[test]
fn test_caller_loop_drives_operation() {
    let backend = MockBackend::new(&[SIGNATURE]);
    let event_loop = RecordingLoop::new();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_io_callbacks(Some(event_loop.clone() as Rc<dyn IoCallbacks>));

    ctx.sign_start(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();
    assert_eq!(ctx.loop_strategy(), Some(LoopStrategy::User));
    assert_eq!(event_loop.registered(), 1);
    assert_eq!(event_loop.events(), vec!["start"]);

    assert!(ctx.wait(false).unwrap().is_none());
    assert!(!ctx.is_finished());

    event_loop.run();

    assert_eq!(event_loop.registered(), 0);
    assert_eq!(event_loop.events(), vec!["start", "done"]);
    assert!(ctx.wait(false).unwrap().unwrap().is_ok());
    assert_eq!(ctx.sign_result().unwrap().signatures.len(), 1);
}

#[test]
fn test_caller_loop_sees_failures() {
    let backend = MockBackend::new(&["[GNUPG:] INV_RECP 1 nobody"]);
    let event_loop = RecordingLoop::new();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_io_callbacks(Some(event_loop.clone() as Rc<dyn IoCallbacks>));

    ctx.sign_start(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();
    event_loop.run();

    assert_eq!(event_loop.events(), vec!["start", "done InvalidUserID"]);
    assert_eq!(ctx.wait(false).unwrap().unwrap().unwrap_err().kind(), ErrorKind::InvalidUserID);
}

#[test]
fn test_blocking_call_ignores_caller_loop() {
    let backend = MockBackend::new(&[SIGNATURE]);
    let event_loop = RecordingLoop::new();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_io_callbacks(Some(event_loop.clone() as Rc<dyn IoCallbacks>));

    ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();

    assert_eq!(ctx.loop_strategy(), Some(LoopStrategy::Private));
    assert!(event_loop.events().is_empty());
}

#[test]
fn test_wait_without_operation_is_invalid() {
    let mut ctx = Context::with_backends(MockBackend::new(&[]).table());
    assert_eq!(ctx.wait(true).unwrap_err().kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_failed_start_is_not_reported_on_shared_loop() {
    let backend = MockBackend::new(&[SIGNATURE]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.sign_start(&Data::new(), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);

    assert!(global_wait(true).unwrap().is_none());
    assert!(!ctx.is_finished());
    assert!(ctx.sign_result().is_none());
    assert_eq!(ctx.wait(true).unwrap_err().kind(), ErrorKind::InvalidValue);
    assert!(backend.calls().is_empty());

    // The context recovers on the next operation
    ctx.sign_start(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap();
    let (id, outcome) = global_wait(true).unwrap().unwrap();
    assert_eq!(id, ctx.id());
    assert!(outcome.is_ok());
}

#[test]
fn test_backend_refusal_is_not_reported_on_shared_loop() {
    let table = BackendTable::empty().with_backend(Protocol::OpenPgp, Arc::new(MinimalBackend));
    let mut ctx = Context::with_backends(Arc::new(table));

    let err = ctx.sign_start(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);

    assert!(global_wait(false).unwrap().is_none());
    assert!(global_wait(true).unwrap().is_none());
    assert!(!ctx.is_finished());
}

#[test]
fn test_failed_start_is_not_reported_on_private_loop() {
    let backend = MockBackend::new(&[]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.trustlist_start("", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);

    assert_eq!(ctx.wait(true).unwrap_err().kind(), ErrorKind::InvalidValue);
    assert_eq!(ctx.wait(false).unwrap_err().kind(), ErrorKind::InvalidValue);
    assert!(!ctx.is_finished());
    assert!(ctx.loop_strategy().is_none());
}

#[test]
fn test_failed_start_leaves_caller_loop_untouched() {
    let backend = MockBackend::new(&[SIGNATURE]);
    let event_loop = RecordingLoop::new();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_io_callbacks(Some(event_loop.clone() as Rc<dyn IoCallbacks>));

    let err = ctx.sign_start(&Data::new(), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);

    assert_eq!(event_loop.registered(), 0);
    assert!(event_loop.events().is_empty());
    assert!(!ctx.is_finished());
}
