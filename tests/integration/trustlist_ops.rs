//! Trust path listings delivered item by item

use std::rc::Rc;

use libgpgctx::io::IoCallbacks;
use libgpgctx::ops::TrustItemType;
use libgpgctx::{Context, ErrorKind};

use super::test_utils::{MockBackend, RecordingLoop};

const LISTING: [&str; 2] = [
    "[COLON] 0:0123456789ABCDEF:K::f:u:::Alice <alice@example.com>",
    "[COLON] 1:FEDCBA9876543210:U::m:f:::Bob <bob@example.com>",
];

#[test]
fn test_items_are_returned_in_order_then_eof() {
    let backend = MockBackend::new(&LISTING);
    let mut ctx = Context::with_backends(backend.table());

    ctx.trustlist_start("alice", 1).unwrap();

    let first = ctx.trustlist_next().unwrap();
    assert_eq!(first.level, 0);
    assert_eq!(first.keyid.as_deref(), Some("0123456789ABCDEF"));
    assert_eq!(first.item_type, Some(TrustItemType::Key));
    assert_eq!(first.owner_trust, Some('f'));
    assert_eq!(first.validity, Some('u'));
    assert_eq!(first.name.as_deref(), Some("Alice <alice@example.com>"));

    let second = ctx.trustlist_next().unwrap();
    assert_eq!(second.level, 1);
    assert_eq!(second.item_type, Some(TrustItemType::UserId));

    assert_eq!(ctx.trustlist_next().unwrap_err().kind(), ErrorKind::Eof);
    assert_eq!(ctx.trustlist_next().unwrap_err().kind(), ErrorKind::Eof);
    ctx.trustlist_end().unwrap();

    assert_eq!(backend.calls(), vec!["trustlist alice"]);
}

#[test]
fn test_invalid_arguments_are_rejected() {
    let backend = MockBackend::new(&LISTING);
    let mut ctx = Context::with_backends(backend.table());

    assert_eq!(ctx.trustlist_start("", 1).unwrap_err().kind(), ErrorKind::InvalidValue);
    assert_eq!(ctx.trustlist_start("alice", -1).unwrap_err().kind(), ErrorKind::InvalidValue);
    assert!(backend.calls().is_empty());
}

#[test]
fn test_next_without_listing_is_invalid() {
    let mut ctx = Context::with_backends(MockBackend::new(&[]).table());

    assert_eq!(ctx.trustlist_next().unwrap_err().kind(), ErrorKind::InvalidValue);
    assert_eq!(ctx.trustlist_end().unwrap_err().kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_end_drops_remaining_items() {
    let backend = MockBackend::new(&LISTING);
    let mut ctx = Context::with_backends(backend.table());

    ctx.trustlist_start("alice", 1).unwrap();
    assert_eq!(ctx.trustlist_next().unwrap().level, 0);

    ctx.trustlist_end().unwrap();
    assert_eq!(ctx.trustlist_next().unwrap_err().kind(), ErrorKind::Eof);
}

#[test]
fn test_caller_loop_must_run_before_items_appear() {
    let backend = MockBackend::new(&LISTING);
    let event_loop = RecordingLoop::new();

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_io_callbacks(Some(event_loop.clone() as Rc<dyn IoCallbacks>));
    ctx.trustlist_start("alice", 1).unwrap();

    assert_eq!(ctx.trustlist_next().unwrap_err().kind(), ErrorKind::InvalidValue);

    event_loop.run();

    assert_eq!(ctx.trustlist_next().unwrap().level, 0);
    assert_eq!(ctx.trustlist_next().unwrap().level, 1);
    assert_eq!(ctx.trustlist_next().unwrap_err().kind(), ErrorKind::Eof);
}
