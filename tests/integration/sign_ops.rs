//! Signing, encryption, decryption and deletion through a scripted backend

use libgpgctx::engine::Protocol;
use libgpgctx::ops::InvalidReason;
use libgpgctx::{Context, Data, ErrorKind, KeyId, SigMode};
use libgpgctx::io::LoopStrategy;

use super::test_utils::{MockBackend, MOCK_OUTPUT};

#[test]
fn test_sign_collects_signatures_in_order() {
    let backend = MockBackend::new(&[
        "[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF0123456789ABCDEF01234567",
        "[GNUPG:] SIG_CREATED D 17 2 01 1234567891 FEDCBA9876543210FEDCBA9876543210FEDCBA98",
    ]);

    let mut ctx = Context::with_backends(backend.table());
    ctx.set_armor(true);
    ctx.add_signer(KeyId::new("alice@example.com"));

    let plain = Data::from("hello");
    let sig = Data::new();
    ctx.sign(&plain, &sig, SigMode::Normal).unwrap();

    assert_eq!(ctx.loop_strategy(), Some(LoopStrategy::Private));
    assert_eq!(sig.to_vec(), MOCK_OUTPUT);
    assert_eq!(backend.calls(), vec!["sign Normal armor=true textmode=false signers=[alice@example.com]"]);

    let result = ctx.sign_result().unwrap();
    assert!(result.invalid_signers.is_empty());
    assert_eq!(result.signatures.len(), 2);

    assert_eq!(result.signatures[0].mode, SigMode::Normal);
    assert_eq!(result.signatures[0].hash_algo, 8);
    assert_eq!(result.signatures[0].timestamp, 1234567890);
    assert_eq!(result.signatures[1].mode, SigMode::Detach);
    assert_eq!(result.signatures[1].pubkey_algo, 17);
    assert_eq!(result.signatures[1].sig_class, 1);
    assert_eq!(result.signatures[1].fingerprint, "FEDCBA9876543210FEDCBA9876543210FEDCBA98");
}

#[test]
fn test_rejected_signer_fails_with_invalid_user_id() {
    let backend = MockBackend::new(&["[GNUPG:] INV_RECP 9 bob@example.com"]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Detach).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUserID);

    let result = ctx.sign_result().unwrap();
    assert_eq!(result.invalid_signers.len(), 1);
    assert_eq!(result.invalid_signers[0].reason, InvalidReason::NoSecretKey);
    assert_eq!(result.invalid_signers[0].id.as_deref(), Some("bob@example.com"));
}

#[test]
fn test_unknown_signature_tag_is_general_error() {
    let backend = MockBackend::new(&[
        "[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF",
        "[GNUPG:] SIG_CREATED Q 1 8 00 1234567890 0123456789ABCDEF",
        "[GNUPG:] SIG_CREATED C 1 8 00 1234567890 0123456789ABCDEF",
    ]);

    let mut ctx = Context::with_backends(backend.table());
    let err = ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeneralError);

    // Lines after the failure are not interpreted
    let result = ctx.sign_result().unwrap();
    assert_eq!(result.signatures.len(), 1);
}

#[test]
fn test_empty_input_is_rejected_before_backend_runs() {
    let backend = MockBackend::new(&[]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.sign(&Data::new(), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);
    assert!(backend.calls().is_empty());
}

#[test]
fn test_results_belong_to_last_operation() {
    let backend = MockBackend::new(&["[GNUPG:] SIG_CREATED S 1 8 00 1234567890 0123456789ABCDEF"]);
    let mut ctx = Context::with_backends(backend.table());

    ctx.sign(&Data::from("one"), &Data::new(), SigMode::Normal).unwrap();
    assert!(ctx.sign_result().is_some());

    ctx.delete(&KeyId::new("0123456789ABCDEF"), false).unwrap();
    assert!(ctx.sign_result().is_none());

    ctx.sign(&Data::from("two"), &Data::new(), SigMode::Normal).unwrap();
    assert_eq!(ctx.sign_result().unwrap().signatures.len(), 1);
}

#[test]
fn test_encrypt_reports_rejected_recipients() {
    let backend = MockBackend::new(&[
        "[GNUPG:] INV_RECP 1 carol@example.com",
        "[GNUPG:] NO_RECP 0",
    ]);

    let mut ctx = Context::with_backends(backend.table());
    let cipher = Data::new();
    let err = ctx.encrypt(&[KeyId::new("carol@example.com")], &Data::from("hello"), &cipher).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidUserID);
    assert_eq!(backend.calls(), vec!["encrypt [carol@example.com] armor=false"]);

    let result = ctx.encrypt_result().unwrap();
    assert_eq!(result.invalid_recipients.len(), 1);
    assert_eq!(result.invalid_recipients[0].reason, InvalidReason::NotFound);
}

#[test]
fn test_encrypt_without_usable_recipients() {
    let backend = MockBackend::new(&["[GNUPG:] NO_RECP 0"]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.encrypt(&[KeyId::new("dave")], &Data::from("hello"), &Data::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoRecipients);
}

#[test]
fn test_decrypt_success_and_failure() {
    let good = MockBackend::new(&["[GNUPG:] BEGIN_DECRYPTION", "[GNUPG:] DECRYPTION_OKAY", "[GNUPG:] END_DECRYPTION"]);
    let mut ctx = Context::with_backends(good.table());
    let plain = Data::new();
    ctx.decrypt(&Data::from("cipher"), &plain).unwrap();
    assert_eq!(plain.to_vec(), MOCK_OUTPUT);
    assert_eq!(ctx.decrypt_result().unwrap().unsupported_algorithm, None);

    let bad = MockBackend::new(&[
        "[GNUPG:] ERROR decrypt.algorithm 65658 IDEA",
        "[GNUPG:] DECRYPTION_FAILED",
    ]);

    let mut ctx = Context::with_backends(bad.table());
    let err = ctx.decrypt(&Data::from("cipher"), &Data::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    assert_eq!(ctx.decrypt_result().unwrap().unsupported_algorithm.as_deref(), Some("IDEA"));
}

#[test]
fn test_decrypt_without_okay_is_no_data() {
    let backend = MockBackend::new(&[]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.decrypt(&Data::from("not encrypted"), &Data::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);
}

#[test]
fn test_delete_problems_are_mapped() {
    let backend = MockBackend::new(&["[GNUPG:] DELETE_PROBLEM 2"]);
    let mut ctx = Context::with_backends(backend.table());

    let err = ctx.delete(&KeyId::new("0123456789ABCDEF"), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(backend.calls(), vec!["delete 0123456789ABCDEF secret=false"]);

    let err = ctx.delete(&KeyId::new("  "), true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(backend.calls().len(), 1);
}

#[test]
fn test_cms_protocol_without_backend_is_invalid_engine() {
    let backend = MockBackend::new(&[]);
    let mut ctx = Context::with_backends(backend.table());
    ctx.set_protocol(Protocol::Cms);

    let err = ctx.sign(&Data::from("hello"), &Data::new(), SigMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEngine);
    assert!(backend.calls().is_empty());
}
