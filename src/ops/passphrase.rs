use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{OpDataKind, OpDataRegistry};
use crate::engine::{StatusCode, StatusHandler, CommandHandler};
use crate::error::{Error, ErrorKind, Result};


/// Callback supplying passphrases.
///
/// Receives the user id hint, passphrase information and whether the
/// previous attempt was bad. `Ok(None)` means no answer.
pub type PassphraseCallback = Box<dyn FnMut(Option<&str>, Option<&str>, bool) -> Result<Option<String>>>;


/// Keyword of the passphrase prompt.
const PASSPHRASE_ENTER: &str = "passphrase.enter";


/// Passphrase state of one operation.
#[derive(Default)]
pub(crate) struct PassphraseOpData {
    uid_hint: Option<String>,
    info: Option<String>,

    /// Number of bad attempts since the last good one
    bad: u32,
    missing: bool,
}


fn wipe(data: &mut PassphraseOpData) {
    data.uid_hint = None;
    data.info = None;
}


/// Creates the handler tracking passphrase related status lines.
///
/// * `op_data` - operation data of the context
pub(crate) fn status_handler(op_data: Rc<RefCell<OpDataRegistry>>) -> Result<StatusHandler> {
    op_data
        .borrow_mut()
        .lookup_or_create::<PassphraseOpData>(OpDataKind::Passphrase, Some(wipe))?;

    Ok(Box::new(move |code: StatusCode, args: &str| {
        let mut registry = op_data.borrow_mut();
        let data = registry.lookup_or_create::<PassphraseOpData>(OpDataKind::Passphrase, Some(wipe))?;

        match code {
            StatusCode::UseridHint => data.uid_hint = Some(args.to_owned()),

            StatusCode::BadPassphrase => {
                data.bad += 1;
                data.missing = false;
            }

            StatusCode::GoodPassphrase => {
                data.bad = 0;
                data.missing = false;
            }

            StatusCode::NeedPassphrase | StatusCode::NeedPassphraseSym => data.info = Some(args.to_owned()),
            StatusCode::MissingPassphrase => data.missing = true,

            StatusCode::Eof if data.bad > 0 || data.missing => {
                return Err(Error::new(ErrorKind::BadPassphrase, "Passphrase was bad or missing"));
            }

            _ => {}
        }

        Ok(())
    }))
}


/// Asks the passphrase callback to answer a command request.
///
/// Returns `None` for requests that are not passphrase prompts and when
/// the callback declines.
///
/// * `op_data` - operation data of the context
/// * `callback` - passphrase callback
/// * `code` - request code
/// * `args` - request keyword
pub(crate) fn answer(op_data: &Rc<RefCell<OpDataRegistry>>, callback: &Rc<RefCell<PassphraseCallback>>,
    code: StatusCode, args: &str) -> Result<Option<String>>
{
    if code != StatusCode::GetHidden || args.trim() != PASSPHRASE_ENTER {
        return Ok(None);
    }

    let (uid_hint, info, bad) = {
        let mut registry = op_data.borrow_mut();
        let data = registry.lookup_or_create::<PassphraseOpData>(OpDataKind::Passphrase, Some(wipe))?;
        (data.uid_hint.clone(), data.info.clone(), data.bad > 0)
    };

    tracing::debug!(uid_hint = uid_hint.as_deref(), previous_bad = bad, "asking for passphrase");

    let mut callback = callback
        .try_borrow_mut()
        .map_err(|_| Error::invalid_value("Passphrase callback is already running"))?;

    callback(uid_hint.as_deref(), info.as_deref(), bad)
}


/// Creates the command handler answering passphrase prompts.
///
/// * `op_data` - operation data of the context
/// * `callback` - passphrase callback
pub(crate) fn command_handler(op_data: Rc<RefCell<OpDataRegistry>>, callback: Rc<RefCell<PassphraseCallback>>)
    -> CommandHandler
{
    Box::new(move |code: StatusCode, args: &str| answer(&op_data, &callback, code, args))
}
