use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{StatusCode, StatusHandler};
use super::args::parse_long;


/// Callback receiving progress: what, type character, current and total amount.
pub type ProgressCallback = Box<dyn FnMut(&str, char, u64, u64)>;


/// Parses `PROGRESS` arguments, `None` for malformed lines.
fn parse_progress(args: &str) -> Option<(&str, char, u64, u64)> {
    let mut fields = args.split(' ').filter(|f| !f.is_empty());

    let what = fields.next()?;
    let kind = fields.next()?.chars().next()?;
    let current = parse_long(fields.next()?).and_then(|(value, _)| u64::try_from(value).ok())?;
    let total = parse_long(fields.next()?).and_then(|(value, _)| u64::try_from(value).ok())?;

    Some((what, kind, current, total))
}


/// Creates the handler forwarding progress lines to the callback.
///
/// Progress never fails an operation, malformed lines are dropped.
///
/// * `callback` - progress callback of the context
pub(crate) fn status_handler(callback: Option<Rc<RefCell<ProgressCallback>>>) -> StatusHandler {
    Box::new(move |code: StatusCode, args: &str| {
        if code != StatusCode::Progress {
            return Ok(());
        }

        let Some(callback) = &callback else {
            return Ok(());
        };

        match parse_progress(args) {
            Some((what, kind, current, total)) => {
                if let Ok(mut callback) = callback.try_borrow_mut() {
                    callback(what, kind, current, total);
                }
            }

            None => tracing::trace!(args, "ignoring malformed progress line"),
        }

        Ok(())
    })
}
