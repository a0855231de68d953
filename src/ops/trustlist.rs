use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::{Context, OpDataKind, OpDataRegistry};
use crate::engine::{StatusCode, StatusHandler, ColonLineHandler};
use crate::error::{Error, ErrorKind, Result};
use crate::io::{LoopStrategy, ResetMode};
use super::args::parse_long;


/// Length of a long key id.
const KEYID_LEN: usize = 16;


/// What a trust item describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustItemType {
    Key,
    UserId,
}


/// One entry of a trust path listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustItem {
    pub level: i32,
    pub keyid: Option<String>,
    pub item_type: Option<TrustItemType>,
    pub owner_trust: Option<char>,
    pub validity: Option<char>,
    pub name: Option<String>,
}


#[derive(Default)]
struct TrustlistOpData {
    /// Items parsed but not yet handed out
    queue: VecDeque<TrustItem>,
}


/// Parses one colon-delimited trust line.
fn parse_trust_item(line: &str) -> TrustItem {
    let mut item = TrustItem::default();

    for (index, field) in line.split(':').enumerate() {
        match index + 1 {
            1 => item.level = parse_long(field)
                .and_then(|(level, _)| i32::try_from(level).ok())
                .unwrap_or(0),

            2 if field.len() == KEYID_LEN => item.keyid = Some(field.to_owned()),

            3 => item.item_type = match field.chars().next() {
                Some('K') => Some(TrustItemType::Key),
                Some('U') => Some(TrustItemType::UserId),
                _ => None,
            },

            5 => item.owner_trust = field.chars().next(),
            6 => item.validity = field.chars().next(),
            9 => item.name = Some(field.to_owned()),
            _ => {}
        }
    }

    item
}


fn colon_handler(op_data: Rc<RefCell<OpDataRegistry>>) -> ColonLineHandler {
    Box::new(move |line: Option<&str>| {
        let Some(line) = line else {
            return Ok(());
        };

        let item = parse_trust_item(line);
        let mut registry = op_data.borrow_mut();
        let data = registry.lookup_or_create::<TrustlistOpData>(OpDataKind::Trustlist, None)?;

        data.queue.try_reserve(1)?;
        data.queue.push_back(item);
        Ok(())
    })
}


fn status_handler() -> StatusHandler {
    Box::new(|_: StatusCode, _: &str| Ok(()))
}


impl Context {
    /// Starts listing the trust path of keys matching a pattern.
    ///
    /// Items are fetched with [`Context::trustlist_next`].
    ///
    /// * `pattern` - key specification
    /// * `max_level` - maximal depth, must not be negative
    pub fn trustlist_start(&mut self, pattern: &str, max_level: i32) -> Result<()> {
        let started = self.trustlist_begin(pattern, max_level);
        self.launch(started)
    }

    fn trustlist_begin(&mut self, pattern: &str, max_level: i32) -> Result<()> {
        self.reset(ResetMode::AsynchronousPrivate)?;

        if pattern.is_empty() || max_level < 0 {
            return Err(Error::invalid_value("Trust list needs a pattern and a level"));
        }

        self.op_data()
            .borrow_mut()
            .lookup_or_create::<TrustlistOpData>(OpDataKind::Trustlist, None)?;

        let handler = colon_handler(self.op_data());
        self.engine_mut()?
            .set_colon_line_handler(handler)?;

        self.install_status_chain(status_handler(), false)?;
        self.engine_mut()?
            .trustlist(pattern)
    }

    /// Returns the next trust item.
    ///
    /// Fails with `Eof` once the listing has finished and every item was
    /// returned. Under the caller's event loop nothing is driven here, so
    /// `InvalidValue` means the caller has to run its loop first.
    pub fn trustlist_next(&mut self) -> Result<TrustItem> {
        loop {
            let item = self.op_data()
                .borrow_mut()
                .lookup::<TrustlistOpData>(OpDataKind::Trustlist)
                .ok_or_else(|| Error::invalid_value("No trust list in progress"))?
                .queue
                .pop_front();

            if let Some(item) = item {
                return Ok(item);
            }

            let op_loop = self.op_loop()?;
            if let Some(outcome) = op_loop.completion().outcome() {
                self.observe_completion(&outcome);
                outcome?;

                return Err(Error::new(ErrorKind::Eof, "No more trust items"));
            }

            if op_loop.strategy() == LoopStrategy::User {
                return Err(Error::invalid_value("Trust list is driven by the caller's event loop"));
            }

            op_loop.step(true)?;
        }
    }

    /// Finishes a trust listing, dropping items not fetched yet.
    pub fn trustlist_end(&mut self) -> Result<()> {
        self.op_data()
            .borrow_mut()
            .lookup::<TrustlistOpData>(OpDataKind::Trustlist)
            .ok_or_else(|| Error::invalid_value("No trust list in progress"))?
            .queue
            .clear();

        Ok(())
    }
}
