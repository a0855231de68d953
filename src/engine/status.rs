use crate::error::Result;


/// Prefix of every status line emitted on the status descriptor.
pub const STATUS_PREFIX: &str = "[GNUPG:] ";


macro_rules! status_codes {
    ( $( $variant:ident => $keyword:literal ),+ $(,)? ) => {
        /// Status codes emitted by the backend.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            $( $variant, )+
        }

        impl StatusCode {
            /// Looks a keyword up, unknown keywords yield `None`.
            ///
            /// * `keyword` - code as written on the status line
            pub fn from_keyword(keyword: &str) -> Option<Self> {
                match keyword {
                    $( $keyword => Some(StatusCode::$variant), )+
                    _ => None,
                }
            }

            /// Keyword as written on the status line.
            pub fn keyword(&self) -> &'static str {
                match self {
                    $( StatusCode::$variant => $keyword, )+
                }
            }
        }
    };
}


status_codes! {
    Eof => "EOF",
    Enter => "ENTER",
    Leave => "LEAVE",
    Abort => "ABORT",
    GoodSig => "GOODSIG",
    BadSig => "BADSIG",
    ErrSig => "ERRSIG",
    BadArmor => "BADARMOR",
    RsaOrIdea => "RSA_OR_IDEA",
    KeyExpired => "KEYEXPIRED",
    KeyRevoked => "KEYREVOKED",
    TrustUndefined => "TRUST_UNDEFINED",
    TrustNever => "TRUST_NEVER",
    TrustMarginal => "TRUST_MARGINAL",
    TrustFully => "TRUST_FULLY",
    TrustUltimate => "TRUST_ULTIMATE",
    NeedPassphrase => "NEED_PASSPHRASE",
    ValidSig => "VALIDSIG",
    SigId => "SIG_ID",
    EncTo => "ENC_TO",
    NoData => "NODATA",
    BadPassphrase => "BAD_PASSPHRASE",
    NoPubkey => "NO_PUBKEY",
    NoSeckey => "NO_SECKEY",
    NeedPassphraseSym => "NEED_PASSPHRASE_SYM",
    DecryptionFailed => "DECRYPTION_FAILED",
    DecryptionOkay => "DECRYPTION_OKAY",
    MissingPassphrase => "MISSING_PASSPHRASE",
    GoodPassphrase => "GOOD_PASSPHRASE",
    GoodMdc => "GOODMDC",
    BadMdc => "BADMDC",
    ErrMdc => "ERRMDC",
    Imported => "IMPORTED",
    ImportOk => "IMPORT_OK",
    ImportProblem => "IMPORT_PROBLEM",
    ImportRes => "IMPORT_RES",
    FileStart => "FILE_START",
    FileDone => "FILE_DONE",
    FileError => "FILE_ERROR",
    BeginDecryption => "BEGIN_DECRYPTION",
    EndDecryption => "END_DECRYPTION",
    BeginEncryption => "BEGIN_ENCRYPTION",
    EndEncryption => "END_ENCRYPTION",
    DeleteProblem => "DELETE_PROBLEM",
    GetBool => "GET_BOOL",
    GetLine => "GET_LINE",
    GetHidden => "GET_HIDDEN",
    GotIt => "GOT_IT",
    Progress => "PROGRESS",
    SigCreated => "SIG_CREATED",
    SessionKey => "SESSION_KEY",
    NotationName => "NOTATION_NAME",
    NotationData => "NOTATION_DATA",
    PolicyUrl => "POLICY_URL",
    BeginStream => "BEGIN_STREAM",
    EndStream => "END_STREAM",
    KeyCreated => "KEY_CREATED",
    UseridHint => "USERID_HINT",
    Unexpected => "UNEXPECTED",
    InvRecp => "INV_RECP",
    NoRecp => "NO_RECP",
    AlreadySigned => "ALREADY_SIGNED",
    SigExpired => "SIGEXPIRED",
    ExpSig => "EXPSIG",
    ExpKeySig => "EXPKEYSIG",
    Truncated => "TRUNCATED",
    Error => "ERROR",
    NewSig => "NEWSIG",
    RevKeySig => "REVKEYSIG",
}


impl StatusCode {
    /// Check if the code asks for an answer on the command channel.
    pub fn is_command_request(&self) -> bool {
        matches!(self, StatusCode::GetBool | StatusCode::GetLine | StatusCode::GetHidden)
    }
}


impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}


/// Splits one line of the status stream into code and arguments.
///
/// Returns `None` for lines without the status prefix and for unknown codes.
///
/// * `line` - line without the trailing newline
pub fn parse_status_line(line: &str) -> Option<(StatusCode, &str)> {
    let rest = line.strip_prefix(STATUS_PREFIX)?;
    let rest = rest.trim_end_matches('\r');

    let (keyword, args) = match rest.find(' ') {
        Some(index) => (&rest[..index], rest[index + 1..].trim_start_matches(' ')),
        None => (rest, ""),
    };

    match StatusCode::from_keyword(keyword) {
        Some(code) => Some((code, args)),
        None => {
            tracing::trace!(keyword, "ignoring unknown status code");
            None
        }
    }
}


/// Handler receiving status lines in emission order.
pub type StatusHandler = Box<dyn FnMut(StatusCode, &str) -> Result<()>>;

/// Handler answering command requests.
///
/// `Ok(None)` means the handler has no answer.
pub type CommandHandler = Box<dyn FnMut(StatusCode, &str) -> Result<Option<String>>>;

/// Handler receiving colon-delimited listing lines, `None` marks the end.
pub type ColonLineHandler = Box<dyn FnMut(Option<&str>) -> Result<()>>;


/// Ordered list of status handlers.
///
/// Every status line is offered to each handler in order; the first error
/// stops the chain and becomes the handler's result.
#[derive(Default)]
pub struct StatusChain {
    handlers: Vec<StatusHandler>
}


impl StatusChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        StatusChain::default()
    }

    /// Appends a handler to the end of the chain.
    ///
    /// * `handler` - handler to append
    pub fn with(mut self, handler: StatusHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Offers a status line to the handlers.
    ///
    /// * `code` - status code
    /// * `args` - arguments of the status line
    pub fn handle(&mut self, code: StatusCode, args: &str) -> Result<()> {
        for handler in self.handlers.iter_mut() {
            handler(code, args)?;
        }

        Ok(())
    }

    /// Turns the chain into a single handler.
    pub fn into_handler(mut self) -> StatusHandler {
        Box::new(move |code, args| self.handle(code, args))
    }
}
