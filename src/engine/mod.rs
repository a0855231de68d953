mod backend;
mod engine;
mod status;
mod table;
mod version;
mod pipe;
mod gpg_engine;
mod gpgsm_engine;

pub use self::backend::{Backend, BackendHandle, Protocol, SigMode, SignOptions};
pub use self::engine::Engine;
pub use self::status::{
    STATUS_PREFIX, StatusCode, StatusChain, StatusHandler, CommandHandler, ColonLineHandler, parse_status_line
};
pub use self::table::{BackendTable, EngineInfo, EngineInfoCache, check_version, get_engine_info};
pub use self::gpg_engine::GpgBackend;
pub use self::gpgsm_engine::GpgsmBackend;
