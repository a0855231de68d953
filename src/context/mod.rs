mod context;
mod op_data;

pub use self::context::{Context, ContextId};
pub use self::op_data::{OpDataKind, OpDataRegistry};
