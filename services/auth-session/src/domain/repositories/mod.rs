//! 仓储接口

mod access_event_store;
mod client_registry;
mod session_store;
mod user_store;

pub use access_event_store::*;
pub use client_registry::*;
pub use session_store::*;
pub use user_store::*;
