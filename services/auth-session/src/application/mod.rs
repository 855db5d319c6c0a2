//! 应用层

pub mod request_context;
pub mod session_provider;

pub use request_context::*;
pub use session_provider::*;
