//! HTTP 会话解析

pub mod cookie;
pub mod middleware;
pub mod outcome;
pub mod refresh_handler;
pub mod resolve_handler;
pub mod resolver;

pub use cookie::*;
pub use middleware::*;
pub use outcome::*;
pub use refresh_handler::*;
pub use resolve_handler::*;
pub use resolver::*;
