//! 领域层

pub mod access_event;
pub mod expiry;
pub mod repositories;
pub mod session;
pub mod token;
pub mod user;

pub use access_event::*;
pub use session::*;
pub use user::*;
