//! 持久化实现

mod memory;
mod postgres_user_store;
mod redis_access_event_store;
mod redis_session_store;

pub use memory::*;
pub use postgres_user_store::*;
pub use redis_access_event_store::*;
pub use redis_session_store::RedisSessionStore;
