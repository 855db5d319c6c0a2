//! 用户记录存储 trait

use async_trait::async_trait;
use authgate_errors::AppResult;

use crate::domain::user::UserRecord;

/// 只读作用域，在一次会话解析期间提供一致的用户快照
#[async_trait]
pub trait UserReadScope: Send {
    async fn get_auth(&mut self, user_id: &str) -> AppResult<Option<UserRecord>>;

    /// 结束作用域
    async fn finish(self: Box<Self>) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 开启只读作用域
    async fn begin_read_only(&self) -> AppResult<Box<dyn UserReadScope>>;
}
