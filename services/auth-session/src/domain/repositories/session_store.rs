//! 会话存储 trait

use std::time::Duration;

use async_trait::async_trait;
use authgate_errors::AppResult;

use crate::domain::session::{Session, SessionId};

/// 写入时的存储过期设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreExpiry {
    /// 在指定时长后过期
    After(Duration),
    /// 永不过期
    Persist,
    /// 保留现有 TTL
    Keep,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 创建会话记录，并加入用户索引
    async fn create(&self, session: &Session, expiry: StoreExpiry) -> AppResult<()>;

    /// 覆盖已存在的会话记录；记录不存在时返回 false
    async fn update(&self, session: &Session, expiry: StoreExpiry) -> AppResult<bool>;

    /// 根据 ID 查找会话
    async fn get(&self, id: &SessionId) -> AppResult<Option<Session>>;

    /// 删除会话；记录不存在时返回 false
    async fn delete(&self, id: &SessionId) -> AppResult<bool>;

    /// 获取用户的所有会话（未经过期过滤）
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Session>>;
}
