//! 访问事件存储 trait

use async_trait::async_trait;
use authgate_errors::AppResult;

use super::StoreExpiry;
use crate::domain::access_event::AccessEvent;
use crate::domain::session::SessionId;

/// 每个会话保留的最近访问事件数量
pub const ACCESS_EVENT_HISTORY_LIMIT: usize = 100;

#[async_trait]
pub trait AccessEventStore: Send + Sync {
    /// 追加一条访问事件，超出上限时丢弃最旧的记录
    async fn append(&self, session_id: &SessionId, event: &AccessEvent, expiry: StoreExpiry) -> AppResult<()>;

    /// 按时间顺序返回会话的访问事件
    async fn list(&self, session_id: &SessionId) -> AppResult<Vec<AccessEvent>>;

    /// 删除会话的全部访问事件，不存在时视为成功
    async fn delete(&self, session_id: &SessionId) -> AppResult<()>;
}
