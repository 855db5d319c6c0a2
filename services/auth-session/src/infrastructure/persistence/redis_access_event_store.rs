//! Redis 访问事件存储
//!
//! `access-events:{session_id}` 列表，TTL 跟随会话记录，只保留最近的事件

use async_trait::async_trait;
use authgate_adapter_redis::{RedisConfig, redis_error};
use authgate_errors::{AppError, AppResult};
use redis::aio::ConnectionManager;

use crate::domain::access_event::AccessEvent;
use crate::domain::repositories::{ACCESS_EVENT_HISTORY_LIMIT, AccessEventStore, StoreExpiry};
use crate::domain::session::SessionId;

const ACCESS_EVENTS_KEY_PREFIX: &str = "access-events:";

pub struct RedisAccessEventStore {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisAccessEventStore {
    pub fn new(conn: ConnectionManager, config: RedisConfig) -> Self {
        Self { conn, config }
    }

    fn events_key(&self, session_id: &SessionId) -> String {
        self.config
            .prefixed_key(&format!("{}{}", ACCESS_EVENTS_KEY_PREFIX, session_id))
    }
}

#[async_trait]
impl AccessEventStore for RedisAccessEventStore {
    async fn append(
        &self,
        session_id: &SessionId,
        event: &AccessEvent,
        expiry: StoreExpiry,
    ) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let key = self.events_key(session_id);
        let value = serde_json::to_string(event)
            .map_err(|e| AppError::internal(format!("Failed to serialize access event: {}", e)))?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("RPUSH")
            .arg(&key)
            .arg(value)
            .ignore()
            .cmd("LTRIM")
            .arg(&key)
            .arg(history_start())
            .arg(-1)
            .ignore();
        match expiry {
            StoreExpiry::After(ttl) => {
                pipe.cmd("EXPIRE").arg(&key).arg(ttl.as_secs().max(1)).ignore();
            }
            StoreExpiry::Persist => {
                pipe.cmd("PERSIST").arg(&key).ignore();
            }
            StoreExpiry::Keep => {}
        }

        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_error("access event append", e))
    }

    async fn list(&self, session_id: &SessionId) -> AppResult<Vec<AccessEvent>> {
        let mut conn = self.conn.clone();

        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(self.events_key(session_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("access event list", e))?;

        values
            .iter()
            .map(|value| {
                serde_json::from_str(value).map_err(|e| {
                    AppError::internal(format!("Failed to deserialize access event: {}", e))
                })
            })
            .collect()
    }

    async fn delete(&self, session_id: &SessionId) -> AppResult<()> {
        let mut conn = self.conn.clone();

        redis::cmd("DEL")
            .arg(self.events_key(session_id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_error("access event delete", e))
    }
}

/// LTRIM 的起始下标，从尾部倒数
fn history_start() -> i64 {
    -(ACCESS_EVENT_HISTORY_LIMIT as i64)
}

