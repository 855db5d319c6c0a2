//! Redis 会话存储
//!
//! - `session:{id}`：会话 JSON，TTL 由客户端配置决定
//! - `session-list:{user_id}`：用户会话 ID 集合，TTL 不短于其中任一会话

use async_trait::async_trait;
use authgate_adapter_redis::{RedisConfig, redis_error};
use authgate_errors::{AppError, AppResult};
use redis::Script;
use redis::aio::ConnectionManager;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::repositories::{SessionStore, StoreExpiry};
use crate::domain::session::{Session, SessionId};

const SESSION_KEY_PREFIX: &str = "session:";
const SESSION_LIST_KEY_PREFIX: &str = "session-list:";

/// 写入会话并维护用户索引
///
/// KEYS[1] 会话键，KEYS[2] 索引键；
/// ARGV[1] 会话 JSON，ARGV[2] 会话 ID，ARGV[3] TTL 秒数（0 不过期，-1 保留原 TTL），
/// ARGV[4] 为 1 时只覆盖已存在的记录。
/// 索引 TTL 只会延长到会话 TTL，会话不过期时索引也不过期
const WRITE_SESSION_SCRIPT: &str = r"
local ttl = tonumber(ARGV[3])
local args = {KEYS[1], ARGV[1]}
if ARGV[4] == '1' then
    table.insert(args, 'XX')
end
if ttl > 0 then
    table.insert(args, 'EX')
    table.insert(args, ttl)
elseif ttl < 0 then
    table.insert(args, 'KEEPTTL')
end
if not redis.call('SET', unpack(args)) then
    return 0
end
local session_ttl = redis.call('TTL', KEYS[1])
local index_ttl = redis.call('TTL', KEYS[2])
redis.call('SADD', KEYS[2], ARGV[2])
if session_ttl < 0 then
    redis.call('PERSIST', KEYS[2])
elseif index_ttl == -2 or (index_ttl >= 0 and index_ttl < session_ttl) then
    redis.call('EXPIRE', KEYS[2], session_ttl)
end
return 1
";

pub struct RedisSessionStore {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, config: RedisConfig) -> Self {
        Self { conn, config }
    }

    fn session_key(&self, id: &SessionId) -> String {
        self.config
            .prefixed_key(&format!("{}{}", SESSION_KEY_PREFIX, id))
    }

    fn session_list_key(&self, user_id: &str) -> String {
        self.config
            .prefixed_key(&format!("{}{}", SESSION_LIST_KEY_PREFIX, user_id))
    }

    async fn write(&self, session: &Session, expiry: StoreExpiry, only_existing: bool) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let value = encode(session)?;

        let written: i64 = Script::new(WRITE_SESSION_SCRIPT)
            .key(self.session_key(&session.id))
            .key(self.session_list_key(&session.user_id))
            .arg(value)
            .arg(session.id.as_str())
            .arg(expiry_arg(expiry))
            .arg(if only_existing { 1 } else { 0 })
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("session write", e))?;

        Ok(written == 1)
    }
}

/// 脚本中的 TTL 参数
pub(crate) fn expiry_arg(expiry: StoreExpiry) -> i64 {
    match expiry {
        StoreExpiry::After(ttl) => i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX),
        StoreExpiry::Persist => 0,
        StoreExpiry::Keep => -1,
    }
}

/// 删除时只需要会话所有者
#[derive(Deserialize)]
struct SessionOwner {
    user_id: String,
}

fn session_owner(value: &str) -> Option<String> {
    serde_json::from_str::<SessionOwner>(value)
        .ok()
        .map(|owner| owner.user_id)
}

fn encode(session: &Session) -> AppResult<String> {
    serde_json::to_string(session)
        .map_err(|e| AppError::internal(format!("Failed to serialize session: {}", e)))
}

fn decode(value: &str) -> AppResult<Session> {
    serde_json::from_str(value)
        .map_err(|e| AppError::internal(format!("Failed to deserialize session: {}", e)))
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session, expiry: StoreExpiry) -> AppResult<()> {
        self.write(session, expiry, false).await?;
        debug!(session_id = %session.id, "Session stored");
        Ok(())
    }

    async fn update(&self, session: &Session, expiry: StoreExpiry) -> AppResult<bool> {
        self.write(session, expiry, true).await
    }

    async fn get(&self, id: &SessionId) -> AppResult<Option<Session>> {
        let mut conn = self.conn.clone();

        let value: Option<String> = redis::cmd("GET")
            .arg(self.session_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("session get", e))?;

        value.as_deref().map(decode).transpose()
    }

    async fn delete(&self, id: &SessionId) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let key = self.session_key(id);

        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("session delete", e))?;
        let Some(value) = value else {
            return Ok(false);
        };

        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(&key);
        match session_owner(&value) {
            Some(user_id) => {
                pipe.cmd("SREM")
                    .arg(self.session_list_key(&user_id))
                    .arg(id.as_str())
                    .ignore();
            }
            // 索引项留给 list_by_user 清理
            None => warn!(session_id = %id, "Undecodable session record, deleting without index cleanup"),
        }

        let (deleted,): (i64,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("session delete", e))?;

        Ok(deleted > 0)
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Session>> {
        let mut conn = self.conn.clone();
        let list_key = self.session_list_key(user_id);

        // 1. 读取索引
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(&list_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("session list", e))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // 2. 批量读取会话
        let keys: Vec<String> = ids
            .iter()
            .map(|id| self.session_key(&SessionId::from(id.as_str())))
            .collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("session list", e))?;

        let mut sessions = Vec::with_capacity(values.len());
        let mut stale = Vec::new();
        for (id, value) in ids.iter().zip(values) {
            let Some(value) = value else {
                stale.push(id.as_str());
                continue;
            };
            match decode(&value) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Skipping undecodable session record");
                    stale.push(id.as_str());
                }
            }
        }

        // 3. 清理已过期或无法解析的索引项
        if !stale.is_empty() {
            redis::cmd("SREM")
                .arg(&list_key)
                .arg(&stale)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| redis_error("session list cleanup", e))?;
            debug!(user_id = %user_id, count = stale.len(), "Pruned stale session index entries");
        }

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expiry_arg() {
        assert_eq!(expiry_arg(StoreExpiry::After(Duration::from_secs(60))), 60);
        assert_eq!(expiry_arg(StoreExpiry::After(Duration::from_millis(10))), 1);
        assert_eq!(expiry_arg(StoreExpiry::Persist), 0);
        assert_eq!(expiry_arg(StoreExpiry::Keep), -1);
    }

    #[test]
    fn test_session_owner_ignores_other_fields() {
        let value = r#"{"id":"s1","user_id":"user-1","unknown_field":{"nested":true}}"#;
        assert_eq!(session_owner(value), Some("user-1".to_string()));
    }

    #[test]
    fn test_session_owner_of_corrupt_record() {
        assert_eq!(session_owner("not json"), None);
        assert_eq!(session_owner(r#"{"id":"s1"}"#), None);
    }
}
