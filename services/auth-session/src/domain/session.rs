//! 会话实体

use authgate_common::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::access_event::AccessEvent;

/// 会话 ID
///
/// 随机 UUID v4 字符串，不包含令牌分隔符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 令牌类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::AccessToken => "access_token",
            TokenKind::RefreshToken => "refresh_token",
        }
    }
}

/// 会话实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub client_id: ClientId,
    pub user_id: String,
    pub principal_id: String,

    pub access_token: String,
    /// 客户端禁用刷新令牌时为空
    #[serde(default)]
    pub refresh_token: String,

    pub created_at: DateTime<Utc>,
    pub access_token_created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,

    pub initial_access: AccessEvent,
    pub last_access: AccessEvent,
}

impl Session {
    /// 指定类型的当前令牌
    pub fn token(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::AccessToken => &self.access_token,
            TokenKind::RefreshToken => &self.refresh_token,
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// 记录一次访问，不修改创建信息与令牌
    pub fn record_access(&mut self, event: AccessEvent) {
        self.accessed_at = event.timestamp;
        self.last_access = event;
    }

    /// 替换访问令牌
    pub fn rotate_access_token(&mut self, token: String, now: DateTime<Utc>) {
        self.access_token = token;
        self.access_token_created_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixture() -> Session {
        let now = Utc.with_ymd_and_hms(2006, 1, 1, 0, 0, 0).unwrap();
        Session {
            id: SessionId::from("session-id"),
            client_id: ClientId::new("web-app"),
            user_id: "user-id".to_string(),
            principal_id: "principal-id".to_string(),
            access_token: "session-id.access-token".to_string(),
            refresh_token: String::new(),
            created_at: now,
            access_token_created_at: now,
            accessed_at: now,
            initial_access: AccessEvent::at(now),
            last_access: AccessEvent::at(now),
        }
    }

    #[test]
    fn test_generated_ids_have_no_delimiter() {
        let id = SessionId::generate();
        assert!(!id.as_str().contains(crate::domain::token::TOKEN_DELIMITER));
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn test_token_by_kind() {
        let session = fixture();
        assert_eq!(session.token(TokenKind::AccessToken), "session-id.access-token");
        assert_eq!(session.token(TokenKind::RefreshToken), "");
        assert!(!session.has_refresh_token());
    }

    #[test]
    fn test_record_access_keeps_initial_access() {
        let mut session = fixture();
        let later = session.created_at + Duration::seconds(100);

        session.record_access(AccessEvent::at(later));

        assert_eq!(session.accessed_at, later);
        assert_eq!(session.last_access.timestamp, later);
        assert_eq!(session.initial_access.timestamp, session.created_at);
    }

    #[test]
    fn test_serde_round_trip_keeps_token_fields() {
        let session = fixture();
        let json = serde_json::to_string(&session).unwrap();
        let decoded: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, session);
    }
}
