//! 用户认证记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话解析时读取的用户认证状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub verified: bool,
    pub disabled: bool,
    pub disabled_message: Option<String>,
    /// 禁用到期时间，None 表示永久
    pub disabled_expiry: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verified: false,
            disabled: false,
            disabled_message: None,
            disabled_expiry: None,
            last_login_at: None,
        }
    }

    /// 在指定时刻是否处于禁用状态
    pub fn is_disabled_at(&self, now: DateTime<Utc>) -> bool {
        match (self.disabled, self.disabled_expiry) {
            (false, _) => false,
            (true, None) => true,
            (true, Some(expiry)) => now < expiry,
        }
    }

    pub fn to_user_info(&self, now: DateTime<Utc>) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            verified: self.verified,
            disabled: self.is_disabled_at(now),
            last_login_at: self.last_login_at,
        }
    }
}

/// 暴露给下游的用户信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub verified: bool,
    pub disabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}
