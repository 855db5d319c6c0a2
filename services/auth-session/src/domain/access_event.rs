//! 会话访问事件
//!
//! 每次创建或访问会话时记录的连接信息快照

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use axum::http::header::{FORWARDED, USER_AGENT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// 客户端通过请求头提交的附加信息
pub type AccessEventExtraInfo = BTreeMap<String, serde_json::Value>;

/// 连接信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEventConnInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub x_forwarded_for: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub x_real_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub forwarded: String,
}

/// 访问事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub remote: AccessEventConnInfo,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    #[serde(default)]
    pub extra: AccessEventExtraInfo,
}

impl AccessEvent {
    /// 只有时间戳的事件
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            remote: AccessEventConnInfo::default(),
            user_agent: String::new(),
            extra: AccessEventExtraInfo::new(),
        }
    }

    /// 由当前请求的元数据构造事件
    pub fn from_request(timestamp: DateTime<Utc>, meta: &RequestMeta) -> Self {
        Self {
            timestamp,
            remote: meta.remote.clone(),
            user_agent: meta.user_agent.clone(),
            extra: meta.extra.clone(),
        }
    }
}

/// 附加信息请求头的限制
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraInfoPolicy {
    pub header: String,
    pub max_bytes: usize,
    pub max_keys: usize,
}

impl Default for ExtraInfoPolicy {
    fn default() -> Self {
        Self {
            header: "x-authgate-extra-info".to_string(),
            max_bytes: 1024,
            max_keys: 32,
        }
    }
}

impl ExtraInfoPolicy {
    /// 解析附加信息
    ///
    /// 超出大小、键数量或者不是 JSON 对象时返回空集合，从不报错
    pub fn parse(&self, raw: Option<&str>) -> AccessEventExtraInfo {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return AccessEventExtraInfo::new();
        };

        if raw.len() > self.max_bytes {
            warn!(size = raw.len(), limit = self.max_bytes, "Extra info too large, dropped");
            return AccessEventExtraInfo::new();
        }

        let extra: AccessEventExtraInfo = match serde_json::from_str(raw) {
            Ok(extra) => extra,
            Err(e) => {
                warn!(error = %e, "Malformed extra info, dropped");
                return AccessEventExtraInfo::new();
            }
        };

        if extra.len() > self.max_keys {
            warn!(keys = extra.len(), limit = self.max_keys, "Extra info has too many keys, dropped");
            return AccessEventExtraInfo::new();
        }

        extra
    }
}

/// 请求元数据（构造访问事件所需的部分）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub user_agent: String,
    pub remote: AccessEventConnInfo,
    pub extra: AccessEventExtraInfo,
}

impl RequestMeta {
    pub fn from_headers(
        headers: &HeaderMap,
        remote_addr: Option<String>,
        policy: &ExtraInfoPolicy,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        Self {
            user_agent: header(USER_AGENT.as_str()),
            remote: AccessEventConnInfo {
                remote_addr: remote_addr.unwrap_or_default(),
                x_forwarded_for: header(X_FORWARDED_FOR),
                x_real_ip: header(X_REAL_IP),
                forwarded: header(FORWARDED.as_str()),
            },
            extra: policy.parse(
                headers
                    .get(policy.header.as_str())
                    .and_then(|v| v.to_str().ok()),
            ),
        }
    }
}
