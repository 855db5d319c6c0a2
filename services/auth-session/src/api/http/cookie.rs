//! 会话 Cookie

use std::time::Duration;

use authgate_config::SessionConfig;
use authgate_errors::{AppError, AppResult};
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

/// 会话 Cookie 设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookieConfig {
    pub name: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub path: String,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl SessionCookieConfig {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            domain: config.cookie_domain.clone(),
            secure: config.cookie_secure,
            path: "/".to_string(),
        }
    }

    /// 读取请求中的会话令牌
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        CookieJar::from_headers(headers)
            .get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// 签发会话 Cookie，`max_age` 为 None 时为浏览器会话 Cookie
    pub fn issue(&self, token: &str, max_age: Option<Duration>) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), token.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(self.path.clone());
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(max_age) = max_age {
            let secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
            builder = builder.max_age(time::Duration::seconds(secs));
        }
        builder.build()
    }

    /// 清除会话 Cookie
    pub fn clear(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(self.path.clone())
            .max_age(time::Duration::ZERO);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

/// 转换为 `Set-Cookie` 头的值
pub fn set_cookie_value(cookie: &Cookie<'_>) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::internal(format!("Invalid cookie value: {}", e)))
}
