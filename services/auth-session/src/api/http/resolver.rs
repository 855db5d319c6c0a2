//! 会话解析器
//!
//! 每个解析器把一种传输方式（Cookie、Bearer 头）适配到 `get_by_token`

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName, header::AUTHORIZATION};
use tracing::{debug, warn};

use super::cookie::{SessionCookieConfig, set_cookie_value};
use crate::application::{RequestContext, SessionProvider};
use crate::domain::session::{Session, TokenKind};
use crate::error::{SessionError, SessionResult};

const BEARER_PREFIX: &str = "bearer ";

/// 凭据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    Header,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Cookie => "cookie",
            CredentialSource::Header => "header",
        }
    }
}

/// 解析成功的会话
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    pub source: CredentialSource,
}

/// 会话解析器
///
/// - `Ok(None)`：请求未携带该方式的凭据
/// - `Err(SessionError::Invalid)`：携带了凭据但被拒绝
/// - 其他错误：致命错误
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> SessionResult<Option<ResolvedSession>>;
}

/// Cookie 会话解析器
pub struct CookieSessionResolver {
    provider: Arc<SessionProvider>,
    cookie: SessionCookieConfig,
}

impl CookieSessionResolver {
    pub fn new(provider: Arc<SessionProvider>, cookie: SessionCookieConfig) -> Self {
        Self { provider, cookie }
    }
}

#[async_trait]
impl SessionResolver for CookieSessionResolver {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> SessionResult<Option<ResolvedSession>> {
        let Some(token) = self.cookie.read(headers) else {
            return Ok(None);
        };

        match self
            .provider
            .get_by_token(ctx, &token, TokenKind::AccessToken)
            .await
        {
            Ok(session) => {
                debug!(session_id = %session.id, "Session resolved from cookie");
                Ok(Some(ResolvedSession {
                    session,
                    source: CredentialSource::Cookie,
                }))
            }
            Err(SessionError::NotFound) => {
                warn!(request_id = %ctx.request_id, "Invalid session cookie, clearing");
                response_headers.append(SET_COOKIE, set_cookie_value(&self.cookie.clear())?);
                Err(SessionError::Invalid)
            }
            Err(e) => Err(e),
        }
    }
}

/// Bearer 令牌解析器
pub struct HeaderTokenSessionResolver {
    provider: Arc<SessionProvider>,
    header: HeaderName,
}

impl HeaderTokenSessionResolver {
    pub fn new(provider: Arc<SessionProvider>) -> Self {
        Self::with_header(provider, AUTHORIZATION)
    }

    pub fn with_header(provider: Arc<SessionProvider>, header: HeaderName) -> Self {
        Self { provider, header }
    }

    fn read(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(&self.header)?.to_str().ok()?.trim();
        parse_bearer(value).map(str::to_string)
    }
}

/// 解析 `Bearer <token>`，前缀不区分大小写
pub fn parse_bearer(value: &str) -> Option<&str> {
    let prefix = value.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl SessionResolver for HeaderTokenSessionResolver {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        headers: &HeaderMap,
        _response_headers: &mut HeaderMap,
    ) -> SessionResult<Option<ResolvedSession>> {
        let Some(token) = self.read(headers) else {
            return Ok(None);
        };

        match self
            .provider
            .get_by_token(ctx, &token, TokenKind::AccessToken)
            .await
        {
            Ok(session) => {
                debug!(session_id = %session.id, "Session resolved from header");
                Ok(Some(ResolvedSession {
                    session,
                    source: CredentialSource::Header,
                }))
            }
            Err(SessionError::NotFound) => {
                warn!(request_id = %ctx.request_id, "Invalid access token");
                Err(SessionError::Invalid)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer("bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer("BEARER   abc.def "), Some("abc.def"));
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("Bear"), None);
    }
}
