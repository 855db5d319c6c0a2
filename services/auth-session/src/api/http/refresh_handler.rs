//! 刷新令牌兑换端点
//!
//! `POST /_auth/session/refresh`，`Authorization: Bearer <refresh token>`，
//! 成功时轮换访问令牌，并通过响应体与会话 Cookie 返回新令牌

use std::net::SocketAddr;
use std::sync::Arc;

use authgate_errors::{AppError, AppResult};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use super::cookie::{SessionCookieConfig, set_cookie_value};
use super::resolver::parse_bearer;
use crate::application::{RequestContext, RequestContextSettings, SessionProvider};
use crate::domain::session::TokenKind;
use crate::error::SessionError;

pub const REFRESH_PATH: &str = "/_auth/session/refresh";

/// 刷新端点状态
pub struct RefreshExchange {
    provider: Arc<SessionProvider>,
    cookie: SessionCookieConfig,
    settings: RequestContextSettings,
}

impl RefreshExchange {
    pub fn new(
        provider: Arc<SessionProvider>,
        cookie: SessionCookieConfig,
        settings: RequestContextSettings,
    ) -> Self {
        Self {
            provider,
            cookie,
            settings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// 秒；访问令牌不限时长时省略
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

pub async fn refresh_session_handler(
    State(exchange): State<Arc<RefreshExchange>>,
    request: Request,
) -> AppResult<(StatusCode, HeaderMap, Json<RefreshResponse>)> {
    let (parts, _body) = request.into_parts();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let headers = &parts.headers;
    let ctx = RequestContext::from_headers(headers, remote_addr, &exchange.settings);

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_bearer(v.trim()))
        .ok_or_else(|| AppError::unauthenticated("Refresh token required"))?;

    let mut session = match exchange
        .provider
        .get_by_token(&ctx, token, TokenKind::RefreshToken)
        .await
    {
        Ok(session) => session,
        Err(SessionError::NotFound | SessionError::Invalid) => {
            warn!(request_id = %ctx.request_id, "Invalid refresh token");
            return Err(AppError::unauthenticated("Provided refresh token is invalid"));
        }
        Err(SessionError::Store(e)) => return Err(e),
    };

    let access_token = exchange.provider.refresh(&ctx, &mut session).await?;
    let lifetime = exchange.provider.access_token_lifetime(&session);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        SET_COOKIE,
        set_cookie_value(&exchange.cookie.issue(&access_token, lifetime))?,
    );

    Ok((
        StatusCode::OK,
        response_headers,
        Json(RefreshResponse {
            access_token,
            expires_in: lifetime.map(|l| l.as_secs()),
        }),
    ))
}

/// 刷新路由，不经过会话解析中间件
pub fn refresh_routes(exchange: Arc<RefreshExchange>) -> Router {
    Router::new()
        .route(REFRESH_PATH, post(refresh_session_handler))
        .with_state(exchange)
}
