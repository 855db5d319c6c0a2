//! 会话解析端点
//!
//! 供上游网关调用，通过响应头返回解析结果

use std::sync::Arc;

use authgate_errors::{AppError, AppResult};
use axum::Router;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware;
use axum::routing::get;

use super::middleware::{SessionMiddleware, session_middleware};
use super::outcome::AuthnOutcome;

pub const RESOLVE_PATH: &str = "/_auth/session/resolve";

pub const HEADER_SESSION_VALID: HeaderName = HeaderName::from_static("x-authgate-session-valid");
pub const HEADER_USER_ID: HeaderName = HeaderName::from_static("x-authgate-user-id");
pub const HEADER_USER_VERIFIED: HeaderName = HeaderName::from_static("x-authgate-user-verified");
pub const HEADER_USER_DISABLED: HeaderName = HeaderName::from_static("x-authgate-user-disabled");

/// 把解析结果写成响应头；匿名请求不返回任何会话头
pub async fn resolve_session_handler(outcome: AuthnOutcome) -> AppResult<(StatusCode, HeaderMap)> {
    let mut headers = HeaderMap::new();

    match outcome {
        AuthnOutcome::Authenticated { user, .. } => {
            let user_id = HeaderValue::from_str(&user.id)
                .map_err(|e| AppError::internal(format!("Invalid user id header: {}", e)))?;
            headers.insert(HEADER_SESSION_VALID, bool_header(true));
            headers.insert(HEADER_USER_ID, user_id);
            headers.insert(HEADER_USER_VERIFIED, bool_header(user.verified));
            headers.insert(HEADER_USER_DISABLED, bool_header(user.disabled));
        }
        AuthnOutcome::Invalid => {
            headers.insert(HEADER_SESSION_VALID, bool_header(false));
        }
        AuthnOutcome::Anonymous => {}
    }

    Ok((StatusCode::OK, headers))
}

fn bool_header(value: bool) -> HeaderValue {
    if value {
        HeaderValue::from_static("true")
    } else {
        HeaderValue::from_static("false")
    }
}

/// 会话路由
pub fn session_routes(middleware_state: Arc<SessionMiddleware>) -> Router {
    Router::new()
        .route(RESOLVE_PATH, get(resolve_session_handler))
        .layer(middleware::from_fn_with_state(middleware_state, session_middleware))
}
