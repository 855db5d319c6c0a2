//! 会话解析中间件

use std::net::SocketAddr;
use std::sync::Arc;

use authgate_errors::{AppError, AppResult};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use super::outcome::AuthnOutcome;
use super::resolver::{ResolvedSession, SessionResolver};
use crate::application::{RequestContext, RequestContextSettings, SessionProvider};
use crate::domain::repositories::{UserReadScope, UserStore};
use crate::error::{SessionError, SessionResult};
use crate::infrastructure::observability::metrics;

/// 会话解析中间件状态
///
/// 解析器按传入顺序尝试，Cookie 解析器应排在 Bearer 解析器之前
pub struct SessionMiddleware {
    resolvers: Vec<Arc<dyn SessionResolver>>,
    provider: Arc<SessionProvider>,
    users: Arc<dyn UserStore>,
    settings: RequestContextSettings,
}

impl SessionMiddleware {
    pub fn new(
        resolvers: Vec<Arc<dyn SessionResolver>>,
        provider: Arc<SessionProvider>,
        users: Arc<dyn UserStore>,
        settings: RequestContextSettings,
    ) -> Self {
        Self {
            resolvers,
            provider,
            users,
            settings,
        }
    }

    pub fn settings(&self) -> &RequestContextSettings {
        &self.settings
    }

    /// 按优先级尝试各解析器
    ///
    /// 第一个成功的解析器胜出；所有解析器都没有结果时，
    /// 只要有一个报告过无效，整体结果就是 [`SessionError::Invalid`]
    pub async fn resolve_session(
        &self,
        ctx: &RequestContext,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> SessionResult<Option<ResolvedSession>> {
        let mut invalid = false;

        for resolver in &self.resolvers {
            match resolver.resolve(ctx, headers, response_headers).await {
                Ok(Some(resolved)) => return Ok(Some(resolved)),
                Ok(None) => {}
                Err(SessionError::Invalid | SessionError::NotFound) => invalid = true,
                Err(e) => return Err(e),
            }
        }

        if invalid {
            Err(SessionError::Invalid)
        } else {
            Ok(None)
        }
    }

    /// 解析当前请求的认证结果，返回结果与需要附加到响应上的头
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        headers: &HeaderMap,
    ) -> AppResult<(AuthnOutcome, HeaderMap)> {
        let mut response_headers = HeaderMap::new();

        // 1. 开启只读作用域
        let mut scope = self.users.begin_read_only().await?;

        // 2. 解析会话、读取用户、记录访问
        let outcome = self
            .authenticate(scope.as_mut(), ctx, headers, &mut response_headers)
            .await?;

        // 3. 结束作用域
        scope.finish().await?;

        metrics::record_resolve(outcome.as_str());
        debug!(
            request_id = %ctx.request_id,
            outcome = outcome.as_str(),
            "Session resolution finished"
        );

        Ok((outcome, response_headers))
    }

    async fn authenticate(
        &self,
        scope: &mut dyn UserReadScope,
        ctx: &RequestContext,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> AppResult<AuthnOutcome> {
        let ResolvedSession {
            mut session,
            source,
        } = match self.resolve_session(ctx, headers, response_headers).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return Ok(AuthnOutcome::Anonymous),
            Err(SessionError::Invalid | SessionError::NotFound) => return Ok(AuthnOutcome::Invalid),
            Err(SessionError::Store(e)) => return Err(e),
        };

        let Some(user) = scope.get_auth(&session.user_id).await? else {
            warn!(
                session_id = %session.id,
                user_id = %session.user_id,
                "Session owner not found"
            );
            return Ok(AuthnOutcome::Invalid);
        };

        match self.provider.access(ctx, &mut session).await {
            Ok(()) => {}
            Err(SessionError::Invalid | SessionError::NotFound) => {
                warn!(session_id = %session.id, "Session vanished during access");
                return Ok(AuthnOutcome::Invalid);
            }
            Err(SessionError::Store(e)) => return Err(e),
        }

        let user = user.to_user_info(self.provider.clock().now());
        Ok(AuthnOutcome::Authenticated {
            session: Box::new(session),
            user,
            source,
        })
    }
}

/// 会话解析中间件
///
/// 把 [`RequestContext`] 与 [`AuthnOutcome`] 注入请求扩展；
/// 非领域错误转换为固定的 500 响应
pub async fn session_middleware(
    State(middleware): State<Arc<SessionMiddleware>>,
    mut request: Request,
    next: Next,
) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let ctx = RequestContext::from_headers(request.headers(), remote_addr, middleware.settings());

    let (outcome, response_headers) = match middleware.resolve(&ctx, request.headers()).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(error = %e, request_id = %ctx.request_id, "Session resolution failed");
            return AppError::internal(e.to_string()).into_response();
        }
    };

    request.extensions_mut().insert(ctx);
    request.extensions_mut().insert(outcome);

    let mut response = next.run(request).await;
    for (name, value) in response_headers.iter() {
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}
