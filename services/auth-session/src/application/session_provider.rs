//! 会话提供者
//!
//! 会话的创建、按令牌解析、访问记录、刷新、撤销与列表

use std::sync::Arc;
use std::time::Duration;

use authgate_common::Clock;
use authgate_errors::AppError;
use tracing::{debug, error, info, warn};

use super::request_context::RequestContext;
use crate::domain::access_event::AccessEvent;
use crate::domain::expiry::{is_valid, store_expiry};
use crate::domain::repositories::{AccessEventStore, ClientRegistry, SessionStore, StoreExpiry};
use crate::domain::session::{Session, SessionId, TokenKind};
use crate::domain::token::{generate_token, matches, parse_session_id};
use crate::error::{SessionError, SessionResult};
use crate::infrastructure::observability::metrics;

pub struct SessionProvider {
    store: Arc<dyn SessionStore>,
    events: Arc<dyn AccessEventStore>,
    clients: Arc<dyn ClientRegistry>,
    clock: Arc<dyn Clock>,
}

impl SessionProvider {
    pub fn new(
        store: Arc<dyn SessionStore>,
        events: Arc<dyn AccessEventStore>,
        clients: Arc<dyn ClientRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            events,
            clients,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 为当前请求的客户端创建新会话
    pub async fn create(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        principal_id: &str,
    ) -> SessionResult<Session> {
        // 1. 当前客户端必须已配置
        let client_id = ctx
            .client_id
            .clone()
            .ok_or_else(|| AppError::failed_precondition("Request has no client id"))?;
        let config = self
            .clients
            .get(&client_id)
            .filter(|c| !c.disabled)
            .ok_or_else(|| {
                AppError::failed_precondition(format!("Client {} is not configured", client_id))
            })?;

        // 2. 生成 ID 与令牌
        let now = self.clock.now();
        let id = SessionId::generate();
        let access_token = generate_token(&id);
        let refresh_token = if config.refresh_token_disabled {
            String::new()
        } else {
            generate_token(&id)
        };

        let event = AccessEvent::from_request(now, &ctx.meta);
        let session = Session {
            id,
            client_id: client_id.clone(),
            user_id: user_id.to_string(),
            principal_id: principal_id.to_string(),
            access_token,
            refresh_token,
            created_at: now,
            access_token_created_at: now,
            accessed_at: now,
            initial_access: event.clone(),
            last_access: event.clone(),
        };

        // 3. 持久化会话与首个访问事件，事件写入失败时撤回会话
        let expiry = store_expiry(&config, &session, now);
        self.store.create(&session, expiry).await?;
        if let Err(e) = self.events.append(&session.id, &event, expiry).await {
            warn!(session_id = %session.id, error = %e, "Failed to record initial access, rolling back session");
            if let Err(cleanup) = self.store.delete(&session.id).await {
                error!(session_id = %session.id, error = %cleanup, "Failed to roll back session");
            }
            return Err(e.into());
        }

        metrics::record_session_created(&client_id);
        info!(
            session_id = %session.id,
            client_id = %client_id,
            user_id = %user_id,
            request_id = %ctx.request_id,
            "Session created"
        );

        Ok(session)
    }

    /// 按令牌解析会话
    ///
    /// 任何拒绝原因都返回 [`SessionError::NotFound`]
    pub async fn get_by_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        kind: TokenKind,
    ) -> SessionResult<Session> {
        let id = parse_session_id(token).ok_or(SessionError::NotFound)?;

        let session = self.store.get(&id).await?.ok_or(SessionError::NotFound)?;

        if !matches(token, session.token(kind)) {
            debug!(session_id = %id, kind = kind.as_str(), "Token mismatch");
            return Err(SessionError::NotFound);
        }

        if ctx.client_id.as_ref() != Some(&session.client_id) {
            debug!(session_id = %id, "Session belongs to another client");
            return Err(SessionError::NotFound);
        }

        let config = self.clients.get(&session.client_id);
        if !is_valid(&session, config.as_ref(), kind, self.clock.now()) {
            debug!(session_id = %id, kind = kind.as_str(), "Session expired or client unavailable");
            return Err(SessionError::NotFound);
        }

        Ok(session)
    }

    /// 记录一次访问
    pub async fn access(&self, ctx: &RequestContext, session: &mut Session) -> SessionResult<()> {
        let now = self.clock.now();
        let event = AccessEvent::from_request(now, &ctx.meta);
        session.record_access(event.clone());

        let expiry = self.expiry_for(session);
        if !self.store.update(session, expiry).await? {
            return Err(SessionError::NotFound);
        }
        self.events.append(&session.id, &event, expiry).await?;

        debug!(session_id = %session.id, request_id = %ctx.request_id, "Session accessed");
        Ok(())
    }

    /// 轮换访问令牌，返回新令牌
    pub async fn refresh(&self, ctx: &RequestContext, session: &mut Session) -> SessionResult<String> {
        let config = self
            .clients
            .get(&session.client_id)
            .filter(|c| !c.disabled)
            .ok_or(SessionError::NotFound)?;

        let now = self.clock.now();
        let token = generate_token(&session.id);
        session.rotate_access_token(token.clone(), now);

        let expiry = store_expiry(&config, session, now);
        if !self.store.update(session, expiry).await? {
            return Err(SessionError::NotFound);
        }

        info!(session_id = %session.id, request_id = %ctx.request_id, "Access token refreshed");
        Ok(token)
    }

    /// 撤销会话，会话不存在时视为成功
    ///
    /// 访问事件无论会话是否存在都会删除，重试可以清理上次遗留的事件
    pub async fn invalidate(&self, id: &SessionId) -> SessionResult<()> {
        let deleted = self.store.delete(id).await?;
        self.events.delete(id).await?;
        if deleted {
            metrics::record_session_invalidated();
            info!(session_id = %id, "Session invalidated");
        }
        Ok(())
    }

    /// 撤销用户的所有会话，可保留一个，返回撤销数量
    pub async fn invalidate_all(
        &self,
        user_id: &str,
        except: Option<&SessionId>,
    ) -> SessionResult<usize> {
        let sessions = self.store.list_by_user(user_id).await?;

        let mut count = 0;
        for session in sessions.iter().filter(|s| Some(&s.id) != except) {
            let deleted = self.store.delete(&session.id).await?;
            self.events.delete(&session.id).await?;
            if deleted {
                metrics::record_session_invalidated();
                count += 1;
            }
        }

        info!(user_id = %user_id, count, "User sessions invalidated");
        Ok(count)
    }

    /// 列出用户所有未过期的会话（跨客户端），按创建时间排序
    pub async fn list(&self, user_id: &str) -> SessionResult<Vec<Session>> {
        let now = self.clock.now();

        let mut sessions: Vec<Session> = self
            .store
            .list_by_user(user_id)
            .await?
            .into_iter()
            .filter(|s| {
                let config = self.clients.get(&s.client_id);
                is_valid(s, config.as_ref(), TokenKind::AccessToken, now)
            })
            .collect();

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    /// 会话的访问历史
    pub async fn access_events(&self, id: &SessionId) -> SessionResult<Vec<AccessEvent>> {
        Ok(self.events.list(id).await?)
    }

    /// 会话所属客户端的访问令牌有效期，None 表示不限制或客户端不可用
    pub fn access_token_lifetime(&self, session: &Session) -> Option<Duration> {
        self.clients
            .get(&session.client_id)
            .filter(|c| !c.disabled)
            .and_then(|c| c.access_token_lifetime())
    }

    fn expiry_for(&self, session: &Session) -> StoreExpiry {
        match self.clients.get(&session.client_id) {
            Some(config) => store_expiry(&config, session, self.clock.now()),
            None => StoreExpiry::Keep,
        }
    }
}
