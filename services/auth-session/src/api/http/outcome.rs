//! 会话解析结果
//!
//! 下游只能通过 [`AuthnOutcome`] 区分“凭据无效”与“未携带凭据”

use authgate_errors::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::resolver::CredentialSource;
use crate::domain::session::Session;
use crate::domain::user::UserInfo;

/// 三态认证结果
#[derive(Debug, Clone)]
pub enum AuthnOutcome {
    /// 已认证
    Authenticated {
        session: Box<Session>,
        user: UserInfo,
        source: CredentialSource,
    },
    /// 携带了凭据但被拒绝
    Invalid,
    /// 未携带凭据
    Anonymous,
}

impl AuthnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthnOutcome::Authenticated { .. } => "authenticated",
            AuthnOutcome::Invalid => "invalid",
            AuthnOutcome::Anonymous => "anonymous",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthnOutcome::Authenticated { .. })
    }
}

impl<S> FromRequestParts<S> for AuthnOutcome
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthnOutcome>()
            .cloned()
            .ok_or_else(|| {
                AppError::internal("Missing authn outcome in request extensions (session_middleware may not have run)")
            })
    }
}

/// 要求已认证的提取器
pub struct CurrentSession {
    pub session: Session,
    pub user: UserInfo,
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthnOutcome::from_request_parts(parts, state).await? {
            AuthnOutcome::Authenticated { session, user, .. } => Ok(CurrentSession {
                session: *session,
                user,
            }),
            AuthnOutcome::Invalid => Err(AppError::unauthenticated("Provided session is invalid")),
            AuthnOutcome::Anonymous => Err(AppError::unauthenticated("Authentication required")),
        }
    }
}
