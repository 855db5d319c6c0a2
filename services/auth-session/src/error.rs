//! 服务错误定义

use authgate_errors::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// 令牌形状错误、ID 不存在、类型不匹配、已过期、客户端禁用或缺失
    #[error("Session not found")]
    NotFound,

    /// 请求携带了凭据但被拒绝，仅由解析层产生
    #[error("Provided session is invalid")]
    Invalid,

    #[error(transparent)]
    Store(#[from] AppError),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => AppError::not_found("Session not found"),
            SessionError::Invalid => AppError::unauthenticated("Provided session is invalid"),
            SessionError::Store(e) => e,
        }
    }
}
