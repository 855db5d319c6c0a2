//! authgate-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范，5xx 不向调用方暴露内部信息

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Redis 等外部依赖不可达
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        self.descriptor().0
    }

    /// 是否为服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        let (status, slug, title) = self.descriptor();
        ProblemDetails {
            r#type: format!("https://authgate.dev/problems/{}", slug),
            title: title.to_string(),
            status,
            detail: if self.is_server_error() {
                INTERNAL_FAILURE_DETAIL.to_string()
            } else {
                self.to_string()
            },
            instance: None,
        }
    }

    /// (状态码, 类型后缀, 标题)
    fn descriptor(&self) -> (u16, &'static str, &'static str) {
        match self {
            Self::NotFound(_) => (404, "not-found", "Resource Not Found"),
            Self::Validation(_) => (400, "validation", "Validation Error"),
            Self::Unauthenticated(_) => (401, "unauthenticated", "Unauthenticated"),
            Self::FailedPrecondition(_) => (412, "failed-precondition", "Failed Precondition"),
            Self::Internal(_) => (500, "internal", "Internal Server Error"),
            Self::Database(_) => (500, "database", "Database Error"),
            Self::ExternalService(_) => (502, "external-service", "External Service Error"),
        }
    }
}

/// 5xx 响应中返回的固定描述，内部错误信息只写日志
pub const INTERNAL_FAILURE_DETAIL: &str = "internal failure";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_problem_details())).into_response()
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
