//! 请求上下文
//!
//! 每个请求构造一次，之后只读，显式传递给提供者与解析器

use axum::http::{HeaderMap, HeaderName};
use authgate_common::{ClientId, RequestId};
use authgate_config::SessionConfig;
use authgate_errors::{AppError, AppResult};

use crate::domain::access_event::{ExtraInfoPolicy, RequestMeta};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// 构造请求上下文所需的设置
#[derive(Debug, Clone)]
pub struct RequestContextSettings {
    pub client_id_header: HeaderName,
    pub extra_info: ExtraInfoPolicy,
}

impl RequestContextSettings {
    pub fn from_config(config: &SessionConfig) -> AppResult<Self> {
        let client_id_header = HeaderName::try_from(config.client_id_header.as_str())
            .map_err(|e| AppError::validation(format!("Invalid client id header: {}", e)))?;

        Ok(Self {
            client_id_header,
            extra_info: ExtraInfoPolicy {
                header: config.extra_info_header.to_ascii_lowercase(),
                max_bytes: config.extra_info_max_bytes,
                max_keys: config.extra_info_max_keys,
            },
        })
    }
}

impl Default for RequestContextSettings {
    fn default() -> Self {
        Self {
            client_id_header: HeaderName::from_static("x-authgate-client-id"),
            extra_info: ExtraInfoPolicy::default(),
        }
    }
}

/// 请求上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// 当前请求所属的客户端
    pub client_id: Option<ClientId>,
    pub meta: RequestMeta,
}

impl RequestContext {
    pub fn new(client_id: Option<ClientId>, meta: RequestMeta) -> Self {
        Self {
            request_id: RequestId::new(),
            client_id,
            meta,
        }
    }

    pub fn from_headers(
        headers: &HeaderMap,
        remote_addr: Option<String>,
        settings: &RequestContextSettings,
    ) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(RequestId::from)
            .unwrap_or_default();

        let client_id = headers
            .get(&settings.client_id_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ClientId::from);

        Self {
            request_id,
            client_id,
            meta: RequestMeta::from_headers(headers, remote_addr, &settings.extra_info),
        }
    }

    /// 用于测试与内部调用：指定客户端、无连接信息
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self::new(Some(ClientId::new(client_id)), RequestMeta::default())
    }
}
