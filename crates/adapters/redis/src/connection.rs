//! Redis 连接管理

use authgate_errors::{AppError, AppResult};
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::info;

use crate::RedisConfig;

/// 创建 Redis 连接管理器
///
/// 连接超时与响应超时由连接管理器统一控制，调用方不再单独包装 timeout
pub async fn create_connection_manager(config: &RedisConfig) -> AppResult<ConnectionManager> {
    let client = Client::open(config.url.as_str())
        .map_err(|e| AppError::internal(format!("Failed to create Redis client: {}", e)))?;

    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(config.connection_timeout)
        .set_response_timeout(config.response_timeout);

    let manager = ConnectionManager::new_with_config(client, manager_config)
        .await
        .map_err(|e| {
            AppError::internal(format!("Failed to create Redis connection manager: {}", e))
        })?;

    info!(
        connection_timeout_ms = config.connection_timeout.as_millis() as u64,
        response_timeout_ms = config.response_timeout.as_millis() as u64,
        "Redis connection manager created"
    );

    Ok(manager)
}

/// 检查 Redis 连接
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<()> {
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| AppError::internal(format!("Redis health check failed: {}", e)))?;
    Ok(())
}

/// 统一转换 Redis 错误
pub fn redis_error(operation: &str, err: redis::RedisError) -> AppError {
    if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
        AppError::external_service(format!("Redis {} failed: {}", operation, err))
    } else {
        AppError::internal(format!("Redis {} failed: {}", operation, err))
    }
}
