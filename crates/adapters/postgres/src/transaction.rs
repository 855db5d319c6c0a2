//! PostgreSQL 事务管理
//!
//! 会话解析只需要读取用户表，所有读取都在一个只读快照中完成

use authgate_errors::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

/// 只读快照事务的设置语句
pub const READ_ONLY_SNAPSHOT_SQL: &str =
    "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

/// 事务管理器
#[derive(Clone)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 开始只读事务
    ///
    /// REPEATABLE READ 保证同一请求内多次读取看到同一快照
    pub async fn begin_readonly(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(READ_ONLY_SNAPSHOT_SQL)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to enter read-only snapshot: {}", e)))?;

        debug!("Read-only snapshot started");
        Ok(tx)
    }

    /// 结束事务
    ///
    /// 只读事务没有写入，提交只是释放快照
    pub async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transaction: {}", e)))
    }
}
