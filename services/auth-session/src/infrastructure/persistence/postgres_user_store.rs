//! PostgreSQL 用户存储
//!
//! 在 REPEATABLE READ, READ ONLY 事务中读取 `user_auth`

use async_trait::async_trait;
use authgate_adapter_postgres::TransactionManager;
use authgate_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};

use crate::domain::repositories::{UserReadScope, UserStore};
use crate::domain::user::UserRecord;

pub struct PostgresUserStore {
    tx_manager: TransactionManager,
}

impl PostgresUserStore {
    pub fn new(tx_manager: TransactionManager) -> Self {
        Self { tx_manager }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn begin_read_only(&self) -> AppResult<Box<dyn UserReadScope>> {
        let tx = self.tx_manager.begin_readonly().await?;
        Ok(Box::new(PostgresUserReadScope { tx }))
    }
}

#[derive(sqlx::FromRow)]
struct UserAuthRow {
    id: String,
    is_verified: bool,
    is_disabled: bool,
    disabled_message: Option<String>,
    disabled_expiry: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
}

impl From<UserAuthRow> for UserRecord {
    fn from(row: UserAuthRow) -> Self {
        Self {
            id: row.id,
            verified: row.is_verified,
            disabled: row.is_disabled,
            disabled_message: row.disabled_message,
            disabled_expiry: row.disabled_expiry,
            last_login_at: row.last_login_at,
        }
    }
}

struct PostgresUserReadScope {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UserReadScope for PostgresUserReadScope {
    async fn get_auth(&mut self, user_id: &str) -> AppResult<Option<UserRecord>> {
        debug!(user_id = %user_id, "Loading user auth record");

        let row = sqlx::query_as::<_, UserAuthRow>(
            r#"
            SELECT id, is_verified, is_disabled, disabled_message, disabled_expiry, last_login_at
            FROM user_auth
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to load user auth record");
            AppError::database(format!("Failed to load user auth record: {}", e))
        })?;

        Ok(row.map(UserRecord::from))
    }

    async fn finish(self: Box<Self>) -> AppResult<()> {
        TransactionManager::commit(self.tx).await
    }
}
