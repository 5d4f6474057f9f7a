//! User directory: loading and blocking user accounts.

use async_trait::async_trait;
use sqlx::PgPool;

use dormant_common::error::AppError;
use dormant_common::types::{UserId, UserRecord};

/// Read/deactivate access to user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Load a user, or `None` if the account no longer exists.
    async fn load_user(&self, user_id: UserId) -> Result<Option<UserRecord>, AppError>;

    /// Mark the account as blocked. Blocking a blocked account is a no-op.
    async fn block_user(&self, user_id: UserId) -> Result<(), AppError>;
}

/// PostgreSQL-backed directory over the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn load_user(&self, user_id: UserId) -> Result<Option<UserRecord>, AppError> {
        let user: Option<UserRecord> = sqlx::query_as(
            "SELECT id, name, email, preferred_language, blocked FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn block_user(&self, user_id: UserId) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET blocked = true, updated_at = NOW() WHERE id = $1 AND blocked = false",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(user_id, "User blocked");
        }

        Ok(())
    }
}
