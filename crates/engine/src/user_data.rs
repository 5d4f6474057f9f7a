//! Per-user persisted state of the inactive users process.
//!
//! Two values are kept per user in the generic `users_data` key/value store:
//!
//! - `inactive_user_sent_email`: the stage the next notification targets, i.e.
//!   the highest stage already sent plus one. Only ever moves forward.
//! - `inactive_user_auto_blocked`: set once the account was blocked by the
//!   old users worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use dormant_common::error::AppError;
use dormant_common::types::UserId;

/// Namespace under which this process keeps its user data.
pub const NAMESPACE: &str = "dormant";

pub const SENT_EMAIL_KEY: &str = "inactive_user_sent_email";
pub const AUTO_BLOCKED_KEY: &str = "inactive_user_auto_blocked";

/// Per-namespace, per-user, per-key value storage.
#[async_trait]
pub trait UserDataStore: Send + Sync {
    async fn get(
        &self,
        namespace: &str,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Value>, AppError>;

    async fn set(
        &self,
        namespace: &str,
        user_id: UserId,
        key: &str,
        value: Value,
    ) -> Result<(), AppError>;
}

/// PostgreSQL-backed store over the `users_data` table.
#[derive(Clone)]
pub struct PgUserDataStore {
    pool: PgPool,
}

impl PgUserDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDataStore for PgUserDataStore {
    async fn get(
        &self,
        namespace: &str,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Value>, AppError> {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT value FROM users_data WHERE namespace = $1 AND user_id = $2 AND key = $3",
        )
        .bind(namespace)
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(
        &self,
        namespace: &str,
        user_id: UserId,
        key: &str,
        value: Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users_data (namespace, user_id, key, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (namespace, user_id, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(namespace)
        .bind(user_id)
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDataStore {
    values: Arc<Mutex<HashMap<(String, UserId, String), Value>>>,
}

impl MemoryUserDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDataStore for MemoryUserDataStore {
    async fn get(
        &self,
        namespace: &str,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Value>, AppError> {
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("user data lock poisoned".to_string()))?;
        Ok(values
            .get(&(namespace.to_string(), user_id, key.to_string()))
            .cloned())
    }

    async fn set(
        &self,
        namespace: &str,
        user_id: UserId,
        key: &str,
        value: Value,
    ) -> Result<(), AppError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("user data lock poisoned".to_string()))?;
        values.insert((namespace.to_string(), user_id, key.to_string()), value);
        Ok(())
    }
}

/// Typed view of the two per-user values over any [`UserDataStore`].
#[derive(Clone)]
pub struct NotificationState {
    store: Arc<dyn UserDataStore>,
}

impl NotificationState {
    pub fn new(store: Arc<dyn UserDataStore>) -> Self {
        Self { store }
    }

    /// The stage the next notification targets (0 if none was sent yet).
    pub async fn sent_stage(&self, user_id: UserId) -> Result<u64, AppError> {
        let value = self.store.get(NAMESPACE, user_id, SENT_EMAIL_KEY).await?;
        Ok(value.as_ref().and_then(Value::as_u64).unwrap_or(0))
    }

    /// Record that the notification for `notify_stage` went out.
    ///
    /// Moves the counter to `notify_stage + 1` unless it is already there or
    /// beyond. Returns the counter value after the call.
    pub async fn record_sent(&self, user_id: UserId, notify_stage: usize) -> Result<u64, AppError> {
        let next = notify_stage as u64 + 1;
        let current = self.sent_stage(user_id).await?;
        if current >= next {
            tracing::debug!(
                user_id,
                current,
                next,
                "Notification counter already ahead, leaving it"
            );
            return Ok(current);
        }

        self.store
            .set(NAMESPACE, user_id, SENT_EMAIL_KEY, Value::from(next))
            .await?;
        Ok(next)
    }

    pub async fn is_auto_blocked(&self, user_id: UserId) -> Result<bool, AppError> {
        let value = self.store.get(NAMESPACE, user_id, AUTO_BLOCKED_KEY).await?;
        Ok(match value {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Number(n)) => n.as_u64() == Some(1),
            _ => false,
        })
    }

    pub async fn mark_auto_blocked(&self, user_id: UserId) -> Result<(), AppError> {
        self.store
            .set(NAMESPACE, user_id, AUTO_BLOCKED_KEY, Value::Bool(true))
            .await
    }
}
