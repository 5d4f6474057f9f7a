//! Settings provider: the admin-managed stage table, template and role list.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use dormant_common::error::AppError;
use dormant_common::types::InactiveUsersSettings;

/// Read-only access to the inactive users settings.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn load(&self) -> Result<InactiveUsersSettings, AppError>;
}

/// Reads the single-row `inactive_users_settings` table.
///
/// Loaded on every call so admin edits take effect on the next work item.
#[derive(Clone)]
pub struct PgSettingsProvider {
    pool: PgPool,
}

impl PgSettingsProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    stages: String,
    email_template: Option<String>,
    exclude_roles: Json<Vec<String>>,
}

#[async_trait]
impl SettingsProvider for PgSettingsProvider {
    async fn load(&self) -> Result<InactiveUsersSettings, AppError> {
        let row: Option<SettingsRow> = sqlx::query_as(
            "SELECT stages, email_template, exclude_roles FROM inactive_users_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        // No row yet means nothing has been configured: an empty stage table.
        Ok(row
            .map(|row| InactiveUsersSettings {
                stages: row.stages,
                email_template: row.email_template,
                exclude_roles: row.exclude_roles.0,
            })
            .unwrap_or_default())
    }
}

/// Settings fixed at construction. Used by tests and one-off tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub InactiveUsersSettings);

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn load(&self) -> Result<InactiveUsersSettings, AppError> {
        Ok(self.0.clone())
    }
}
