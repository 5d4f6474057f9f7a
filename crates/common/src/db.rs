use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create the pool behind the user directory, the settings provider and the
/// per-user notification state.
///
/// Both queue runners share it, so `AppConfig::db_max_connections` only needs
/// to cover a couple of concurrent queries per worker.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Create or update the `users`, `users_data` and `inactive_users_settings` tables.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
