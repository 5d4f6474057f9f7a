use redis::Client;
use redis::aio::ConnectionManager;

/// Connect the manager shared by every work queue and consumer lease.
///
/// Each queue and lease holds its own clone; the manager reconnects on its own
/// when Redis goes away, so a dropped connection surfaces as a transient error
/// on the item being processed rather than ending the worker.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
