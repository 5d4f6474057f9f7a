//! Dormant worker binary: drains the inactive users and old users queues.

use std::sync::Arc;

use dormant_common::config::AppConfig;
use dormant_common::db;
use dormant_common::redis_pool::create_redis_pool;
use dormant_common::types::{BlockWorkItem, NotificationWorkItem};
use dormant_engine::directory::PgUserDirectory;
use dormant_engine::dispatcher::{NotificationDispatcher, SiteContext};
use dormant_engine::lease::RedisLease;
use dormant_engine::queue::{INACTIVE_USERS_QUEUE, OLD_USERS_QUEUE, RedisQueue, WorkQueue};
use dormant_engine::runner::QueueRunner;
use dormant_engine::settings::PgSettingsProvider;
use dormant_engine::user_data::{NotificationState, PgUserDataStore};
use dormant_engine::workers::{InactiveUsersWorker, OldUsersWorker};
use dormant_notifier::ResendMailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dormant_worker=info,dormant_engine=info,dormant_notifier=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Dormant worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let api_key = config
        .resend_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("RESEND_API_KEY environment variable is required"))?;

    // Connect to database and apply migrations
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::migrate(&pool).await?;

    // Connect to Redis. Unacknowledged items are recovered by whichever
    // instance takes over a queue's consumer lease.
    let redis = create_redis_pool(&config.redis_url).await?;
    let instance_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(instance_id = %instance_id, "Worker instance registered");

    let inactive_queue: Arc<dyn WorkQueue<NotificationWorkItem>> = Arc::new(
        RedisQueue::<NotificationWorkItem>::new(redis.clone(), INACTIVE_USERS_QUEUE),
    );
    let old_users_queue: Arc<dyn WorkQueue<BlockWorkItem>> =
        Arc::new(RedisQueue::<BlockWorkItem>::new(redis.clone(), OLD_USERS_QUEUE));
    let inactive_lease = Arc::new(RedisLease::new(
        redis.clone(),
        INACTIVE_USERS_QUEUE,
        &instance_id,
        config.queue_lease_secs,
    ));
    let old_users_lease = Arc::new(RedisLease::new(
        redis,
        OLD_USERS_QUEUE,
        &instance_id,
        config.queue_lease_secs,
    ));

    // Collaborators
    let users = Arc::new(PgUserDirectory::new(pool.clone()));
    let state = NotificationState::new(Arc::new(PgUserDataStore::new(pool.clone())));
    let mailer = Arc::new(ResendMailer::new(
        &config.resend_api_url,
        &api_key,
        config.mail_timeout(),
    )?);
    let site = SiteContext {
        site_url: config.site_url.clone(),
        mail_from: config.email_from.clone(),
    };

    let dispatcher = NotificationDispatcher::new(
        Arc::new(PgSettingsProvider::new(pool.clone())),
        users.clone(),
        mailer,
        site,
    );

    let inactive_runner = QueueRunner::new(
        InactiveUsersWorker::new(dispatcher, state.clone())
            .with_max_attempts(config.queue_max_attempts),
        inactive_queue,
        config.queue_interval(),
        config.queue_time_budget(),
    )
    .with_lease(inactive_lease);
    let old_users_runner = QueueRunner::new(
        OldUsersWorker::new(users, state),
        old_users_queue,
        config.queue_interval(),
        config.queue_time_budget(),
    )
    .with_lease(old_users_lease);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = inactive_runner.run() => {}
        _ = old_users_runner.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    inactive_runner.shutdown().await;
    old_users_runner.shutdown().await;

    tracing::info!("Dormant worker stopped.");
    Ok(())
}
