use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (work queues)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Canonical site URL substituted for `@site-url` in notification emails
    pub site_url: String,

    /// Outgoing site address used as the sender of every notification
    pub email_from: String,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Resend API base URL (default: https://api.resend.com)
    pub resend_api_url: String,

    /// Upper bound on a single mail delivery request, in seconds (default: 10)
    pub mail_timeout_secs: u64,

    /// Interval between queue drain runs, in seconds (default: 60)
    pub queue_interval_secs: u64,

    /// Time budget of a single drain run, in seconds (default: 90)
    pub queue_time_budget_secs: u64,

    /// Optional cap on notification delivery attempts. Unset means retry forever.
    pub queue_max_attempts: Option<u32>,

    /// TTL of a queue consumer lease, in seconds (default: 300)
    pub queue_lease_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            site_url: std::env::var("SITE_URL")
                .map_err(|_| anyhow::anyhow!("SITE_URL environment variable is required"))?
                .trim_end_matches('/')
                .to_string(),
            email_from: std::env::var("EMAIL_FROM")
                .map_err(|_| anyhow::anyhow!("EMAIL_FROM environment variable is required"))?,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            resend_api_url: std::env::var("RESEND_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            mail_timeout_secs: std::env::var("MAIL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAIL_TIMEOUT_SECS must be a valid u64"))?,
            queue_interval_secs: std::env::var("QUEUE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_INTERVAL_SECS must be a valid u64"))?,
            queue_time_budget_secs: std::env::var("QUEUE_TIME_BUDGET_SECS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_TIME_BUDGET_SECS must be a valid u64"))?,
            queue_max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .map_err(|_| anyhow::anyhow!("QUEUE_MAX_ATTEMPTS must be a valid u32"))?,
            queue_lease_secs: std::env::var("QUEUE_LEASE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_LEASE_SECS must be a valid u64"))?,
        };

        config.check_lease()?;
        Ok(config)
    }

    /// A lease is renewed once per tick, so it has to outlive the interval plus
    /// one full drain run, whose last item may take up to the mail timeout.
    pub fn check_lease(&self) -> anyhow::Result<()> {
        let longest_gap =
            self.queue_interval_secs + self.queue_time_budget_secs + self.mail_timeout_secs;
        if self.queue_lease_secs <= longest_gap {
            anyhow::bail!(
                "QUEUE_LEASE_SECS ({}) must exceed QUEUE_INTERVAL_SECS + QUEUE_TIME_BUDGET_SECS + MAIL_TIMEOUT_SECS ({})",
                self.queue_lease_secs,
                longest_gap
            );
        }
        Ok(())
    }

    pub fn queue_interval(&self) -> Duration {
        Duration::from_secs(self.queue_interval_secs)
    }

    pub fn queue_time_budget(&self) -> Duration {
        Duration::from_secs(self.queue_time_budget_secs)
    }

    pub fn mail_timeout(&self) -> Duration {
        Duration::from_secs(self.mail_timeout_secs)
    }
}
