/// PostgreSQL connection pool
///
/// # Example
///
/// ```no_run
/// use flexjobs_shared::db::pool::{connect, PoolSettings};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = connect(&PoolSettings::new("postgresql://localhost/flexjobs").max_connections(20)).await?;
///
///     let (jobs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE is_active")
///         .fetch_one(&pool)
///         .await?;
///     println!("{} open jobs", jobs);
///     Ok(())
/// }
/// ```

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

/// Settings for [`connect`]
///
/// The API serves with the defaults (ten connections, idle connections
/// dropped after ten minutes). The scraper runs with a handful.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self.min_connections = self.min_connections.min(self.max_connections);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Opens the pool and pings the server once before returning it
pub async fn connect(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = settings.max_connections,
        acquire_timeout_secs = settings.acquire_timeout.as_secs(),
        "Connecting to PostgreSQL"
    );

    let pool = settings.options().connect(&settings.url).await?;
    ping(&pool).await?;

    info!("Database pool ready");
    Ok(pool)
}

/// `SELECT 1` round trip, used at startup and by `/api/health`
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    debug!(result = one, "Database ping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = PoolSettings::new("postgresql://localhost/flexjobs");
        assert_eq!(settings.url, "postgresql://localhost/flexjobs");
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.idle_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_max_connections_never_zero() {
        let settings = PoolSettings::new("postgresql://localhost/flexjobs").max_connections(0);
        assert_eq!(settings.max_connections, 1);
        assert!(settings.min_connections <= settings.max_connections);
    }
}
