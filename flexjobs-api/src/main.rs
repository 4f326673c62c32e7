//! # FlexJobs API Server
//!
//! REST API for the job board plus the static frontend.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p flexjobs-api
//! ```

use std::net::SocketAddr;

use flexjobs_api::{
    app::{build_router, AppState},
    bootstrap::ensure_admin,
    config::{Config, LogFormat},
    middleware::rate_limit::RateLimiter,
};
use flexjobs_shared::db::{
    migrations::run_migrations,
    pool::{connect, PoolSettings},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flexjobs_api=debug,tower_http=debug".into());

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!("FlexJobs API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let pool = connect(
        &PoolSettings::new(config.database.url.as_str())
            .max_connections(config.database.max_connections),
    )
    .await?;

    run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    if let Some(seed) = &config.admin_seed {
        ensure_admin(&pool, seed).await?;
    }

    let (general, strict) = rate_limiters(&config).await?;
    let bind_address = config.bind_address();
    let state = AppState::with_limiters(pool.clone(), config, general, strict);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn rate_limiters(config: &Config) -> anyhow::Result<(RateLimiter, RateLimiter)> {
    let limits = &config.rate_limit;
    let window = limits.window_seconds();

    let (general, strict) = match &limits.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let manager = redis::aio::ConnectionManager::new(client).await?;
            tracing::info!(trust_proxy = limits.trust_proxy, "Rate limiting backed by Redis");
            (
                RateLimiter::redis("general", limits.max_requests, window, manager.clone()),
                RateLimiter::redis("strict", limits.strict_max_requests, window, manager),
            )
        }
        None => {
            tracing::info!(trust_proxy = limits.trust_proxy, "Rate limiting in memory");
            (
                RateLimiter::in_memory("general", limits.max_requests, window),
                RateLimiter::in_memory("strict", limits.strict_max_requests, window),
            )
        }
    };

    Ok((
        general.trust_forwarded_for(limits.trust_proxy),
        strict.trust_forwarded_for(limits.trust_proxy),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
