//! # FlexJobs Scraper
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/flexjobs cargo run -p flexjobs-worker
//! ```
//!
//! Ctrl-C stops the run after the current source; listings already
//! fetched are still saved.

use flexjobs_shared::db::pool::{connect, PoolSettings};
use flexjobs_worker::{config::ScraperConfig, ingest::Ingestor, sources::enabled_sources};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flexjobs_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("FlexJobs Scraper v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = ScraperConfig::from_env()?;

    let pool = connect(&PoolSettings::new(config.database_url.as_str()).max_connections(MAX_CONNECTIONS)).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing current source...");
                cancel.cancel();
            }
        }
    });

    let sources = enabled_sources(&config)?;
    if sources.is_empty() {
        tracing::warn!("No sources enabled, nothing to do");
        pool.close().await;
        return Ok(());
    }

    let mut ingestor = Ingestor::new(pool.clone(), config).await?;
    let summary = ingestor.run(&sources, &cancel).await;

    for (source, report) in &summary.per_source {
        tracing::info!(
            source,
            scraped = report.scraped,
            saved = report.saved,
            failed = report.failed,
            "Source finished"
        );
    }
    tracing::info!(
        total_scraped = summary.total_scraped,
        total_saved = summary.total_saved,
        cancelled = summary.cancelled,
        "Scrape complete"
    );

    pool.close().await;
    Ok(())
}
