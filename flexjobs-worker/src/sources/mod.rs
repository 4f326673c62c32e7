/// Job listing sources
///
/// Each source fetches listings from one third-party board and hands
/// them over as [`RawJob`]s. Sources never touch the database; the
/// [`crate::ingest`] module decides what gets saved.
///
/// # Sources
///
/// - **remoteok**: RemoteOK JSON API
/// - **weworkremotely**: WeWorkRemotely RSS feed
/// - **google_jobs**: Google Jobs through SerpAPI, only with an API key
///
/// # Cancellation
///
/// Sources that make several requests check the cancel token between
/// them and return what they have so far.

pub mod remoteok;
pub mod serpapi;
pub mod weworkremotely;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::ScraperConfig;

pub use remoteok::RemoteOkSource;
pub use serpapi::GoogleJobsSource;
pub use weworkremotely::WeWorkRemotelySource;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; FlexJobsScraper/1.0; +https://flexjobs.example)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Parse(String),
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// A listing as scraped, before cleanup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawJob {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Free-form salary text, parsed during ingestion
    pub salary: Option<String>,
    pub url: Option<String>,
    /// Source label stored on the job row
    pub source: String,
}

#[async_trait]
pub trait JobSource: Send + Sync {
    /// Short identifier used in config and logs
    fn name(&self) -> &'static str;

    async fn fetch(&self, cancel: &CancellationToken) -> ScrapeResult<Vec<RawJob>>;
}

/// HTTP client shared by all sources
pub fn http_client() -> ScrapeResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Sleeps for `delay` unless cancelled first; returns false on cancel
pub async fn polite_pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Sources enabled by the configuration, in run order
pub fn enabled_sources(config: &ScraperConfig) -> ScrapeResult<Vec<Box<dyn JobSource>>> {
    let client = http_client()?;
    let mut sources: Vec<Box<dyn JobSource>> = Vec::new();

    if config.source_enabled(remoteok::NAME) {
        sources.push(Box::new(RemoteOkSource::new(client.clone(), config.remoteok_limit)));
    }

    if config.source_enabled(weworkremotely::NAME) {
        sources.push(Box::new(WeWorkRemotelySource::new(client.clone())));
    }

    if config.source_enabled(serpapi::NAME) {
        match &config.serp_api_key {
            Some(key) => sources.push(Box::new(GoogleJobsSource::new(
                client,
                key.clone(),
                config.search_terms.clone(),
                config.locations.clone(),
                config.serp_results,
                config.request_delay(),
            ))),
            None => tracing::warn!("SERP_API_KEY not set, skipping Google Jobs"),
        }
    }

    Ok(sources)
}

/// Fixed listings for tests
#[cfg(test)]
pub struct StaticSource {
    name: &'static str,
    jobs: Vec<RawJob>,
    fail: bool,
}

#[cfg(test)]
impl StaticSource {
    pub fn new(name: &'static str, jobs: Vec<RawJob>) -> Self {
        Self {
            name,
            jobs,
            fail: false,
        }
    }

    /// A source whose fetch always errors
    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            jobs: Vec::new(),
            fail: true,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl JobSource for StaticSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _cancel: &CancellationToken) -> ScrapeResult<Vec<RawJob>> {
        if self.fail {
            return Err(ScrapeError::Parse(format!("{} is unavailable", self.name)));
        }
        Ok(self.jobs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(sources: &str, serp_key: Option<&str>) -> ScraperConfig {
        let mut vars = HashMap::from([
            ("DATABASE_URL".to_string(), "postgresql://localhost/flexjobs".to_string()),
            ("SCRAPER_SOURCES".to_string(), sources.to_string()),
        ]);
        if let Some(key) = serp_key {
            vars.insert("SERP_API_KEY".to_string(), key.to_string());
        }
        ScraperConfig::from_vars(vars).unwrap()
    }

    #[test]
    fn test_enabled_sources_follow_config() {
        let names: Vec<_> = enabled_sources(&config("weworkremotely,remoteok", None))
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["remoteok", "weworkremotely"]);
    }

    #[test]
    fn test_google_jobs_needs_key() {
        assert!(enabled_sources(&config("google_jobs", None)).unwrap().is_empty());

        let sources = enabled_sources(&config("google_jobs", Some("key"))).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "google_jobs");
    }

    #[tokio::test]
    async fn test_polite_pause_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!polite_pause(Duration::from_secs(60), &cancel).await);

        let cancel = CancellationToken::new();
        assert!(polite_pause(Duration::from_millis(1), &cancel).await);
    }
}
