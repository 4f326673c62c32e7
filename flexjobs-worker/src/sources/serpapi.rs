/// Google Jobs through SerpAPI
///
/// One request per (search term, location) pair, paced by the configured
/// request delay. A failed pair is logged and skipped.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{polite_pause, JobSource, RawJob, ScrapeResult};

pub const NAME: &str = "google_jobs";
const LABEL: &str = "Google Jobs (SerpAPI)";
const SEARCH_URL: &str = "https://serpapi.com/search";

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub jobs_results: Vec<SerpJob>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SerpJob {
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub apply_link: Option<String>,
    pub share_link: Option<String>,
    #[serde(default)]
    pub apply_options: Vec<ApplyOption>,
    pub detected_extensions: Option<DetectedExtensions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyOption {
    pub link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectedExtensions {
    pub salary: Option<String>,
    pub work_from_home: Option<bool>,
}

impl From<SerpJob> for RawJob {
    fn from(job: SerpJob) -> Self {
        let extensions = job.detected_extensions.unwrap_or_default();
        let url = job
            .apply_link
            .or_else(|| job.apply_options.into_iter().find_map(|o| o.link))
            .or(job.share_link);
        let location = match (job.location, extensions.work_from_home) {
            (Some(loc), Some(true)) if !loc.to_lowercase().contains("remote") => {
                Some(format!("{} (Remote)", loc))
            }
            (Some(loc), _) => Some(loc),
            (None, _) => Some("Remote".to_string()),
        };

        RawJob {
            title: job.title.unwrap_or_default(),
            company: job.company_name.unwrap_or_default(),
            location,
            description: job.description,
            salary: job.salary.or(extensions.salary),
            url,
            source: LABEL.to_string(),
        }
    }
}

pub struct GoogleJobsSource {
    client: reqwest::Client,
    api_key: String,
    queries: Vec<String>,
    locations: Vec<String>,
    results_per_query: u32,
    delay: Duration,
}

impl GoogleJobsSource {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        queries: Vec<String>,
        locations: Vec<String>,
        results_per_query: u32,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            queries,
            locations,
            results_per_query,
            delay,
        }
    }

    async fn search(&self, query: &str, location: &str) -> ScrapeResult<Vec<RawJob>> {
        let num = self.results_per_query.to_string();
        let response: SearchResponse = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("engine", "google_jobs"),
                ("q", query),
                ("location", location),
                ("api_key", self.api_key.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.jobs_results.into_iter().map(RawJob::from).collect())
    }
}

#[async_trait]
impl JobSource for GoogleJobsSource {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, cancel: &CancellationToken) -> ScrapeResult<Vec<RawJob>> {
        let mut jobs = Vec::new();

        'outer: for query in &self.queries {
            for location in &self.locations {
                if cancel.is_cancelled() {
                    break 'outer;
                }

                match self.search(query, location).await {
                    Ok(found) => {
                        tracing::info!(query = %query, location = %location, count = found.len(), "Google Jobs search");
                        jobs.extend(found);
                    }
                    Err(e) => {
                        // The error text can include the request URL; keep the key out of logs
                        let message = e.to_string().replace(&self.api_key, "***");
                        tracing::warn!(query = %query, location = %location, error = %message, "Google Jobs search failed");
                    }
                }

                if !polite_pause(self.delay, cancel).await {
                    break 'outer;
                }
            }
        }

        Ok(jobs)
    }
}
