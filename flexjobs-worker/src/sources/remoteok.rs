/// RemoteOK JSON API
///
/// The API returns a JSON array whose first element is a legal notice,
/// followed by job objects.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{JobSource, RawJob, ScrapeError, ScrapeResult};

pub const NAME: &str = "remoteok";
const LABEL: &str = "RemoteOK";
const API_URL: &str = "https://remoteok.com/api";
const JOB_URL: &str = "https://remoteok.com/remote-jobs";

pub struct RemoteOkSource {
    client: reqwest::Client,
    limit: usize,
}

impl RemoteOkSource {
    pub fn new(client: reqwest::Client, limit: usize) -> Self {
        Self { client, limit }
    }
}

fn text(job: &Value, key: &str) -> Option<String> {
    match job.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn salary(job: &Value) -> Option<String> {
    let min = job.get("salary_min").and_then(Value::as_i64).filter(|n| *n > 0)?;
    let max = job.get("salary_max").and_then(Value::as_i64).filter(|n| *n > 0)?;
    Some(format!("${} - ${}", min, max))
}

/// Converts the API payload, skipping the leading notice
pub fn parse_listings(payload: Value, limit: usize) -> ScrapeResult<Vec<RawJob>> {
    let Value::Array(items) = payload else {
        return Err(ScrapeError::Parse("RemoteOK did not return an array".to_string()));
    };

    Ok(items
        .iter()
        .skip(1)
        .take(limit)
        .map(|job| RawJob {
            title: text(job, "position").unwrap_or_default(),
            company: text(job, "company").unwrap_or_default(),
            location: text(job, "location").or_else(|| Some("Remote".to_string())),
            description: text(job, "description"),
            salary: salary(job),
            url: text(job, "id").map(|id| format!("{}/{}", JOB_URL, id)),
            source: LABEL.to_string(),
        })
        .collect())
}

#[async_trait]
impl JobSource for RemoteOkSource {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, _cancel: &CancellationToken) -> ScrapeResult<Vec<RawJob>> {
        let payload: Value = self
            .client
            .get(API_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jobs = parse_listings(payload, self.limit)?;
        tracing::info!(count = jobs.len(), "Fetched RemoteOK listings");
        Ok(jobs)
    }
}
