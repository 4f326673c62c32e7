/// Scraper configuration
///
/// Read from `SCRAPER_*` environment variables through the `config`
/// crate. List values are comma-separated.
///
/// | Variable | Default |
/// |----------|---------|
/// | `SCRAPER_REQUEST_DELAY_MS` | 3000 |
/// | `SCRAPER_WRITE_DELAY_MS` | 100 |
/// | `SCRAPER_REMOTEOK_LIMIT` | 50 |
/// | `SCRAPER_SERP_RESULTS` | 20 |
/// | `SCRAPER_SERP_API_KEY` | unset, falls back to `SERP_API_KEY` |
/// | `SCRAPER_SEARCH_TERMS` | a dozen remote job queries |
/// | `SCRAPER_LOCATIONS` | United States, Remote, Worldwide |
/// | `SCRAPER_SOURCES` | remoteok, weworkremotely, google_jobs |
/// | `SCRAPER_SYSTEM_USER_ID` | 1 |
/// | `SCRAPER_DUPLICATE_WINDOW_DAYS` | 30 |
///
/// The database comes from `DATABASE_URL` like the API server.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

const LIST_KEYS: [&str; 3] = ["search_terms", "locations", "sources"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,

    #[error("Invalid scraper configuration: {0}")]
    Invalid(#[from] config::ConfigError),

    #[error("Invalid scraper configuration: {0}")]
    Value(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Pause between outbound requests to the same source
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Pause between job inserts
    #[serde(default = "default_write_delay_ms")]
    pub write_delay_ms: u64,

    #[serde(default = "default_remoteok_limit")]
    pub remoteok_limit: usize,

    /// Results requested per SerpAPI call
    #[serde(default = "default_serp_results")]
    pub serp_results: u32,

    #[serde(default)]
    pub serp_api_key: Option<String>,

    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,

    #[serde(default = "default_locations")]
    pub locations: Vec<String>,

    /// Enabled source names
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Owner of companies and jobs created by imports
    #[serde(default = "default_system_user_id")]
    pub system_user_id: i64,

    #[serde(default = "default_duplicate_window_days")]
    pub duplicate_window_days: i32,

    #[serde(skip)]
    pub database_url: String,
}

fn default_request_delay_ms() -> u64 {
    3000
}

fn default_write_delay_ms() -> u64 {
    100
}

fn default_remoteok_limit() -> usize {
    50
}

fn default_serp_results() -> u32 {
    20
}

fn default_search_terms() -> Vec<String> {
    [
        "remote software engineer",
        "remote frontend developer",
        "remote backend developer",
        "remote full stack developer",
        "remote data scientist",
        "remote marketing manager",
        "remote customer success",
        "remote product manager",
        "remote designer",
        "remote content writer",
        "remote sales representative",
        "remote project manager",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_locations() -> Vec<String> {
    ["United States", "Remote", "Worldwide"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sources() -> Vec<String> {
    ["remoteok", "weworkremotely", "google_jobs"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_system_user_id() -> i64 {
    1
}

fn default_duplicate_window_days() -> i32 {
    30
}

impl ScraperConfig {
    /// Loads from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(vars)
    }

    /// Loads from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .ok_or(ConfigError::MissingDatabaseUrl)?;
        let fallback_key = vars.get("SERP_API_KEY").cloned();

        let mut environment = config::Environment::with_prefix("SCRAPER")
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }

        let mut scraper: ScraperConfig = config::Config::builder()
            .add_source(environment.source(Some(vars)))
            .build()?
            .try_deserialize()?;

        scraper.database_url = database_url;
        if scraper.serp_api_key.as_deref().map_or(true, str::is_empty) {
            scraper.serp_api_key = fallback_key.filter(|k| !k.is_empty());
        }

        scraper.validate()?;
        Ok(scraper)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.system_user_id < 1 {
            return Err(ConfigError::Value("SCRAPER_SYSTEM_USER_ID must be positive".to_string()));
        }
        if self.duplicate_window_days < 1 {
            return Err(ConfigError::Value(
                "SCRAPER_DUPLICATE_WINDOW_DAYS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn source_enabled(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.trim().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::from_vars(vars(&[("DATABASE_URL", "postgresql://localhost/flexjobs")])).unwrap();

        assert_eq!(config.request_delay(), Duration::from_secs(3));
        assert_eq!(config.write_delay(), Duration::from_millis(100));
        assert_eq!(config.remoteok_limit, 50);
        assert_eq!(config.system_user_id, 1);
        assert_eq!(config.duplicate_window_days, 30);
        assert_eq!(config.search_terms.len(), 12);
        assert!(config.serp_api_key.is_none());
        assert!(config.source_enabled("remoteok"));
        assert!(config.source_enabled("google_jobs"));
    }

    #[test]
    fn test_overrides_and_lists() {
        let config = ScraperConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://localhost/flexjobs"),
            ("SCRAPER_REQUEST_DELAY_MS", "250"),
            ("SCRAPER_SEARCH_TERMS", "rust developer,remote sre"),
            ("SCRAPER_SOURCES", "remoteok"),
            ("SCRAPER_SYSTEM_USER_ID", "42"),
        ]))
        .unwrap();

        assert_eq!(config.request_delay_ms, 250);
        assert_eq!(config.search_terms, vec!["rust developer", "remote sre"]);
        assert_eq!(config.system_user_id, 42);
        assert!(config.source_enabled("RemoteOK"));
        assert!(!config.source_enabled("weworkremotely"));
    }

    #[test]
    fn test_serp_key_fallback() {
        let config = ScraperConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://localhost/flexjobs"),
            ("SERP_API_KEY", "plain-key"),
        ]))
        .unwrap();
        assert_eq!(config.serp_api_key.as_deref(), Some("plain-key"));

        let config = ScraperConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://localhost/flexjobs"),
            ("SERP_API_KEY", "plain-key"),
            ("SCRAPER_SERP_API_KEY", "scoped-key"),
        ]))
        .unwrap();
        assert_eq!(config.serp_api_key.as_deref(), Some("scoped-key"));
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(
            ScraperConfig::from_vars(HashMap::new()),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn test_rejects_bad_system_user() {
        let result = ScraperConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://localhost/flexjobs"),
            ("SCRAPER_SYSTEM_USER_ID", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::Value(_))));
    }
}
