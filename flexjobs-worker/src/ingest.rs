/// Saving scraped listings as jobs
///
/// # Flow
///
/// ```text
/// run()
///   ├─> collect(): each source in turn, failures logged and skipped
///   └─> save() per listing
///         ├─> skip without title or company
///         ├─> company: cache, then lookup by name, then insert
///         ├─> category: heuristics, then cache by lowercase name
///         ├─> skip when the same title and company was posted recently
///         └─> insert with source and application URL
/// ```
///
/// Companies created here are owned by the configured system user.

use std::collections::{BTreeMap, HashMap};

use flexjobs_shared::models::{
    category::Category,
    company::{Company, CreateCompany},
    job::{CreateJob, Job, JobType, RemoteType},
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::ScraperConfig;
use crate::heuristics::{clean_name, clean_text, determine_remote_type, Heuristics};
use crate::sources::{JobSource, RawJob};

const DEFAULT_CURRENCY: &str = "USD";
const NO_DESCRIPTION: &str = "No description available";
const DEFAULT_LOCATION: &str = "Remote";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Per-source counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub scraped: usize,
    pub saved: usize,
    pub failed: bool,
}

/// Outcome of a scraper run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub total_scraped: usize,
    pub total_saved: usize,
    pub per_source: BTreeMap<&'static str, SourceReport>,
    pub cancelled: bool,
}

/// A listing after cleanup, before company and category are resolved
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    pub title: String,
    pub company: String,
    pub description: String,
    pub requirements: Option<String>,
    pub location: String,
    pub category: &'static str,
    pub remote_type: RemoteType,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub application_url: Option<String>,
    pub source: String,
}

impl JobDraft {
    /// `None` when the listing has no usable title or company
    pub fn from_raw(raw: &RawJob, heuristics: &Heuristics) -> Option<Self> {
        let title = clean_name(&raw.title);
        let company = clean_name(&raw.company);
        if title.is_empty() || company.is_empty() {
            return None;
        }

        let summary = raw.description.as_deref().unwrap_or("");
        let location = raw.location.as_deref().unwrap_or(DEFAULT_LOCATION);
        let (salary_min, salary_max) = raw
            .salary
            .as_deref()
            .map(|s| heuristics.parse_salary(s))
            .unwrap_or((None, None));

        let description = clean_text(summary);
        let location = clean_name(location);

        Some(Self {
            category: heuristics.determine_category(&raw.title, summary),
            remote_type: determine_remote_type(location.as_str(), &raw.title, summary),
            requirements: heuristics.extract_requirements(summary).map(|r| clean_text(&r)),
            description: if description.is_empty() {
                NO_DESCRIPTION.to_string()
            } else {
                description
            },
            location: if location.is_empty() {
                DEFAULT_LOCATION.to_string()
            } else {
                location
            },
            salary_min,
            salary_max,
            application_url: raw.url.clone(),
            source: raw.source.clone(),
            title,
            company,
        })
    }

    fn into_create(self, company_id: i64, category_id: Option<i64>, created_by: i64) -> CreateJob {
        CreateJob {
            title: self.title,
            description: self.description,
            requirements: self.requirements,
            responsibilities: None,
            company_id,
            category_id,
            location: Some(self.location),
            job_type: JobType::FullTime,
            remote_type: self.remote_type,
            experience_level: None,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            salary_currency: DEFAULT_CURRENCY.to_string(),
            benefits: None,
            application_deadline: None,
            application_url: self.application_url,
            source: Some(self.source),
            created_by: Some(created_by),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(i64),
    Duplicate,
    Skipped,
}

/// Runs every source in order, stopping early on cancel
///
/// Returns listings grouped by source name plus whether the run was cut short.
pub async fn collect(
    sources: &[Box<dyn JobSource>],
    cancel: &CancellationToken,
) -> (Vec<(&'static str, Option<Vec<RawJob>>)>, bool) {
    let mut collected = Vec::with_capacity(sources.len());

    for source in sources {
        if cancel.is_cancelled() {
            tracing::warn!(source = source.name(), "Cancelled before source");
            return (collected, true);
        }

        tracing::info!(source = source.name(), "Scraping source");
        match source.fetch(cancel).await {
            Ok(jobs) => collected.push((source.name(), Some(jobs))),
            Err(e) => {
                tracing::error!(source = source.name(), error = %e, "Source failed, skipping");
                collected.push((source.name(), None));
            }
        }
    }

    (collected, cancel.is_cancelled())
}

pub struct Ingestor {
    db: PgPool,
    config: ScraperConfig,
    heuristics: Heuristics,
    companies: HashMap<String, i64>,
    categories: HashMap<String, i64>,
}

impl Ingestor {
    pub async fn new(db: PgPool, config: ScraperConfig) -> Result<Self, IngestError> {
        let categories = Category::list(&db)
            .await?
            .into_iter()
            .map(|c| (c.name.to_lowercase(), c.id))
            .collect::<HashMap<_, _>>();

        tracing::info!(categories = categories.len(), "Loaded category cache");

        Ok(Self {
            db,
            config,
            heuristics: Heuristics::new()?,
            companies: HashMap::new(),
            categories,
        })
    }

    /// Finds or creates the company, caching ids by lowercase name
    async fn company_id(&mut self, name: &str) -> Result<i64, sqlx::Error> {
        let key = name.to_lowercase();
        if let Some(id) = self.companies.get(&key) {
            return Ok(*id);
        }

        let id = match Company::find_by_name(&self.db, name).await? {
            Some(company) => company.id,
            None => {
                let company = Company::create(
                    &self.db,
                    CreateCompany {
                        name: name.to_string(),
                        description: Some(format!("Company profile for {}", name)),
                        website: None,
                        logo: None,
                        industry: None,
                        company_size: None,
                        location: None,
                        founded_year: None,
                        user_id: self.config.system_user_id,
                    },
                )
                .await?;
                tracing::info!(company_id = company.id, company = %name, "Created company");
                company.id
            }
        };

        self.companies.insert(key, id);
        Ok(id)
    }

    pub async fn save(&mut self, raw: &RawJob) -> Result<SaveOutcome, sqlx::Error> {
        let Some(draft) = JobDraft::from_raw(raw, &self.heuristics) else {
            return Ok(SaveOutcome::Skipped);
        };

        let company_id = self.company_id(&draft.company).await?;
        let category_id = self.categories.get(draft.category).copied();

        if Job::exists_recent_duplicate(
            &self.db,
            &draft.title,
            company_id,
            self.config.duplicate_window_days,
        )
        .await?
        {
            return Ok(SaveOutcome::Duplicate);
        }

        let title = draft.title.clone();
        let company = draft.company.clone();
        let mut conn = self.db.acquire().await?;
        let job_id = Job::create(
            &mut conn,
            draft.into_create(company_id, category_id, self.config.system_user_id),
        )
        .await?;

        tracing::info!(job_id, title = %title, company = %company, "Saved job");
        Ok(SaveOutcome::Saved(job_id))
    }

    /// Scrapes every source and saves what it finds
    pub async fn run(
        &mut self,
        sources: &[Box<dyn JobSource>],
        cancel: &CancellationToken,
    ) -> ScrapeSummary {
        let (collected, cancelled) = collect(sources, cancel).await;
        let mut summary = ScrapeSummary {
            cancelled,
            ..Default::default()
        };

        for (name, jobs) in collected {
            let report = summary.per_source.entry(name).or_default();
            let Some(jobs) = jobs else {
                report.failed = true;
                continue;
            };
            report.scraped = jobs.len();
            summary.total_scraped += jobs.len();

            for raw in &jobs {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    break;
                }

                match self.save(raw).await {
                    Ok(SaveOutcome::Saved(_)) => {
                        summary.total_saved += 1;
                        if let Some(report) = summary.per_source.get_mut(name) {
                            report.saved += 1;
                        }
                    }
                    Ok(SaveOutcome::Duplicate) => {
                        tracing::debug!(title = %raw.title, company = %raw.company, "Skipping recent duplicate");
                    }
                    Ok(SaveOutcome::Skipped) => {}
                    Err(e) => {
                        tracing::error!(title = %raw.title, error = %e, "Failed to save job");
                    }
                }

                tokio::time::sleep(self.config.write_delay()).await;
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSource;

    fn raw(title: &str, company: &str) -> RawJob {
        RawJob {
            title: title.to_string(),
            company: company.to_string(),
            source: "Test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_skips_incomplete() {
        let h = Heuristics::new().unwrap();
        assert!(JobDraft::from_raw(&raw("", "Acme"), &h).is_none());
        assert!(JobDraft::from_raw(&raw("Engineer", "   "), &h).is_none());
    }

    #[test]
    fn test_draft_names_fit_columns() {
        let h = Heuristics::new().unwrap();
        let listing = RawJob {
            location: Some("Anywhere ".repeat(40)),
            ..raw(&"Senior Engineer ".repeat(30), &"Acme Holdings ".repeat(30))
        };

        let draft = JobDraft::from_raw(&listing, &h).unwrap();
        assert!(draft.title.chars().count() <= 255);
        assert!(draft.company.chars().count() <= 255);
        assert!(draft.location.chars().count() <= 255);
        assert!(draft.title.starts_with("Senior Engineer Senior"));
    }

    #[test]
    fn test_draft_fills_defaults() {
        let h = Heuristics::new().unwrap();
        let draft = JobDraft::from_raw(&raw("  Support   Specialist ", "Acme"), &h).unwrap();

        assert_eq!(draft.title, "Support Specialist");
        assert_eq!(draft.description, NO_DESCRIPTION);
        assert_eq!(draft.location, "Remote");
        assert_eq!(draft.category, "customer service");
        assert_eq!(draft.remote_type, RemoteType::Remote);
        assert_eq!(draft.salary_min, None);
        assert_eq!(draft.requirements, None);
    }

    #[test]
    fn test_draft_uses_heuristics() {
        let h = Heuristics::new().unwrap();
        let listing = RawJob {
            title: "Backend Engineer".to_string(),
            company: "Initech".to_string(),
            location: Some("London (Hybrid)".to_string()),
            description: Some("Need 3 years experience. Proficient in Rust.".to_string()),
            salary: Some("$70,000 - $95,000".to_string()),
            url: Some("https://example.com/apply".to_string()),
            source: "RemoteOK".to_string(),
        };

        let draft = JobDraft::from_raw(&listing, &h).unwrap();
        assert_eq!(draft.category, "technology");
        assert_eq!(draft.remote_type, RemoteType::Hybrid);
        assert_eq!(draft.salary_min, Some(Decimal::from(70_000)));
        assert_eq!(draft.salary_max, Some(Decimal::from(95_000)));
        assert_eq!(draft.requirements.as_deref(), Some("3 years experience. Proficient in Rust"));

        let create = draft.into_create(5, Some(2), 1);
        assert_eq!(create.company_id, 5);
        assert_eq!(create.job_type, JobType::FullTime);
        assert_eq!(create.source.as_deref(), Some("RemoteOK"));
        assert_eq!(create.created_by, Some(1));
    }

    #[tokio::test]
    async fn test_collect_skips_failed_sources() {
        let sources: Vec<Box<dyn JobSource>> = vec![
            Box::new(StaticSource::new("first", vec![raw("A", "X"), raw("B", "Y")])),
            Box::new(StaticSource::failing("broken")),
            Box::new(StaticSource::new("last", vec![raw("C", "Z")])),
        ];

        let (collected, cancelled) = collect(&sources, &CancellationToken::new()).await;

        assert!(!cancelled);
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].1.as_ref().map(Vec::len), Some(2));
        assert!(collected[1].1.is_none());
        assert_eq!(collected[2].0, "last");
    }

    #[tokio::test]
    async fn test_collect_stops_when_cancelled() {
        let sources: Vec<Box<dyn JobSource>> =
            vec![Box::new(StaticSource::new("only", vec![raw("A", "X")]))];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (collected, cancelled) = collect(&sources, &cancel).await;

        assert!(cancelled);
        assert!(collected.is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
    async fn test_save_reuses_companies_and_skips_recent_duplicates() {
        use flexjobs_shared::{
            auth::password::unusable_password_hash,
            db::migrations::run_migrations,
            models::user::{CreateUser, User, UserType},
        };

        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/flexjobs_test".to_string());
        let db = PgPool::connect(&url).await.unwrap();
        run_migrations(&db).await.unwrap();

        let owner = User::create(
            &db,
            CreateUser {
                email: format!("importer-{}@example.com", uuid::Uuid::new_v4().simple()),
                password_hash: unusable_password_hash().unwrap(),
                first_name: "Job".to_string(),
                last_name: "Importer".to_string(),
                user_type: UserType::Admin,
            },
        )
        .await
        .unwrap();

        let mut config =
            ScraperConfig::from_vars(HashMap::from([("DATABASE_URL".to_string(), url)])).unwrap();
        config.system_user_id = owner.id;
        config.write_delay_ms = 0;

        let company = format!("Ingest Test {}", uuid::Uuid::new_v4().simple());
        let mut ingestor = Ingestor::new(db.clone(), config.clone()).await.unwrap();

        let SaveOutcome::Saved(first) = ingestor.save(&raw("Rust Engineer", &company)).await.unwrap() else {
            panic!("first listing should be saved");
        };
        assert_eq!(
            ingestor.save(&raw("Rust Engineer", &company)).await.unwrap(),
            SaveOutcome::Duplicate
        );
        assert_eq!(ingestor.save(&raw("", &company)).await.unwrap(), SaveOutcome::Skipped);

        // A fresh cache still resolves the company case-insensitively
        let mut fresh = Ingestor::new(db.clone(), config).await.unwrap();
        let SaveOutcome::Saved(second) = fresh
            .save(&raw("Go Engineer", &company.to_uppercase()))
            .await
            .unwrap()
        else {
            panic!("new title should be saved");
        };

        let first_job = Job::find_by_id(&db, first).await.unwrap().unwrap();
        let second_job = Job::find_by_id(&db, second).await.unwrap().unwrap();
        assert_eq!(first_job.company_id, second_job.company_id);

        let companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies WHERE LOWER(name) = LOWER($1)")
            .bind(&company)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(companies, 1);

        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(first_job.company_id)
            .execute(&db)
            .await
            .unwrap();
        User::delete(&db, owner.id).await.unwrap();
    }
}
