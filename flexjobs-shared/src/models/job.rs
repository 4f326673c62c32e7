/// Job postings and their required skills
///
/// Jobs belong to a company and optionally a category. Deleting a job from
/// the employer side is a soft delete (`is_active = false`) so existing
/// applications keep pointing at a row; only admins hard-delete.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE jobs (
///     id BIGSERIAL PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL,
///     company_id BIGINT NOT NULL REFERENCES companies (id),
///     category_id BIGINT REFERENCES categories (id),
///     job_type TEXT NOT NULL DEFAULT 'full-time',
///     remote_type TEXT NOT NULL DEFAULT 'remote',
///     salary_min NUMERIC(12, 2),
///     salary_max NUMERIC(12, 2),
///     application_url VARCHAR(1024),
///     source VARCHAR(100),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_featured BOOLEAN NOT NULL DEFAULT FALSE,
///     views_count INTEGER NOT NULL DEFAULT 0,
///     applications_count INTEGER NOT NULL DEFAULT 0,
///     ...
/// );
///
/// CREATE TABLE job_skills (
///     id BIGSERIAL PRIMARY KEY,
///     job_id BIGINT NOT NULL REFERENCES jobs (id) ON DELETE CASCADE,
///     skill_name VARCHAR(100) NOT NULL,
///     is_required BOOLEAN NOT NULL DEFAULT TRUE
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use flexjobs_shared::db::query::PageParams;
/// use flexjobs_shared::models::job::{Job, JobSearch, JobType};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let search = JobSearch {
///     search: Some("rust".to_string()),
///     job_type: Some(JobType::Contract),
///     ..Default::default()
/// };
/// let filters = search.filters();
///
/// let total = Job::count(&pool, &filters).await?;
/// let jobs = Job::list(&pool, &filters, PageParams::new(Some(1), None, 20, 50)).await?;
/// println!("{} of {} jobs", jobs.len(), total);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use super::user::ExperienceLevel;
use crate::db::query::{Changes, Filters, PageParams};

/// Employment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Freelance,
    Internship,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Freelance => "freelance",
            JobType::Internship => "internship",
        }
    }
}

/// Where the work happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteType {
    Remote,
    Hybrid,
    OnSite,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteType::Remote => "remote",
            RemoteType::Hybrid => "hybrid",
            RemoteType::OnSite => "on-site",
        }
    }
}

/// Job posting row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub company_id: i64,
    pub category_id: Option<i64>,
    pub location: Option<String>,
    pub job_type: String,
    pub remote_type: String,
    pub experience_level: Option<String>,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub salary_currency: String,
    pub benefits: Option<String>,
    pub application_deadline: Option<NaiveDate>,
    /// External apply link for imported jobs
    pub application_url: Option<String>,
    /// Import source name; `None` for jobs posted on the board
    pub source: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub views_count: i32,
    pub applications_count: i32,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job as shown in listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub job: Job,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub category_name: Option<String>,
}

/// Job with everything the detail page needs
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub job: Job,
    pub company_name: String,
    pub company_description: Option<String>,
    pub company_website: Option<String>,
    pub company_logo: Option<String>,
    pub company_industry: Option<String>,
    pub company_size: Option<String>,
    pub company_location: Option<String>,
    pub category_name: Option<String>,
    pub posted_by_first_name: Option<String>,
    pub posted_by_last_name: Option<String>,
    #[sqlx(skip)]
    pub skills: Vec<JobSkill>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobSkill {
    pub id: i64,
    pub job_id: i64,
    pub skill_name: String,
    pub is_required: bool,
}

/// Skill as submitted with a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInput {
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Input for creating a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub company_id: i64,
    pub category_id: Option<i64>,
    pub location: Option<String>,
    pub job_type: JobType,
    pub remote_type: RemoteType,
    pub experience_level: Option<ExperienceLevel>,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub salary_currency: String,
    pub benefits: Option<String>,
    pub application_deadline: Option<NaiveDate>,
    pub application_url: Option<String>,
    pub source: Option<String>,
    pub created_by: Option<i64>,
}

/// Public listing filters, read straight from the query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSearch {
    /// Matches title, description or company name
    pub search: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<JobType>,
    pub remote_type: Option<RemoteType>,
    pub experience_level: Option<ExperienceLevel>,
    pub category_id: Option<i64>,
    /// Jobs paying at least this much at the top of their range
    pub salary_min: Option<Decimal>,
    /// Jobs starting at or below this amount
    pub salary_max: Option<Decimal>,
}

impl JobSearch {
    /// Builds the WHERE conditions shared by the count and page queries
    pub fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.and_raw("j.is_active = TRUE");

        if let Some(term) = non_blank(&self.search) {
            filters.and_any_ilike(&["j.title", "j.description", "c.name"], term);
        }
        if let Some(location) = non_blank(&self.location) {
            filters.and_ilike("j.location", location);
        }
        if let Some(job_type) = self.job_type {
            filters.and_eq("j.job_type", job_type.as_str());
        }
        if let Some(remote_type) = self.remote_type {
            filters.and_eq("j.remote_type", remote_type.as_str());
        }
        if let Some(level) = self.experience_level {
            filters.and_eq("j.experience_level", level.as_str());
        }
        if let Some(category_id) = self.category_id {
            filters.and_eq("j.category_id", category_id);
        }
        if let Some(min) = self.salary_min {
            filters.and_gte("j.salary_max", min);
        }
        if let Some(max) = self.salary_max {
            filters.and_lte("j.salary_min", max);
        }

        filters
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Who may manage a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct JobOwnership {
    pub job_id: i64,
    pub company_id: i64,
    /// Owner of the job's company
    pub owner_id: Option<i64>,
    pub is_active: bool,
}

/// Counters for the employer dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmployerJobStats {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub total_applications: i64,
    pub total_views: i64,
}

const LIST_FROM: &str = r#"
    FROM jobs j
    JOIN companies c ON c.id = j.company_id
    LEFT JOIN categories cat ON cat.id = j.category_id
"#;

const LIST_SELECT: &str =
    "SELECT j.*, c.name AS company_name, c.logo AS company_logo, cat.name AS category_name";

impl Job {
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Page of jobs matching `filters`, featured first then newest
    pub async fn list(
        pool: &PgPool,
        filters: &Filters,
        page: PageParams,
    ) -> Result<Vec<JobListItem>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(LIST_SELECT);
        qb.push(LIST_FROM);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY j.is_featured DESC, j.created_at DESC");
        page.push_limit_offset(&mut qb);

        qb.build_query_as::<JobListItem>().fetch_all(pool).await
    }

    /// Total matching `filters`; the filters may reference `j`, `c` and `cat`
    pub async fn count(pool: &PgPool, filters: &Filters) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*)");
        qb.push(LIST_FROM);
        filters.push_where(&mut qb);

        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Active jobs of one company
    pub fn company_filters(company_id: i64) -> Filters {
        let mut filters = Filters::new();
        filters
            .and_raw("j.is_active = TRUE")
            .and_eq("j.company_id", company_id);
        filters
    }

    /// Admin search over title and company name, including inactive jobs
    pub fn admin_filters(search: Option<&str>) -> Filters {
        let mut filters = Filters::new();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            filters.and_any_ilike(&["j.title", "c.name"], term);
        }
        filters
    }

    /// Active job with company, category, poster and skills
    pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<JobDetail>, sqlx::Error> {
        let detail = sqlx::query_as::<_, JobDetail>(
            r#"
            SELECT j.*,
                   c.name AS company_name, c.description AS company_description,
                   c.website AS company_website, c.logo AS company_logo,
                   c.industry AS company_industry, c.company_size AS company_size,
                   c.location AS company_location,
                   cat.name AS category_name,
                   u.first_name AS posted_by_first_name, u.last_name AS posted_by_last_name
            FROM jobs j
            JOIN companies c ON c.id = j.company_id
            LEFT JOIN categories cat ON cat.id = j.category_id
            LEFT JOIN users u ON u.id = j.created_by
            WHERE j.id = $1 AND j.is_active = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        let Some(mut detail) = detail else {
            return Ok(None);
        };

        detail.skills = Self::skills(pool, id).await?;
        Ok(Some(detail))
    }

    pub async fn skills(pool: &PgPool, job_id: i64) -> Result<Vec<JobSkill>, sqlx::Error> {
        sqlx::query_as::<_, JobSkill>(
            "SELECT * FROM job_skills WHERE job_id = $1 ORDER BY is_required DESC, id",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }

    pub async fn increment_views(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET views_count = views_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Inserts a job; returns its id
    pub async fn create(conn: &mut PgConnection, data: CreateJob) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO jobs
                (title, description, requirements, responsibilities, company_id, category_id,
                 location, job_type, remote_type, experience_level, salary_min, salary_max,
                 salary_currency, benefits, application_deadline, application_url, source, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.requirements)
        .bind(data.responsibilities)
        .bind(data.company_id)
        .bind(data.category_id)
        .bind(data.location)
        .bind(data.job_type.as_str())
        .bind(data.remote_type.as_str())
        .bind(data.experience_level.map(|l| l.as_str()))
        .bind(data.salary_min)
        .bind(data.salary_max)
        .bind(data.salary_currency)
        .bind(data.benefits)
        .bind(data.application_deadline)
        .bind(data.application_url)
        .bind(data.source)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Replaces the skill list of a job
    pub async fn replace_skills(
        conn: &mut PgConnection,
        job_id: i64,
        skills: &[SkillInput],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM job_skills WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *conn)
            .await?;

        let skills: Vec<&SkillInput> = skills.iter().filter(|s| !s.name.trim().is_empty()).collect();
        if skills.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO job_skills (job_id, skill_name, is_required) ");
        qb.push_values(skills, |mut row, skill| {
            row.push_bind(job_id)
                .push_bind(skill.name.trim().to_string())
                .push_bind(skill.required);
        });
        qb.build().execute(conn).await?;

        Ok(())
    }

    /// Applies a partial update; `false` when the job does not exist
    pub async fn update(
        conn: &mut PgConnection,
        id: i64,
        changes: &Changes,
    ) -> Result<bool, sqlx::Error> {
        let mut qb = changes.update_query("jobs", "id", id);
        let result = qb.build().execute(conn).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn soft_delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE jobs SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Company and owner of a job, for ownership checks
    pub async fn ownership(pool: &PgPool, id: i64) -> Result<Option<JobOwnership>, sqlx::Error> {
        sqlx::query_as::<_, JobOwnership>(
            r#"
            SELECT j.id AS job_id, j.company_id, c.user_id AS owner_id, j.is_active
            FROM jobs j
            JOIN companies c ON c.id = j.company_id
            WHERE j.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Most recent jobs of a company, active or not
    pub async fn recent_for_company(
        pool: &PgPool,
        company_id: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE company_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn employer_stats(
        pool: &PgPool,
        company_id: i64,
    ) -> Result<EmployerJobStats, sqlx::Error> {
        sqlx::query_as::<_, EmployerJobStats>(
            r#"
            SELECT COUNT(*) AS total_jobs,
                   COUNT(*) FILTER (WHERE is_active) AS active_jobs,
                   COALESCE(SUM(applications_count), 0)::BIGINT AS total_applications,
                   COALESCE(SUM(views_count), 0)::BIGINT AS total_views
            FROM jobs
            WHERE company_id = $1
            "#,
        )
        .bind(company_id)
        .fetch_one(pool)
        .await
    }

    /// Whether a job with this title was posted for the company in the last `days` days
    pub async fn exists_recent_duplicate(
        pool: &PgPool,
        title: &str,
        company_id: i64,
        days: i32,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM jobs
                WHERE title = $1 AND company_id = $2
                  AND created_at > NOW() - make_interval(days => $3)
            )
            "#,
        )
        .bind(title)
        .bind(company_id)
        .bind(days)
        .fetch_one(pool)
        .await
    }

    pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(pool)
            .await
    }

    /// Active jobs created in the last `days` days
    pub async fn count_active_since_days(pool: &PgPool, days: i32) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE is_active = TRUE AND created_at >= NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(filters: &Filters) -> String {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*)");
        qb.push(" FROM jobs j");
        filters.push_where(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_job_type_serde() {
        assert_eq!(serde_json::to_string(&JobType::FullTime).unwrap(), "\"full-time\"");
        assert_eq!(serde_json::to_string(&RemoteType::OnSite).unwrap(), "\"on-site\"");

        let parsed: JobType = serde_json::from_str("\"part-time\"").unwrap();
        assert_eq!(parsed.as_str(), "part-time");
    }

    #[test]
    fn test_default_search_only_active() {
        let sql = render(&JobSearch::default().filters());
        assert_eq!(sql, "SELECT COUNT(*) FROM jobs j WHERE j.is_active = TRUE");
    }

    #[test]
    fn test_search_filters_order_and_numbering() {
        let search = JobSearch {
            search: Some("rust".to_string()),
            job_type: Some(JobType::Contract),
            salary_min: Some(Decimal::new(50_000, 0)),
            salary_max: Some(Decimal::new(90_000, 0)),
            ..Default::default()
        };

        assert_eq!(
            render(&search.filters()),
            "SELECT COUNT(*) FROM jobs j WHERE j.is_active = TRUE \
             AND (j.title ILIKE $1 OR j.description ILIKE $2 OR c.name ILIKE $3) \
             AND j.job_type = $4 AND j.salary_max >= $5 AND j.salary_min <= $6"
        );
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let search = JobSearch {
            search: Some("   ".to_string()),
            location: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(search.filters().bind_count(), 0);
    }

    #[test]
    fn test_skill_input_defaults_to_required() {
        let skill: SkillInput = serde_json::from_str(r#"{"name": "Rust"}"#).unwrap();
        assert!(skill.required);
    }
}
