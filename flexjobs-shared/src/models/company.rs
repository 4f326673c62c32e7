/// Companies and their owners
///
/// Employers own companies through `user_id`; a job belongs to a company and
/// whoever owns the company may edit its jobs and see their applicants.
/// Scraped companies are owned by the scraper's system user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::query::{Changes, Filters, PageParams};

/// Headcount bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanySize {
    #[serde(rename = "1-10")]
    Tiny,
    #[serde(rename = "11-50")]
    Small,
    #[serde(rename = "51-200")]
    Medium,
    #[serde(rename = "201-500")]
    Large,
    #[serde(rename = "501-1000")]
    XLarge,
    #[serde(rename = "1000+")]
    Enterprise,
}

impl CompanySize {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanySize::Tiny => "1-10",
            CompanySize::Small => "11-50",
            CompanySize::Medium => "51-200",
            CompanySize::Large => "201-500",
            CompanySize::XLarge => "501-1000",
            CompanySize::Enterprise => "1000+",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub logo: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub location: Option<String>,
    pub founded_year: Option<i32>,
    /// Owning user; `None` once the owner account is deleted
    pub user_id: Option<i64>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Company plus the number of active jobs it has posted
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyWithJobCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub company: Company,
    pub active_jobs: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCompany {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub logo: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<CompanySize>,
    pub location: Option<String>,
    pub founded_year: Option<i32>,
    pub user_id: i64,
}

const WITH_JOB_COUNT: &str = r#"
    SELECT c.*,
           (SELECT COUNT(*) FROM jobs j WHERE j.company_id = c.id AND j.is_active = TRUE) AS active_jobs
    FROM companies c
"#;

impl Company {
    pub async fn create(pool: &PgPool, data: CreateCompany) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies
                (name, description, website, logo, industry, company_size, location, founded_year, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.website)
        .bind(data.logo)
        .bind(data.industry)
        .bind(data.company_size.map(|s| s.as_str()))
        .bind(data.location)
        .bind(data.founded_year)
        .bind(data.user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_with_job_count(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<CompanyWithJobCount>, sqlx::Error> {
        let sql = format!("{} WHERE c.id = $1", WITH_JOB_COUNT);
        sqlx::query_as::<_, CompanyWithJobCount>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive exact name match, oldest first
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(pool)
        .await
    }

    /// Companies owned by a user, oldest first
    pub async fn list_by_owner(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// First company a user owns, used by the employer dashboard
    pub async fn find_first_by_owner(
        pool: &PgPool,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE user_id = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub fn list_filters(search: Option<&str>, industry: Option<&str>) -> Filters {
        let mut filters = Filters::new();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            filters.and_any_ilike(&["c.name", "c.description"], term);
        }
        if let Some(industry) = industry.map(str::trim).filter(|s| !s.is_empty()) {
            filters.and_ilike("c.industry", industry);
        }
        filters
    }

    pub async fn list(
        pool: &PgPool,
        filters: &Filters,
        page: PageParams,
    ) -> Result<Vec<CompanyWithJobCount>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(WITH_JOB_COUNT);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY c.name ASC");
        page.push_limit_offset(&mut qb);

        qb.build_query_as::<CompanyWithJobCount>().fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool, filters: &Filters) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM companies c");
        filters.push_where(&mut qb);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: &Changes,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = changes.update_query("companies", "id", id);
        qb.push(" RETURNING *");
        qb.build_query_as::<Company>().fetch_optional(pool).await
    }

    pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(pool)
            .await
    }

    /// Whether `user_id` owns this company
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }
}
