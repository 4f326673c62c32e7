/// Job applications and saved jobs
///
/// A user applies to a job at most once (`UNIQUE (job_id, user_id)`) and
/// saves it at most once (`UNIQUE (user_id, job_id)`). Handlers check for an
/// existing row first to answer with a readable message; the constraints
/// catch the concurrent case.
///
/// `jobs.applications_count` mirrors the number of rows here. It is bumped
/// and decremented in the same transaction as the insert or delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::db::query::{Filters, PageParams};

/// Where an application stands in the hiring pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Interviewed,
    Hired,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApplicationStatus::Pending),
            "reviewed" => Some(ApplicationStatus::Reviewed),
            "interviewed" => Some(ApplicationStatus::Interviewed),
            "hired" => Some(ApplicationStatus::Hired),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub user_id: i64,
    pub cover_letter: Option<String>,
    pub resume_path: Option<String>,
    pub status: String,
    /// Employer's private notes
    pub notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application with the applicant's contact details, for employers
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationWithApplicant {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub application: Application,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub skills: Option<String>,
    pub experience_level: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
}

/// Application with a summary of the job, for applicants
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationWithJob {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub application: Application,
    pub job_title: String,
    pub company_name: String,
    pub job_location: Option<String>,
    pub job_type: String,
}

/// Application joined with both sides plus the employer id
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub application: Application,
    pub job_title: String,
    pub company_id: i64,
    pub company_name: String,
    /// Owner of the job's company
    #[serde(skip_serializing)]
    pub employer_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Per-status counts for the job seeker dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationStats {
    pub total_applications: i64,
    pub pending: i64,
    pub reviewed: i64,
    pub interviewed: i64,
    pub hired: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedJob {
    pub id: i64,
    pub user_id: i64,
    pub job_id: i64,
    pub saved_at: DateTime<Utc>,
}

/// Saved job with the listing fields
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedJobWithJob {
    pub id: i64,
    pub job_id: i64,
    pub saved_at: DateTime<Utc>,
    pub title: String,
    pub location: Option<String>,
    pub job_type: String,
    pub remote_type: String,
    pub is_active: bool,
    pub company_name: String,
    pub company_logo: Option<String>,
}

impl Application {
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, job_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM applications WHERE job_id = $1 AND user_id = $2)",
        )
        .bind(job_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Inserts the application and bumps the job's counter
    ///
    /// Run inside a transaction so both writes land together.
    pub async fn create(
        conn: &mut PgConnection,
        job_id: i64,
        user_id: i64,
        cover_letter: Option<String>,
    ) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO applications (job_id, user_id, cover_letter)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(job_id)
        .bind(user_id)
        .bind(cover_letter)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("UPDATE jobs SET applications_count = applications_count + 1 WHERE id = $1")
            .bind(job_id)
            .execute(conn)
            .await?;

        Ok(id)
    }

    /// Deletes the application and decrements the job's counter, never below zero
    pub async fn withdraw(conn: &mut PgConnection, id: i64, job_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE jobs SET applications_count = GREATEST(applications_count - 1, 0) WHERE id = $1",
        )
        .bind(job_id)
        .execute(conn)
        .await?;

        Ok(true)
    }

    pub async fn update_status(
        pool: &PgPool,
        id: i64,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $2, notes = COALESCE($3, notes), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<ApplicationDetail>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationDetail>(
            r#"
            SELECT a.*, j.title AS job_title, c.id AS company_id, c.name AS company_name,
                   c.user_id AS employer_id, u.first_name, u.last_name, u.email
            FROM applications a
            JOIN jobs j ON j.id = a.job_id
            JOIN companies c ON c.id = j.company_id
            JOIN users u ON u.id = a.user_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Applicants of one job, optionally narrowed to a status
    pub fn job_filters(job_id: i64, status: Option<ApplicationStatus>) -> Filters {
        let mut filters = Filters::new();
        filters.and_eq("a.job_id", job_id);
        if let Some(status) = status {
            filters.and_eq("a.status", status.as_str());
        }
        filters
    }

    pub async fn list_for_job(
        pool: &PgPool,
        filters: &Filters,
        page: PageParams,
    ) -> Result<Vec<ApplicationWithApplicant>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT a.*, u.first_name, u.last_name, u.email, u.phone, u.skills,
                   u.experience_level, u.location, u.linkedin_url, u.portfolio_url
            FROM applications a
            JOIN users u ON u.id = a.user_id
            "#,
        );
        filters.push_where(&mut qb);
        qb.push(" ORDER BY a.applied_at DESC");
        page.push_limit_offset(&mut qb);

        qb.build_query_as::<ApplicationWithApplicant>().fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool, filters: &Filters) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM applications a");
        filters.push_where(&mut qb);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// A user's applications, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: i64,
        page: PageParams,
    ) -> Result<Vec<ApplicationWithJob>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationWithJob>(
            r#"
            SELECT a.*, j.title AS job_title, c.name AS company_name,
                   j.location AS job_location, j.job_type
            FROM applications a
            JOIN jobs j ON j.id = a.job_id
            JOIN companies c ON c.id = j.company_id
            WHERE a.user_id = $1
            ORDER BY a.applied_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Applications submitted since `since`, for monthly limits
    pub async fn count_for_user_since(
        pool: &PgPool,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE user_id = $1 AND applied_at >= $2")
            .bind(user_id)
            .bind(since)
            .fetch_one(pool)
            .await
    }

    pub async fn stats_for_user(pool: &PgPool, user_id: i64) -> Result<ApplicationStats, sqlx::Error> {
        sqlx::query_as::<_, ApplicationStats>(
            r#"
            SELECT COUNT(*) AS total_applications,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'reviewed') AS reviewed,
                   COUNT(*) FILTER (WHERE status = 'interviewed') AS interviewed,
                   COUNT(*) FILTER (WHERE status = 'hired') AS hired,
                   COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
            FROM applications
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(pool)
            .await
    }
}

impl SavedJob {
    pub async fn exists(pool: &PgPool, user_id: i64, job_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM saved_jobs WHERE user_id = $1 AND job_id = $2)",
        )
        .bind(user_id)
        .bind(job_id)
        .fetch_one(pool)
        .await
    }

    pub async fn create(pool: &PgPool, user_id: i64, job_id: i64) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SavedJob>(
            "INSERT INTO saved_jobs (user_id, job_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(job_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, user_id: i64, job_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM saved_jobs WHERE user_id = $1 AND job_id = $2")
            .bind(user_id)
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: i64,
        page: PageParams,
    ) -> Result<Vec<SavedJobWithJob>, sqlx::Error> {
        sqlx::query_as::<_, SavedJobWithJob>(
            r#"
            SELECT s.id, s.job_id, s.saved_at, j.title, j.location, j.job_type, j.remote_type,
                   j.is_active, c.name AS company_name, c.logo AS company_logo
            FROM saved_jobs s
            JOIN jobs j ON j.id = s.job_id
            JOIN companies c ON c.id = j.company_id
            WHERE s.user_id = $1
            ORDER BY s.saved_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM saved_jobs WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Reviewed,
            ApplicationStatus::Interviewed,
            ApplicationStatus::Hired,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(ApplicationStatus::from_str(status.as_str()), Some(status));
        }
        assert!(serde_json::from_str::<ApplicationStatus>("\"accepted\"").is_err());
    }

    #[test]
    fn test_job_filters() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM applications a");
        Application::job_filters(3, Some(ApplicationStatus::Hired)).push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM applications a WHERE a.job_id = $1 AND a.status = $2"
        );
    }
}
