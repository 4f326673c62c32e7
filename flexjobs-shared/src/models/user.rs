/// User model and database operations
///
/// One table holds every account type. `user_type` decides what the account
/// may do: job seekers apply, employers own companies and post jobs, agents
/// offer consultations and admins manage everything.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     first_name VARCHAR(100) NOT NULL,
///     last_name VARCHAR(100) NOT NULL,
///     user_type TEXT NOT NULL DEFAULT 'job_seeker',
///     phone, bio, skills, experience_level, location, profile_image,
///     linkedin_url, portfolio_url, google_id, apple_id, avatar_url,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Emails are stored lowercase; callers normalize with [`normalize_email`].
///
/// # Example
///
/// ```no_run
/// use flexjobs_shared::models::user::{User, CreateUser, UserType};
/// use flexjobs_shared::db::pool::{connect, PoolSettings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = connect(&PoolSettings::new("postgresql://localhost/flexjobs")).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: "Ada".to_string(),
///     last_name: "Lovelace".to_string(),
///     user_type: UserType::JobSeeker,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ada@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::db::query::{Changes, Filters, PageParams};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    JobSeeker,
    Employer,
    Admin,
    Agent,
}

impl UserType {
    /// Converts the role to its database value
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::JobSeeker => "job_seeker",
            UserType::Employer => "employer",
            UserType::Admin => "admin",
            UserType::Agent => "agent",
        }
    }

    /// Parses a role from its database value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "job_seeker" => Some(UserType::JobSeeker),
            "employer" => Some(UserType::Employer),
            "admin" => Some(UserType::Admin),
            "agent" => Some(UserType::Agent),
            _ => None,
        }
    }
}

/// Seniority shared by user profiles and job postings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Executive,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Executive => "executive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(ExperienceLevel::Entry),
            "mid" => Some(ExperienceLevel::Mid),
            "senior" => Some(ExperienceLevel::Senior),
            "executive" => Some(ExperienceLevel::Executive),
            _ => None,
        }
    }
}

/// Lowercases and trims an email address before storage or lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User account
///
/// Serializing a `User` never emits the password hash or OAuth ids, so the
/// struct can be returned from handlers as-is.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// Lowercase, unique across all users
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,

    /// Stored as string, see [`UserType`]
    pub user_type: String,

    pub phone: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub experience_level: Option<String>,
    pub location: Option<String>,
    pub profile_image: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,

    #[serde(skip_serializing, default)]
    pub google_id: Option<String>,

    #[serde(skip_serializing, default)]
    pub apple_id: Option<String>,

    pub avatar_url: Option<String>,

    /// Deactivated users cannot log in or use existing tokens
    pub is_active: bool,

    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn get_user_type(&self) -> Option<UserType> {
        UserType::from_str(&self.user_type)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Normalized email address
    pub email: String,

    /// Argon2id hash, never the plaintext password
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
}

/// Profile fields shown to other users
///
/// Excludes contact details and account state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub experience_level: Option<String>,
    pub location: Option<String>,
    pub profile_image: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row of the admin user listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the email is taken. Handlers check
    /// [`User::email_exists`] first to report a friendly message.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_with(&mut conn, data).await
    }

    /// Same as [`User::create`] on an existing connection or transaction
    pub async fn create_with(conn: &mut PgConnection, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, user_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.user_type.as_str())
        .fetch_one(conn)
        .await?;

        Ok(user)
    }

    /// Finds a user by id
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    /// Finds a user by email, normalizing the input first
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(normalize_email(email))
                .fetch_one(pool)
                .await?;

        Ok(exists)
    }

    /// Public profile of an active user
    pub async fn find_public_profile(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<PublicProfile>, sqlx::Error> {
        let profile = sqlx::query_as::<_, PublicProfile>(
            r#"
            SELECT id, first_name, last_name, user_type, bio, skills, experience_level,
                   location, profile_image, linkedin_url, portfolio_url, created_at
            FROM users
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Applies a partial profile update
    ///
    /// Returns `None` if the user does not exist. An empty `changes` only
    /// touches `updated_at`.
    pub async fn update_profile(
        pool: &PgPool,
        id: i64,
        changes: &Changes,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = changes.update_query("users", "id", id);
        qb.push(" RETURNING *");

        let user = qb.build_query_as::<User>().fetch_optional(pool).await?;

        Ok(user)
    }

    pub async fn update_password(
        conn: &mut PgConnection,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activates or deactivates an account
    pub async fn set_active(
        pool: &PgPool,
        id: i64,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Makes an existing account an active admin; the password is left alone
    pub async fn promote_admin(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET user_type = 'admin', is_active = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Filters for the admin listing: search over email and names
    pub fn admin_filters(search: Option<&str>, user_type: Option<UserType>) -> Filters {
        let mut filters = Filters::new();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            filters.and_any_ilike(&["email", "first_name", "last_name"], term.trim());
        }
        if let Some(user_type) = user_type {
            filters.and_eq("user_type", user_type.as_str());
        }
        filters
    }

    /// Admin listing, newest first
    pub async fn list_summaries(
        pool: &PgPool,
        filters: &Filters,
        page: PageParams,
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, email, first_name, last_name, user_type, is_active, email_verified, created_at FROM users",
        );
        filters.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC");
        page.push_limit_offset(&mut qb);

        qb.build_query_as::<UserSummary>().fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool, filters: &Filters) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
        filters.push_where(&mut qb);

        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Users created in the last `days` days
    pub async fn count_created_since_days(pool: &PgPool, days: i32) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE created_at >= NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .fetch_one(pool)
        .await
    }
}
