/// Career agents and their reviews
///
/// An agent is a profile attached to exactly one user (`agents.user_id` is
/// unique). The list-valued fields are stored as JSONB arrays of strings.
/// `rating` and `total_reviews` are derived from approved reviews and are
/// recomputed whenever an admin approves one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::db::query::{Changes, Filters, PageParams};

/// Agent profile row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub id: i64,
    pub user_id: i64,
    pub agent_name: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub specializations: Json<Vec<String>>,
    pub languages: Json<Vec<String>>,
    pub skills: Json<Vec<String>>,
    pub certifications: Json<Vec<String>>,
    pub experience_years: i32,
    pub hourly_rate: Option<Decimal>,
    pub currency: String,
    pub location: Option<String>,
    pub timezone: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    /// Average of approved reviews, 0 when there are none
    pub rating: Decimal,
    pub total_reviews: i32,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Agent with the owning user's name
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentWithUser {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub agent: Agent,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Search-as-you-type entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentSuggestion {
    pub id: i64,
    pub agent_name: String,
    pub display_name: Option<String>,
    pub specializations: Json<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAgent {
    pub user_id: i64,
    pub agent_name: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub specializations: Vec<String>,
    pub languages: Vec<String>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub experience_years: i32,
    pub hourly_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub location: Option<String>,
    pub timezone: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub is_featured: bool,
}

/// Sortable listing columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSort {
    Rating,
    ExperienceYears,
    CreatedAt,
    AgentName,
}

impl AgentSort {
    /// Unknown columns fall back to rating
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("experience_years") => AgentSort::ExperienceYears,
            Some("created_at") => AgentSort::CreatedAt,
            Some("agent_name") => AgentSort::AgentName,
            _ => AgentSort::Rating,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            AgentSort::Rating => "a.rating",
            AgentSort::ExperienceYears => "a.experience_years",
            AgentSort::CreatedAt => "a.created_at",
            AgentSort::AgentName => "a.agent_name",
        }
    }

    /// `ORDER BY` body; anything but "asc" sorts descending
    pub fn order_by(&self, sort_order: Option<&str>) -> String {
        let direction = match sort_order {
            Some(order) if order.eq_ignore_ascii_case("asc") => "ASC",
            _ => "DESC",
        };
        format!("{} {}, a.id {}", self.column(), direction, direction)
    }
}

/// Public listing filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSearch {
    pub search: Option<String>,
    pub specialization: Option<String>,
    pub min_rating: Option<Decimal>,
    pub featured: Option<bool>,
}

impl AgentSearch {
    pub fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.and_raw("a.is_active = TRUE");

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filters.and_any_ilike(&["a.agent_name", "a.display_name", "a.bio"], term);
        }
        if let Some(spec) = self
            .specialization
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            filters.and_ilike("a.specializations::text", spec);
        }
        if let Some(min_rating) = self.min_rating {
            filters.and_gte("a.rating", min_rating);
        }
        if let Some(featured) = self.featured {
            filters.and_eq("a.is_featured", featured);
        }

        filters
    }
}

const WITH_USER: &str = r#"
    SELECT a.*, u.first_name, u.last_name, u.email
    FROM agents a
    JOIN users u ON u.id = a.user_id
"#;

impl Agent {
    pub async fn create(pool: &PgPool, data: CreateAgent) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_with(&mut conn, data).await
    }

    pub async fn create_with(conn: &mut PgConnection, data: CreateAgent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Agent>(
            r#"
            INSERT INTO agents
                (user_id, agent_name, display_name, bio, avatar_url, specializations, languages,
                 skills, certifications, experience_years, hourly_rate, currency, location,
                 timezone, linkedin_url, portfolio_url, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, 'USD'), $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.agent_name)
        .bind(data.display_name)
        .bind(data.bio)
        .bind(data.avatar_url)
        .bind(Json(data.specializations))
        .bind(Json(data.languages))
        .bind(Json(data.skills))
        .bind(Json(data.certifications))
        .bind(data.experience_years)
        .bind(data.hourly_rate)
        .bind(data.currency)
        .bind(data.location)
        .bind(data.timezone)
        .bind(data.linkedin_url)
        .bind(data.portfolio_url)
        .bind(data.is_featured)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_user_id(pool: &PgPool, user_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Agent with user info, active only unless `include_inactive`
    pub async fn find_with_user(
        pool: &PgPool,
        id: i64,
        include_inactive: bool,
    ) -> Result<Option<AgentWithUser>, sqlx::Error> {
        let sql = format!(
            "{} WHERE a.id = $1 AND (a.is_active = TRUE OR $2)",
            WITH_USER
        );
        sqlx::query_as::<_, AgentWithUser>(&sql)
            .bind(id)
            .bind(include_inactive)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filters: &Filters,
        sort: AgentSort,
        sort_order: Option<&str>,
        page: PageParams,
    ) -> Result<Vec<AgentWithUser>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(WITH_USER);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY ").push(sort.order_by(sort_order));
        page.push_limit_offset(&mut qb);

        qb.build_query_as::<AgentWithUser>().fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool, filters: &Filters) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM agents a JOIN users u ON u.id = a.user_id");
        filters.push_where(&mut qb);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Admin search over names and email, including inactive agents
    pub fn admin_filters(search: Option<&str>) -> Filters {
        let mut filters = Filters::new();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            filters.and_any_ilike(&["a.agent_name", "a.display_name", "u.email"], term);
        }
        filters
    }

    pub async fn featured(pool: &PgPool, limit: i64) -> Result<Vec<AgentWithUser>, sqlx::Error> {
        let sql = format!(
            "{} WHERE a.is_active = TRUE AND a.is_featured = TRUE \
             ORDER BY a.rating DESC, a.total_reviews DESC LIMIT $1",
            WITH_USER
        );
        sqlx::query_as::<_, AgentWithUser>(&sql)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn suggestions(pool: &PgPool, term: &str) -> Result<Vec<AgentSuggestion>, sqlx::Error> {
        let mut filters = Filters::new();
        filters
            .and_raw("is_active = TRUE")
            .and_any_ilike(&["agent_name", "display_name", "specializations::text"], term);

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, agent_name, display_name, specializations FROM agents",
        );
        filters.push_where(&mut qb);
        qb.push(" ORDER BY rating DESC LIMIT 5");

        qb.build_query_as::<AgentSuggestion>().fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: &Changes,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = changes.update_query("agents", "id", id);
        qb.push(" RETURNING *");
        qb.build_query_as::<Agent>().fetch_optional(pool).await
    }

    pub async fn set_featured(
        pool: &PgPool,
        id: i64,
        is_featured: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Agent>(
            "UPDATE agents SET is_featured = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(is_featured)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Recomputes `rating` and `total_reviews` from approved reviews
    pub async fn refresh_rating(conn: &mut PgConnection, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE agents SET
                rating = COALESCE((
                    SELECT ROUND(AVG(rating)::NUMERIC, 2)
                    FROM agent_reviews WHERE agent_id = $1 AND is_approved = TRUE
                ), 0),
                total_reviews = (
                    SELECT COUNT(*) FROM agent_reviews WHERE agent_id = $1 AND is_approved = TRUE
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM agents")
            .fetch_one(pool)
            .await
    }
}

/// Review row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentReview {
    pub id: i64,
    pub agent_id: i64,
    pub reviewer_id: Option<i64>,
    pub rating: i32,
    pub review_text: Option<String>,
    pub is_anonymous: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Review as shown on an agent's page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicReview {
    pub id: i64,
    pub rating: i32,
    pub review_text: Option<String>,
    /// "Anonymous" for anonymous reviews
    pub reviewer_name: String,
    pub created_at: DateTime<Utc>,
}

impl AgentReview {
    /// Stores an unapproved review
    pub async fn create(
        pool: &PgPool,
        agent_id: i64,
        reviewer_id: i64,
        rating: i32,
        review_text: Option<String>,
        is_anonymous: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AgentReview>(
            r#"
            INSERT INTO agent_reviews (agent_id, reviewer_id, rating, review_text, is_anonymous)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(agent_id)
        .bind(reviewer_id)
        .bind(rating)
        .bind(review_text)
        .bind(is_anonymous)
        .fetch_one(pool)
        .await
    }

    /// Marks a review approved; `None` if it does not exist
    pub async fn approve(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentReview>(
            "UPDATE agent_reviews SET is_approved = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Newest approved reviews of an agent
    pub async fn recent_approved(
        pool: &PgPool,
        agent_id: i64,
        limit: i64,
    ) -> Result<Vec<PublicReview>, sqlx::Error> {
        sqlx::query_as::<_, PublicReview>(
            r#"
            SELECT r.id, r.rating, r.review_text, r.created_at,
                   CASE
                       WHEN r.is_anonymous OR u.id IS NULL THEN 'Anonymous'
                       ELSE u.first_name || ' ' || u.last_name
                   END AS reviewer_name
            FROM agent_reviews r
            LEFT JOIN users u ON u.id = r.reviewer_id
            WHERE r.agent_id = $1 AND r.is_approved = TRUE
            ORDER BY r.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_whitelist() {
        assert_eq!(AgentSort::parse(Some("agent_name")), AgentSort::AgentName);
        assert_eq!(AgentSort::parse(Some("rating; DROP TABLE agents")), AgentSort::Rating);
        assert_eq!(AgentSort::parse(None), AgentSort::Rating);
    }

    #[test]
    fn test_sort_direction() {
        assert_eq!(AgentSort::Rating.order_by(None), "a.rating DESC, a.id DESC");
        assert_eq!(
            AgentSort::ExperienceYears.order_by(Some("ASC")),
            "a.experience_years ASC, a.id ASC"
        );
        assert_eq!(AgentSort::CreatedAt.order_by(Some("sideways")), "a.created_at DESC, a.id DESC");
    }

    #[test]
    fn test_search_filters() {
        let search = AgentSearch {
            search: Some("career".to_string()),
            specialization: Some("tech".to_string()),
            min_rating: Some(Decimal::new(45, 1)),
            featured: Some(true),
        };

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM agents a");
        search.filters().push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM agents a WHERE a.is_active = TRUE \
             AND (a.agent_name ILIKE $1 OR a.display_name ILIKE $2 OR a.bio ILIKE $3) \
             AND a.specializations::text ILIKE $4 AND a.rating >= $5 AND a.is_featured = $6"
        );
    }
}
