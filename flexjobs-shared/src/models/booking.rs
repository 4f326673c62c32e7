/// Consultation bookings between clients and agents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Finished bookings cannot change status again
    pub fn is_final(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub agent_id: i64,
    pub client_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn get_status(&self) -> Option<BookingStatus> {
        BookingStatus::from_str(&self.status)
    }
}

/// Booking with agent name and the agent's user id
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookingWithAgent {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub booking: Booking,
    pub agent_name: String,
    #[serde(skip_serializing)]
    pub agent_user_id: i64,
}

const WITH_AGENT: &str = r#"
    SELECT b.*, a.agent_name, a.user_id AS agent_user_id
    FROM agent_bookings b
    JOIN agents a ON a.id = b.agent_id
"#;

impl Booking {
    pub async fn create(
        pool: &PgPool,
        agent_id: i64,
        client_id: i64,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i32,
        notes: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO agent_bookings (agent_id, client_id, scheduled_at, duration_minutes, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(agent_id)
        .bind(client_id)
        .bind(scheduled_at)
        .bind(duration_minutes)
        .bind(notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_with_agent(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<BookingWithAgent>, sqlx::Error> {
        let sql = format!("{} WHERE b.id = $1", WITH_AGENT);
        sqlx::query_as::<_, BookingWithAgent>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Bookings made by a client, soonest first
    pub async fn list_for_client(
        pool: &PgPool,
        client_id: i64,
    ) -> Result<Vec<BookingWithAgent>, sqlx::Error> {
        let sql = format!(
            "{} WHERE b.client_id = $1 ORDER BY b.scheduled_at DESC",
            WITH_AGENT
        );
        sqlx::query_as::<_, BookingWithAgent>(&sql)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: i64,
        status: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            "UPDATE agent_bookings SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(pool)
        .await
    }

    /// Whether the client has completed at least one session with the agent
    pub async fn has_completed(
        pool: &PgPool,
        client_id: i64,
        agent_id: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM agent_bookings
                WHERE client_id = $1 AND agent_id = $2 AND status = 'completed'
            )
            "#,
        )
        .bind(client_id)
        .bind(agent_id)
        .fetch_one(pool)
        .await
    }

    /// Bookings since `since` that count against the consultation allowance
    ///
    /// With `include_pending` the pending ones count too, which is what the
    /// limit check wants; the usage report only counts confirmed work.
    pub async fn count_for_client_since(
        pool: &PgPool,
        client_id: i64,
        since: DateTime<Utc>,
        include_pending: bool,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM agent_bookings
            WHERE client_id = $1 AND created_at >= $2
              AND (status IN ('confirmed', 'completed') OR ($3 AND status = 'pending'))
            "#,
        )
        .bind(client_id)
        .bind(since)
        .bind(include_pending)
        .fetch_one(pool)
        .await
    }
}
