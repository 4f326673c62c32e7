/// Newsletter subscriptions and anonymous engagement tracking
///
/// Tracking rows carry a `session_id` and, when the visitor is logged in,
/// a `user_id`. They are written best-effort: callers log failures and move on.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsletterType {
    #[default]
    General,
    CareerAdvice,
    JobAlerts,
    Tutorials,
}

impl NewsletterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsletterType::General => "general",
            NewsletterType::CareerAdvice => "career_advice",
            NewsletterType::JobAlerts => "job_alerts",
            NewsletterType::Tutorials => "tutorials",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    PageView,
    TutorialView,
    ButtonClick,
    FormSubmit,
    Download,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::PageView => "page_view",
            InteractionType::TutorialView => "tutorial_view",
            InteractionType::ButtonClick => "button_click",
            InteractionType::FormSubmit => "form_submit",
            InteractionType::Download => "download",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorialAction {
    View,
    Play,
    Pause,
    Complete,
    Share,
}

impl TutorialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TutorialAction::View => "view",
            TutorialAction::Play => "play",
            TutorialAction::Pause => "pause",
            TutorialAction::Complete => "complete",
            TutorialAction::Share => "share",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsletterSubscription {
    pub id: i64,
    pub email: String,
    pub user_id: Option<i64>,
    pub subscription_type: String,
    pub source_page: Option<String>,
    pub is_active: bool,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl NewsletterSubscription {
    /// Latest row for this email and list, active or not
    pub async fn find(
        pool: &PgPool,
        email: &str,
        subscription_type: NewsletterType,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscription>(
            r#"
            SELECT * FROM newsletter_subscriptions
            WHERE LOWER(email) = LOWER($1) AND subscription_type = $2
            ORDER BY subscribed_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(subscription_type.as_str())
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        email: &str,
        user_id: Option<i64>,
        subscription_type: NewsletterType,
        source_page: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscription>(
            r#"
            INSERT INTO newsletter_subscriptions (email, user_id, subscription_type, source_page)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(user_id)
        .bind(subscription_type.as_str())
        .bind(source_page)
        .fetch_one(pool)
        .await
    }

    /// Reactivates a previously cancelled row
    pub async fn reactivate(
        pool: &PgPool,
        id: i64,
        user_id: Option<i64>,
        source_page: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscription>(
            r#"
            UPDATE newsletter_subscriptions
            SET is_active = TRUE, unsubscribed_at = NULL, subscribed_at = NOW(),
                user_id = COALESCE($2, user_id), source_page = COALESCE($3, source_page)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(source_page)
        .fetch_one(pool)
        .await
    }

    /// Deactivates every active row of `email`, or only one list when given
    ///
    /// Returns how many rows changed.
    pub async fn unsubscribe(
        pool: &PgPool,
        email: &str,
        subscription_type: Option<NewsletterType>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE newsletter_subscriptions
            SET is_active = FALSE, unsubscribed_at = NOW()
            WHERE LOWER(email) = LOWER($1) AND is_active = TRUE
              AND ($2::TEXT IS NULL OR subscription_type = $2)
            "#,
        )
        .bind(email)
        .bind(subscription_type.map(|t| t.as_str()))
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Rows tied to the user by id or by their email address
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: i64,
        email: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscription>(
            r#"
            SELECT * FROM newsletter_subscriptions
            WHERE user_id = $1 OR LOWER(email) = LOWER($2)
            ORDER BY subscribed_at DESC
            "#,
        )
        .bind(user_id)
        .bind(email)
        .fetch_all(pool)
        .await
    }
}

/// One tracked UI event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInteraction {
    pub user_id: Option<i64>,
    pub session_id: String,
    pub interaction_type: InteractionType,
    pub page_name: Option<String>,
    pub element_name: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewInteraction {
    pub async fn insert(self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO user_interactions
                (user_id, session_id, interaction_type, page_name, element_name, metadata, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(self.user_id)
        .bind(self.session_id)
        .bind(self.interaction_type.as_str())
        .bind(self.page_name)
        .bind(self.element_name)
        .bind(self.metadata)
        .bind(self.ip_address)
        .bind(self.user_agent)
        .fetch_one(pool)
        .await
    }
}

/// One tutorial video event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTutorialEvent {
    pub user_id: Option<i64>,
    pub session_id: String,
    pub tutorial_name: String,
    pub action_type: TutorialAction,
    pub watch_duration: i32,
    pub total_duration: i32,
    pub completion_percentage: Decimal,
}

impl NewTutorialEvent {
    pub async fn insert(self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO tutorial_engagement
                (user_id, session_id, tutorial_name, action_type, watch_duration,
                 total_duration, completion_percentage)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(self.user_id)
        .bind(self.session_id)
        .bind(self.tutorial_name)
        .bind(self.action_type.as_str())
        .bind(self.watch_duration)
        .bind(self.total_duration)
        .bind(self.completion_percentage)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_values_match_check_constraints() {
        assert_eq!(NewsletterType::default().as_str(), "general");
        assert_eq!(NewsletterType::CareerAdvice.as_str(), "career_advice");
        assert_eq!(InteractionType::FormSubmit.as_str(), "form_submit");
        assert_eq!(TutorialAction::Complete.as_str(), "complete");

        let parsed: InteractionType = serde_json::from_str("\"tutorial_view\"").unwrap();
        assert_eq!(parsed, InteractionType::TutorialView);
    }
}
