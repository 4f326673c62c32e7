/// Subscription plans and user subscriptions
///
/// Plans cap how many job applications and agent consultations a user may
/// start per calendar month; `-1` means unlimited. A user has at most one
/// subscription in effect: the newest `active` or `trial` row whose
/// `expires_at` is still in the future. Without one, the Free plan applies.
///
/// # Example
///
/// ```no_run
/// use flexjobs_shared::models::subscription::{SubscriptionPlan, UserSubscription};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, user_id: i64) -> Result<(), sqlx::Error> {
/// match UserSubscription::current(&pool, user_id).await? {
///     Some(sub) => println!("on {} until {}", sub.plan_name, sub.subscription.expires_at),
///     None => {
///         let free = SubscriptionPlan::find_free(&pool).await?;
///         println!("on {:?}", free.map(|p| p.name));
///     }
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::db::query::{Filters, PageParams};

/// Plan limit value meaning "no limit"
pub const UNLIMITED: i32 = -1;

/// Name of the plan that applies without a subscription
pub const FREE_PLAN_NAME: &str = "Free";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(BillingPeriod::Monthly),
            "yearly" => Some(BillingPeriod::Yearly),
            _ => None,
        }
    }

    /// End of one billing period starting at `start`
    ///
    /// Month arithmetic clamps to the last day of shorter months, so
    /// Jan 31 plus one month is Feb 28 (or 29).
    pub fn period_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            BillingPeriod::Monthly => Months::new(1),
            BillingPeriod::Yearly => Months::new(12),
        };
        start.checked_add_months(months).unwrap_or(start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trial,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "trial" => Some(SubscriptionStatus::Trial),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }

    /// Paid plans start active, free ones start as a trial
    pub fn initial_for_price(price: Decimal) -> Self {
        if price > Decimal::ZERO {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Trial
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub billing_period: String,
    pub features: Json<Vec<String>>,
    /// `-1` for unlimited
    pub max_job_applications: i32,
    /// `-1` for unlimited
    pub max_agent_consultations: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    pub fn get_billing_period(&self) -> Option<BillingPeriod> {
        BillingPeriod::from_str(&self.billing_period)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlan {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub billing_period: BillingPeriod,
    pub features: Vec<String>,
    pub max_job_applications: i32,
    pub max_agent_consultations: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSubscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub status: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Free-form label, e.g. "Visa ****4242" or "manual"
    pub payment_method: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription joined with its plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionWithPlan {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub subscription: UserSubscription,
    pub plan_name: String,
    pub plan_description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub billing_period: String,
    pub features: Json<Vec<String>>,
    pub max_job_applications: i32,
    pub max_agent_consultations: i32,
}

/// Admin view with the subscriber's identity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionWithUser {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub subscription: UserSubscription,
    pub plan_name: String,
    pub price: Decimal,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

const WITH_PLAN: &str = r#"
    SELECT s.*, p.name AS plan_name, p.description AS plan_description, p.price, p.currency,
           p.billing_period, p.features, p.max_job_applications, p.max_agent_consultations
    FROM user_subscriptions s
    JOIN subscription_plans p ON p.id = s.plan_id
"#;

const CURRENT_CONDITION: &str =
    "s.user_id = $1 AND s.status IN ('active', 'trial') AND s.expires_at > NOW()";

impl SubscriptionPlan {
    /// Active plans, cheapest first
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE is_active = TRUE ORDER BY price ASC, id ASC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_active(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_free(pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE name = $1 AND is_active = TRUE",
        )
        .bind(FREE_PLAN_NAME)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, data: CreatePlan) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            INSERT INTO subscription_plans
                (name, description, price, currency, billing_period, features,
                 max_job_applications, max_agent_consultations)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.price)
        .bind(data.currency)
        .bind(data.billing_period.as_str())
        .bind(Json(data.features))
        .bind(data.max_job_applications)
        .bind(data.max_agent_consultations)
        .fetch_one(pool)
        .await
    }
}

impl UserSubscription {
    /// The subscription in effect for a user, if any
    pub async fn current(pool: &PgPool, user_id: i64) -> Result<Option<SubscriptionWithPlan>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::current_with(&mut conn, user_id).await
    }

    /// Same as [`UserSubscription::current`], locking the row inside a transaction
    pub async fn current_with(
        conn: &mut PgConnection,
        user_id: i64,
    ) -> Result<Option<SubscriptionWithPlan>, sqlx::Error> {
        let sql = format!(
            "{} WHERE {} ORDER BY s.created_at DESC LIMIT 1 FOR UPDATE OF s",
            WITH_PLAN, CURRENT_CONDITION
        );
        sqlx::query_as::<_, SubscriptionWithPlan>(&sql)
            .bind(user_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn create(
        conn: &mut PgConnection,
        user_id: i64,
        plan: &SubscriptionPlan,
        payment_method: &str,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let period = plan.get_billing_period().unwrap_or(BillingPeriod::Monthly);
        let status = SubscriptionStatus::initial_for_price(plan.price);

        sqlx::query_as::<_, UserSubscription>(
            r#"
            INSERT INTO user_subscriptions (user_id, plan_id, status, starts_at, expires_at, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan.id)
        .bind(status.as_str())
        .bind(now)
        .bind(period.period_end(now))
        .bind(payment_method)
        .fetch_one(conn)
        .await
    }

    pub async fn cancel(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserSubscription>(
            r#"
            UPDATE user_subscriptions
            SET status = 'cancelled', cancelled_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// All subscriptions of a user, newest first
    pub async fn history(
        pool: &PgPool,
        user_id: i64,
        page: PageParams,
    ) -> Result<Vec<SubscriptionWithPlan>, sqlx::Error> {
        let sql = format!(
            "{} WHERE s.user_id = $1 ORDER BY s.created_at DESC LIMIT $2 OFFSET $3",
            WITH_PLAN
        );
        sqlx::query_as::<_, SubscriptionWithPlan>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(pool)
            .await
    }

    pub async fn count_history(pool: &PgPool, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    pub fn admin_filters(status: Option<SubscriptionStatus>, plan_id: Option<i64>) -> Filters {
        let mut filters = Filters::new();
        if let Some(status) = status {
            filters.and_eq("s.status", status.as_str());
        }
        if let Some(plan_id) = plan_id {
            filters.and_eq("s.plan_id", plan_id);
        }
        filters
    }

    pub async fn list_all(
        pool: &PgPool,
        filters: &Filters,
        page: PageParams,
    ) -> Result<Vec<SubscriptionWithUser>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT s.*, p.name AS plan_name, p.price, u.email, u.first_name, u.last_name
            FROM user_subscriptions s
            JOIN subscription_plans p ON p.id = s.plan_id
            JOIN users u ON u.id = s.user_id
            "#,
        );
        filters.push_where(&mut qb);
        qb.push(" ORDER BY s.created_at DESC");
        page.push_limit_offset(&mut qb);

        qb.build_query_as::<SubscriptionWithUser>().fetch_all(pool).await
    }

    pub async fn count_all(pool: &PgPool, filters: &Filters) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM user_subscriptions s");
        filters.push_where(&mut qb);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Whether an active subscription is billed to the given payment label
    pub async fn is_billed_to(
        conn: &mut PgConnection,
        user_id: i64,
        payment_label: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_subscriptions
                WHERE user_id = $1 AND status = 'active' AND payment_method = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(payment_label)
        .fetch_one(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();

        let monthly = BillingPeriod::Monthly.period_end(start);
        assert_eq!(monthly, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());

        let yearly = BillingPeriod::Yearly.period_end(start);
        assert_eq!(yearly, Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(
            SubscriptionStatus::initial_for_price(Decimal::new(999, 2)),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::initial_for_price(Decimal::ZERO),
            SubscriptionStatus::Trial
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(SubscriptionStatus::from_str("trial"), Some(SubscriptionStatus::Trial));
        assert_eq!(SubscriptionStatus::from_str("paused"), None);
        assert_eq!(BillingPeriod::from_str("weekly"), None);
    }
}
