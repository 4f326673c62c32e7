/// Monthly subscription limits
///
/// Each plan caps two things per calendar month (UTC):
///
/// - job applications submitted
/// - agent consultations booked
///
/// The plan in effect is the user's current active/trial subscription, else
/// the Free plan, else nothing at all (unlimited). A limit of `-1` means
/// unlimited.
///
/// Usage counts everything since 00:00 UTC on the first of the month. For
/// consultations, enforcement also counts pending bookings so that a burst
/// of unconfirmed requests cannot exceed the allowance; the usage report
/// shows confirmed and completed ones only.
///
/// # Example
///
/// ```no_run
/// use flexjobs_shared::quota::{LimitEnforcer, LimitType};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, user_id: i64) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = LimitEnforcer::new(pool);
///
/// // Fails with LimitError::LimitExceeded once the allowance is used up
/// enforcer.enforce(user_id, LimitType::JobApplications).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::application::Application;
use crate::models::booking::Booking;
use crate::models::subscription::{SubscriptionPlan, UserSubscription, UNLIMITED};

#[derive(Debug, thiserror::Error)]
pub enum LimitError {
    #[error("{} limit reached for this month ({current}/{limit})", .limit_type.as_str())]
    LimitExceeded {
        limit_type: LimitType,
        limit: i32,
        current: i64,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    JobApplications,
    AgentConsultations,
}

impl LimitType {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::JobApplications => "Job application",
            LimitType::AgentConsultations => "Agent consultation",
        }
    }
}

/// Limits of the plan in effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// `None` when no plan applies at all
    pub plan_id: Option<i64>,
    pub plan_name: Option<String>,
    pub max_job_applications: i32,
    pub max_agent_consultations: i32,
}

impl PlanLimits {
    pub fn unlimited() -> Self {
        Self {
            plan_id: None,
            plan_name: None,
            max_job_applications: UNLIMITED,
            max_agent_consultations: UNLIMITED,
        }
    }

    pub fn get(&self, limit_type: LimitType) -> i32 {
        match limit_type {
            LimitType::JobApplications => self.max_job_applications,
            LimitType::AgentConsultations => self.max_agent_consultations,
        }
    }
}

impl From<&SubscriptionPlan> for PlanLimits {
    fn from(plan: &SubscriptionPlan) -> Self {
        Self {
            plan_id: Some(plan.id),
            plan_name: Some(plan.name.clone()),
            max_job_applications: plan.max_job_applications,
            max_agent_consultations: plan.max_agent_consultations,
        }
    }
}

/// Usage of one limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUsage {
    pub used: i64,
    /// `-1` for unlimited
    pub max: i32,
    /// `-1` for unlimited, otherwise never negative
    pub remaining: i64,
}

impl LimitUsage {
    pub fn new(used: i64, max: i32) -> Self {
        Self {
            used,
            max,
            remaining: remaining(max, used),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.max != UNLIMITED && self.used >= i64::from(self.max)
    }
}

/// Month-to-date usage report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub plan: PlanLimits,
    pub period_start: DateTime<Utc>,
    pub job_applications: LimitUsage,
    pub agent_consultations: LimitUsage,
}

/// `max(0, max - used)`, or `-1` when unlimited
pub fn remaining(max: i32, used: i64) -> i64 {
    if max == UNLIMITED {
        -1
    } else {
        (i64::from(max) - used).max(0)
    }
}

/// 00:00 UTC on the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Resolves plans and counts usage against them
#[derive(Clone)]
pub struct LimitEnforcer {
    db: PgPool,
}

impl LimitEnforcer {
    pub fn new(db: PgPool) -> Self {
        LimitEnforcer { db }
    }

    /// Limits of the plan in effect for `user_id`
    pub async fn plan_limits(&self, user_id: i64) -> Result<PlanLimits, LimitError> {
        if let Some(current) = UserSubscription::current(&self.db, user_id).await? {
            return Ok(PlanLimits {
                plan_id: Some(current.subscription.plan_id),
                plan_name: Some(current.plan_name),
                max_job_applications: current.max_job_applications,
                max_agent_consultations: current.max_agent_consultations,
            });
        }

        Ok(SubscriptionPlan::find_free(&self.db)
            .await?
            .as_ref()
            .map(PlanLimits::from)
            .unwrap_or_else(PlanLimits::unlimited))
    }

    async fn count(
        &self,
        user_id: i64,
        limit_type: LimitType,
        since: DateTime<Utc>,
        include_pending: bool,
    ) -> Result<i64, sqlx::Error> {
        match limit_type {
            LimitType::JobApplications => {
                Application::count_for_user_since(&self.db, user_id, since).await
            }
            LimitType::AgentConsultations => {
                Booking::count_for_client_since(&self.db, user_id, since, include_pending).await
            }
        }
    }

    /// Current usage of one limit, counting pending bookings
    pub async fn check(&self, user_id: i64, limit_type: LimitType) -> Result<LimitUsage, LimitError> {
        let limits = self.plan_limits(user_id).await?;
        let max = limits.get(limit_type);

        if max == UNLIMITED {
            return Ok(LimitUsage::new(0, max));
        }

        let used = self
            .count(user_id, limit_type, month_start(Utc::now()), true)
            .await?;

        Ok(LimitUsage::new(used, max))
    }

    /// Fails with [`LimitError::LimitExceeded`] if the allowance is used up
    pub async fn enforce(&self, user_id: i64, limit_type: LimitType) -> Result<(), LimitError> {
        let usage = self.check(user_id, limit_type).await?;

        if usage.is_exhausted() {
            tracing::info!(
                user_id,
                limit = usage.max,
                current = usage.used,
                limit_type = limit_type.as_str(),
                "Subscription limit reached"
            );
            return Err(LimitError::LimitExceeded {
                limit_type,
                limit: usage.max,
                current: usage.used,
            });
        }

        Ok(())
    }

    /// Month-to-date usage of both limits
    pub async fn usage(&self, user_id: i64) -> Result<UsageReport, LimitError> {
        let plan = self.plan_limits(user_id).await?;
        let period_start = month_start(Utc::now());

        let applications = self
            .count(user_id, LimitType::JobApplications, period_start, false)
            .await?;
        let consultations = self
            .count(user_id, LimitType::AgentConsultations, period_start, false)
            .await?;

        Ok(UsageReport {
            job_applications: LimitUsage::new(applications, plan.max_job_applications),
            agent_consultations: LimitUsage::new(consultations, plan.max_agent_consultations),
            plan,
            period_start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining() {
        assert_eq!(remaining(5, 2), 3);
        assert_eq!(remaining(5, 9), 0);
        assert_eq!(remaining(0, 0), 0);
        assert_eq!(remaining(UNLIMITED, 1_000), -1);
    }

    #[test]
    fn test_limit_usage_exhausted() {
        assert!(LimitUsage::new(5, 5).is_exhausted());
        assert!(LimitUsage::new(0, 0).is_exhausted());
        assert!(!LimitUsage::new(4, 5).is_exhausted());
        assert!(!LimitUsage::new(10_000, UNLIMITED).is_exhausted());
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 22, 45, 10).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_plan_limits_get() {
        let limits = PlanLimits {
            plan_id: Some(2),
            plan_name: Some("Basic".to_string()),
            max_job_applications: 25,
            max_agent_consultations: 1,
        };
        assert_eq!(limits.get(LimitType::JobApplications), 25);
        assert_eq!(limits.get(LimitType::AgentConsultations), 1);
        assert_eq!(PlanLimits::unlimited().get(LimitType::JobApplications), UNLIMITED);
    }

    #[test]
    fn test_limit_error_display() {
        let err = LimitError::LimitExceeded {
            limit_type: LimitType::JobApplications,
            limit: 5,
            current: 5,
        };
        assert_eq!(err.to_string(), "Job application limit reached for this month (5/5)");
    }
}
