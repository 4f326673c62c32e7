/// Subscription plan endpoints
///
/// - `GET  /api/subscriptions/plans` - public plan catalog
/// - `GET  /api/subscriptions/current`
/// - `GET  /api/subscriptions/history`
/// - `POST /api/subscriptions/subscribe`
/// - `PUT  /api/subscriptions/cancel`
/// - `PUT  /api/subscriptions/change-plan`
/// - `GET  /api/subscriptions/limits` - month-to-date usage against the plan
/// - `GET  /api/subscriptions/admin/all`
/// - `POST /api/subscriptions/admin/plans`
///
/// A user has at most one current subscription: status `active` or `trial`
/// with `expires_at` in the future. Without one, the Free plan applies.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use flexjobs_shared::{
    auth::{
        authorization::require_admin,
        middleware::{authenticate, AuthContext},
    },
    db::query::{PageParams, PageQuery, Pagination},
    models::subscription::{
        BillingPeriod, CreatePlan, SubscriptionPlan, SubscriptionStatus, UserSubscription,
    },
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{non_negative, ValidatedJson},
};

const HISTORY_DEFAULT_LIMIT: i64 = 10;
const ADMIN_DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;
const DEFAULT_PAYMENT_METHOD: &str = "manual";

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/plans", get(list_plans));

    let authenticated = Router::new()
        .route("/current", get(current_subscription))
        .route("/history", get(history))
        .route("/subscribe", post(subscribe))
        .route("/cancel", put(cancel))
        .route("/change-plan", put(change_plan))
        .route("/limits", get(limits))
        .route("/admin/all", get(admin_list))
        .route("/admin/plans", post(admin_create_plan))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    public.merge(authenticated)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(range(min = 1, message = "Valid plan ID is required"))]
    pub plan_id: i64,

    #[validate(length(min = 1, max = 100, message = "Payment method must be 1-100 characters"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePlanRequest {
    #[validate(range(min = 1, message = "Valid plan ID is required"))]
    pub new_plan_id: i64,

    #[validate(length(min = 1, max = 100, message = "Payment method must be 1-100 characters"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminSubscriptionQuery {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Plan name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "non_negative"))]
    pub price: Decimal,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub billing_period: BillingPeriod,

    #[serde(default)]
    pub features: Vec<String>,

    /// `-1` for unlimited
    #[validate(range(min = -1, message = "Max job applications must be -1 (unlimited) or more"))]
    pub max_job_applications: i32,

    #[validate(range(min = -1, message = "Max agent consultations must be -1 (unlimited) or more"))]
    pub max_agent_consultations: i32,
}

async fn find_plan(state: &AppState, id: i64) -> ApiResult<SubscriptionPlan> {
    SubscriptionPlan::find_active(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscription plan not found".to_string()))
}

pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let plans = SubscriptionPlan::list_active(&state.db).await?;
    Ok(Json(json!({ "plans": plans })))
}

pub async fn current_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    if let Some(subscription) = UserSubscription::current(&state.db, auth.user_id).await? {
        return Ok(Json(json!({ "subscription": subscription })));
    }

    let free = SubscriptionPlan::find_free(&state.db).await?;
    Ok(Json(json!({
        "subscription": null,
        "plan": free,
    })))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, HISTORY_DEFAULT_LIMIT, MAX_LIMIT);

    let total = UserSubscription::count_history(&state.db, auth.user_id).await?;
    let subscriptions = UserSubscription::history(&state.db, auth.user_id, page).await?;

    Ok(Json(json!({
        "subscriptions": subscriptions,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let plan = find_plan(&state, req.plan_id).await?;
    let payment_method = req
        .payment_method
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

    let mut tx = state.db.begin().await?;
    if UserSubscription::current_with(&mut tx, auth.user_id).await?.is_some() {
        return Err(ApiError::BadRequest(
            "You already have an active subscription. Please cancel it first or upgrade/downgrade."
                .to_string(),
        ));
    }
    let subscription = UserSubscription::create(&mut tx, auth.user_id, &plan, &payment_method).await?;
    tx.commit().await?;

    tracing::info!(
        subscription_id = subscription.id,
        plan_id = plan.id,
        user_id = %auth.user_id,
        "Subscription created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Subscription created successfully",
            "subscription": subscription,
            "plan": plan,
        })),
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.db.begin().await?;
    let current = UserSubscription::current_with(&mut tx, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active subscription found".to_string()))?;

    let cancelled = UserSubscription::cancel(&mut tx, current.subscription.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active subscription found".to_string()))?;
    tx.commit().await?;

    tracing::info!(subscription_id = cancelled.id, user_id = %auth.user_id, "Subscription cancelled");

    Ok(Json(json!({
        "message": "Subscription cancelled successfully",
        "subscription": cancelled,
    })))
}

/// Swaps the current subscription for a new one on another plan
///
/// Without a current subscription this is a plain subscribe.
pub async fn change_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<ChangePlanRequest>,
) -> ApiResult<Json<Value>> {
    let plan = find_plan(&state, req.new_plan_id).await?;

    let mut tx = state.db.begin().await?;
    let current = UserSubscription::current_with(&mut tx, auth.user_id).await?;

    let payment_method = match &current {
        Some(current) if current.subscription.plan_id == plan.id => {
            return Err(ApiError::BadRequest("You are already subscribed to this plan".to_string()));
        }
        Some(current) => {
            UserSubscription::cancel(&mut tx, current.subscription.id).await?;
            req.payment_method
                .unwrap_or_else(|| current.subscription.payment_method.clone())
        }
        None => req
            .payment_method
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
    };

    let subscription = UserSubscription::create(&mut tx, auth.user_id, &plan, &payment_method).await?;
    tx.commit().await?;

    tracing::info!(
        subscription_id = subscription.id,
        from_plan_id = ?current.as_ref().map(|c| c.subscription.plan_id),
        to_plan_id = plan.id,
        user_id = %auth.user_id,
        "Subscription plan changed"
    );

    Ok(Json(json!({
        "message": "Subscription plan changed successfully",
        "subscription": subscription,
        "plan": plan,
    })))
}

pub async fn limits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let report = state.limits.usage(auth.user_id).await?;
    Ok(Json(json!({ "limits": report })))
}

pub async fn admin_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<AdminSubscriptionQuery>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    let page = PageParams::from_query(page, ADMIN_DEFAULT_LIMIT, MAX_LIMIT);
    let filters = UserSubscription::admin_filters(filter.status, filter.plan_id);

    let total = UserSubscription::count_all(&state.db, &filters).await?;
    let subscriptions = UserSubscription::list_all(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "subscriptions": subscriptions,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn admin_create_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreatePlanRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_admin(&auth)?;

    let plan = SubscriptionPlan::create(
        &state.db,
        CreatePlan {
            name: req.name.trim().to_string(),
            description: req.description,
            price: req.price,
            currency: req
                .currency
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
            billing_period: req.billing_period,
            features: req.features,
            max_job_applications: req.max_job_applications,
            max_agent_consultations: req.max_agent_consultations,
        },
    )
    .await?;

    tracing::info!(plan_id = plan.id, admin_id = %auth.user_id, "Subscription plan created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Subscription plan created successfully",
            "plan": plan,
        })),
    ))
}
