/// Career agent endpoints
///
/// Browsing is public. Managing a profile, booking a consultation and
/// reviewing an agent need a token.
///
/// # Bookings
///
/// A booking starts `pending`. The agent (or an admin) confirms, completes
/// or cancels it; the client can only cancel. Completed and cancelled
/// bookings are final.
///
/// # Reviews
///
/// Only a client with a completed booking may review an agent. Reviews are
/// hidden until an admin approves them, and approval recomputes the agent's
/// rating from the approved set.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use flexjobs_shared::{
    auth::{
        authorization::{require_admin, require_owner_or_admin, AuthzError},
        middleware::{authenticate, AuthContext},
    },
    db::query::{Changes, PageParams, PageQuery, Pagination},
    models::{
        agent::{Agent, AgentReview, AgentSearch, AgentSort, CreateAgent},
        booking::{Booking, BookingStatus},
    },
    quota::LimitType,
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

const DEFAULT_LIMIT: i64 = 12;
const MAX_LIMIT: i64 = 50;
const FEATURED_LIMIT: i64 = 6;
const DETAIL_REVIEWS: i64 = 5;
const MIN_SUGGESTION_CHARS: usize = 2;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/search/suggestions", get(suggestions))
        .route("/", get(list_agents))
        .route("/featured", get(featured_agents))
        .route("/:id", get(get_agent));

    let authenticated = Router::new()
        .route("/", post(create_agent))
        .route("/:id", put(update_agent).delete(delete_agent))
        .route("/:id/featured", put(set_featured))
        .route("/:id/bookings", post(create_booking))
        .route("/:id/reviews", post(create_review))
        .route("/bookings/mine", get(my_bookings))
        .route("/bookings/:bookingId/status", put(update_booking_status))
        .route("/reviews/:reviewId/approve", put(approve_review))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    public.merge(authenticated)
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SortQuery {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Agent profile fields shared by self-service and admin creation
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAgentRequest {
    #[validate(length(min = 2, max = 255, message = "Agent name must be 2-255 characters"))]
    pub agent_name: String,

    #[validate(length(max = 255, message = "Display name must be at most 255 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,

    pub avatar_url: Option<String>,

    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,

    #[serde(default)]
    #[validate(range(min = 0, max = 50, message = "Experience years must be between 0 and 50"))]
    pub experience_years: i32,

    #[validate(custom(function = "non_negative"))]
    pub hourly_rate: Option<Decimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub location: Option<String>,
    pub timezone: Option<String>,

    #[validate(url(message = "LinkedIn URL must be a valid URL"))]
    pub linkedin_url: Option<String>,

    #[validate(url(message = "Portfolio URL must be a valid URL"))]
    pub portfolio_url: Option<String>,
}

impl CreateAgentRequest {
    pub fn into_create(self, user_id: i64, is_featured: bool) -> CreateAgent {
        CreateAgent {
            user_id,
            agent_name: self.agent_name.trim().to_string(),
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            specializations: self.specializations,
            languages: self.languages,
            skills: self.skills,
            certifications: self.certifications,
            experience_years: self.experience_years,
            hourly_rate: self.hourly_rate,
            currency: self.currency.map(|c| c.to_ascii_uppercase()),
            location: self.location,
            timezone: self.timezone,
            linkedin_url: self.linkedin_url,
            portfolio_url: self.portfolio_url,
            is_featured,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAgentRequest {
    #[validate(length(min = 2, max = 255, message = "Agent name must be 2-255 characters"))]
    pub agent_name: Option<String>,

    #[validate(length(max = 255, message = "Display name must be at most 255 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,

    pub avatar_url: Option<String>,
    pub specializations: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,

    #[validate(range(min = 0, max = 50, message = "Experience years must be between 0 and 50"))]
    pub experience_years: Option<i32>,

    #[validate(custom(function = "non_negative"))]
    pub hourly_rate: Option<Decimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub location: Option<String>,
    pub timezone: Option<String>,

    #[validate(url(message = "LinkedIn URL must be a valid URL"))]
    pub linkedin_url: Option<String>,

    #[validate(url(message = "Portfolio URL must be a valid URL"))]
    pub portfolio_url: Option<String>,

    /// Honored for admins only
    pub is_active: Option<bool>,
}

impl UpdateAgentRequest {
    pub fn changes(self, allow_admin_fields: bool) -> Changes {
        let mut changes = Changes::new();
        changes
            .set_opt("agent_name", self.agent_name.map(|n| n.trim().to_string()))
            .set_opt("display_name", self.display_name)
            .set_opt("bio", self.bio)
            .set_opt("avatar_url", self.avatar_url)
            .set_opt("specializations", self.specializations.map(|v| json!(v)))
            .set_opt("languages", self.languages.map(|v| json!(v)))
            .set_opt("skills", self.skills.map(|v| json!(v)))
            .set_opt("certifications", self.certifications.map(|v| json!(v)))
            .set_opt("experience_years", self.experience_years)
            .set_opt("hourly_rate", self.hourly_rate)
            .set_opt("currency", self.currency.map(|c| c.to_ascii_uppercase()))
            .set_opt("location", self.location)
            .set_opt("timezone", self.timezone)
            .set_opt("linkedin_url", self.linkedin_url)
            .set_opt("portfolio_url", self.portfolio_url);
        if allow_admin_fields {
            changes.set_opt("is_active", self.is_active);
        }
        changes
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeaturedRequest {
    #[serde(default)]
    pub is_featured: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(custom(function = "in_future"))]
    pub scheduled_at: DateTime<Utc>,

    #[serde(default = "default_duration")]
    #[validate(range(min = 15, max = 240, message = "Duration must be between 15 and 240 minutes"))]
    pub duration_minutes: i32,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

fn default_duration() -> i32 {
    60
}

fn in_future(at: &DateTime<Utc>) -> Result<(), validator::ValidationError> {
    if *at > Utc::now() {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("in_future");
        err.message = Some("Booking must be scheduled in the future".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 2000, message = "Review must be at most 2000 characters"))]
    pub review_text: Option<String>,

    #[serde(default)]
    pub is_anonymous: bool,
}

/// Which status changes a caller may make on a booking
pub fn booking_transition_allowed(
    current: BookingStatus,
    next: BookingStatus,
    is_agent_side: bool,
) -> bool {
    if current.is_final() || current == next || next == BookingStatus::Pending {
        return false;
    }
    is_agent_side || next == BookingStatus::Cancelled
}

pub async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> ApiResult<Json<Value>> {
    let term = query.q.as_deref().map(str::trim).unwrap_or_default();
    if term.chars().count() < MIN_SUGGESTION_CHARS {
        return Ok(Json(json!({ "suggestions": [] })));
    }

    let suggestions = Agent::suggestions(&state.db, term).await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<AgentSearch>,
    Query(sort): Query<SortQuery>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = search.filters();
    let sort_by = AgentSort::parse(sort.sort_by.as_deref());

    let total = Agent::count(&state.db, &filters).await?;
    let agents = Agent::list(&state.db, &filters, sort_by, sort.sort_order.as_deref(), page).await?;

    Ok(Json(json!({
        "agents": agents,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn featured_agents(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let agents = Agent::featured(&state.db, FEATURED_LIMIT).await?;
    Ok(Json(json!({ "agents": agents })))
}

pub async fn get_agent(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let agent = Agent::find_with_user(&state.db, id, false)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;
    let reviews = AgentReview::recent_approved(&state.db, id, DETAIL_REVIEWS).await?;

    Ok(Json(json!({
        "agent": agent,
        "reviews": reviews,
    })))
}

pub async fn create_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if Agent::find_by_user_id(&state.db, auth.user_id).await?.is_some() {
        return Err(ApiError::BadRequest("User already has an agent profile".to_string()));
    }

    let agent = Agent::create(&state.db, req.into_create(auth.user_id, false)).await?;

    tracing::info!(agent_id = agent.id, user_id = %auth.user_id, "Agent profile created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Agent profile created successfully",
            "agentId": agent.id,
            "agent": agent,
        })),
    ))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateAgentRequest>,
) -> ApiResult<Json<Value>> {
    let agent = Agent::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;
    require_owner_or_admin(&auth, agent.user_id)?;

    let changes = req.changes(auth.is_admin());
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let agent = Agent::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    tracing::info!(agent_id = id, user_id = %auth.user_id, "Agent profile updated");

    Ok(Json(json!({
        "message": "Agent profile updated successfully",
        "agent": agent,
    })))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let agent = Agent::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;
    require_owner_or_admin(&auth, agent.user_id)?;

    Agent::delete(&state.db, id).await?;

    tracing::info!(agent_id = id, user_id = %auth.user_id, "Agent profile deleted");

    Ok(Json(json!({ "message": "Agent profile deleted successfully" })))
}

pub async fn set_featured(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<FeaturedRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    let is_featured = req
        .is_featured
        .as_bool()
        .ok_or_else(|| ApiError::BadRequest("is_featured must be a boolean".to_string()))?;

    Agent::set_featured(&state.db, id, is_featured)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    let verb = if is_featured { "featured" } else { "unfeatured" };
    Ok(Json(json!({ "message": format!("Agent {} successfully", verb) })))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let agent = Agent::find_by_id(&state.db, id)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    if agent.user_id == auth.user_id {
        return Err(ApiError::BadRequest("You cannot book a consultation with yourself".to_string()));
    }

    state.limits.enforce(auth.user_id, LimitType::AgentConsultations).await?;

    let booking = Booking::create(
        &state.db,
        agent.id,
        auth.user_id,
        req.scheduled_at,
        req.duration_minutes,
        req.notes,
    )
    .await?;

    tracing::info!(booking_id = booking.id, agent_id = agent.id, user_id = %auth.user_id, "Consultation booked");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Consultation booked successfully",
            "booking": booking,
        })),
    ))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let bookings = Booking::list_for_client(&state.db, auth.user_id).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<BookingStatusRequest>,
) -> ApiResult<Json<Value>> {
    let found = Booking::find_with_agent(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    let is_agent_side = found.agent_user_id == auth.user_id || auth.is_admin();
    let is_client = found.booking.client_id == auth.user_id;
    if !is_agent_side && !is_client {
        return Err(AuthzError::AccessDenied.into());
    }

    let current = found
        .booking
        .get_status()
        .ok_or_else(|| ApiError::InternalError(format!("Unknown booking status: {}", found.booking.status)))?;

    if !booking_transition_allowed(current, req.status, is_agent_side) {
        return Err(ApiError::BadRequest(format!(
            "Cannot change booking from {} to {}",
            current.as_str(),
            req.status.as_str()
        )));
    }

    let booking = Booking::update_status(&state.db, booking_id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    tracing::info!(booking_id, status = req.status.as_str(), user_id = %auth.user_id, "Booking status updated");

    Ok(Json(json!({
        "message": "Booking status updated successfully",
        "booking": booking,
    })))
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if Agent::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("Agent not found".to_string()));
    }

    if !Booking::has_completed(&state.db, auth.user_id, id).await? {
        return Err(AuthzError::Denied(
            "You can only review agents after a completed consultation".to_string(),
        )
        .into());
    }

    let review = AgentReview::create(
        &state.db,
        id,
        auth.user_id,
        req.rating,
        req.review_text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        req.is_anonymous,
    )
    .await?;

    tracing::info!(review_id = review.id, agent_id = id, user_id = %auth.user_id, "Agent review submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Review submitted and awaiting approval",
            "review": review,
        })),
    ))
}

pub async fn approve_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(review_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    let mut tx = state.db.begin().await?;
    let review = AgentReview::approve(&mut tx, review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;
    Agent::refresh_rating(&mut tx, review.agent_id).await?;
    tx.commit().await?;

    tracing::info!(review_id, agent_id = review.agent_id, admin_id = %auth.user_id, "Agent review approved");

    Ok(Json(json!({
        "message": "Review approved successfully",
        "review": review,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_create_request_validation() {
        let req: CreateAgentRequest = serde_json::from_value(json!({
            "agent_name": "Jordan Career Coaching",
            "specializations": ["tech", "resumes"],
            "experience_years": 8
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.specializations.len(), 2);
        assert!(req.languages.is_empty());

        let req: CreateAgentRequest =
            serde_json::from_value(json!({ "agent_name": "J", "experience_years": 51 })).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("agent_name"));
        assert!(errors.field_errors().contains_key("experience_years"));
    }

    #[test]
    fn test_update_changes_hide_admin_fields() {
        let body = json!({ "bio": "Hi", "skills": ["interviewing"], "is_active": false });

        let req: UpdateAgentRequest = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(req.changes(false).len(), 2);

        let req: UpdateAgentRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.changes(true).len(), 3);
    }

    #[test]
    fn test_booking_must_be_in_future() {
        let req = CreateBookingRequest {
            scheduled_at: Utc::now() - Duration::hours(1),
            duration_minutes: 60,
            notes: None,
        };
        assert!(req.validate().is_err());

        let req = CreateBookingRequest {
            scheduled_at: Utc::now() + Duration::days(2),
            duration_minutes: 300,
            notes: None,
        };
        assert!(req.validate().is_err());

        let req: CreateBookingRequest = serde_json::from_value(json!({
            "scheduled_at": (Utc::now() + Duration::days(2)).to_rfc3339()
        }))
        .unwrap();
        assert_eq!(req.duration_minutes, 60);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_booking_transitions() {
        use BookingStatus::*;

        assert!(booking_transition_allowed(Pending, Confirmed, true));
        assert!(booking_transition_allowed(Confirmed, Completed, true));
        assert!(booking_transition_allowed(Pending, Cancelled, false));

        assert!(!booking_transition_allowed(Pending, Confirmed, false));
        assert!(!booking_transition_allowed(Completed, Cancelled, true));
        assert!(!booking_transition_allowed(Cancelled, Confirmed, true));
        assert!(!booking_transition_allowed(Confirmed, Pending, true));
    }

    #[test]
    fn test_review_rating_range() {
        let req: CreateReviewRequest = serde_json::from_value(json!({ "rating": 6 })).unwrap();
        assert!(req.validate().is_err());

        let req: CreateReviewRequest = serde_json::from_value(json!({ "rating": 4 })).unwrap();
        assert!(req.validate().is_ok());
        assert!(!req.is_anonymous);
    }
}
