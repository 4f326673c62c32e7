/// Newsletter and engagement tracking endpoints
///
/// These work for anonymous visitors; a valid token only adds the user id
/// to what gets recorded. Tracking writes are best-effort and a failed
/// insert never fails the request.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use flexjobs_shared::{
    auth::middleware::{authenticate, optional_auth, AuthContext},
    models::{
        interaction::{
            InteractionType, NewInteraction, NewTutorialEvent, NewsletterSubscription,
            NewsletterType, TutorialAction,
        },
        user::normalize_email,
    },
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{client_ip, session_id, user_agent, ValidatedJson},
};

pub fn routes(state: &AppState) -> Router<AppState> {
    let visitors = Router::new()
        .route("/newsletter/subscribe", post(subscribe))
        .route("/newsletter/unsubscribe", post(unsubscribe))
        .route("/tutorial/track", post(track_tutorial))
        .route("/interaction/track", post(track_interaction))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), optional_auth));

    let authenticated = Router::new()
        .route("/newsletter/my-subscriptions", get(my_subscriptions))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    visitors.merge(authenticated)
}

/// Who is doing what, from headers and the optional token
struct Visitor {
    user_id: Option<i64>,
    session_id: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl Visitor {
    fn from_request(
        auth: Option<&AuthContext>,
        headers: &HeaderMap,
        peer: Option<&ConnectInfo<SocketAddr>>,
    ) -> Self {
        Self {
            user_id: auth.map(|a| a.user_id),
            session_id: session_id(headers),
            ip_address: client_ip(headers, peer),
            user_agent: user_agent(headers),
        }
    }

    async fn track(
        &self,
        state: &AppState,
        interaction_type: InteractionType,
        page_name: Option<String>,
        element_name: Option<String>,
        metadata: Option<Value>,
    ) {
        let interaction = NewInteraction {
            user_id: self.user_id,
            session_id: self.session_id.clone(),
            interaction_type,
            page_name,
            element_name,
            metadata,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        };

        if let Err(e) = interaction.insert(&state.db).await {
            tracing::warn!(
                error = %e,
                interaction_type = interaction_type.as_str(),
                session_id = %self.session_id,
                "Failed to record interaction"
            );
        }
    }
}

fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO && *value <= Decimal::ONE_HUNDRED {
        Ok(())
    } else {
        let mut err = ValidationError::new("percentage");
        err.message = Some("Completion percentage must be between 0 and 100".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[serde(default)]
    pub subscription_type: NewsletterType,

    #[validate(length(max = 100, message = "Source page must be at most 100 characters"))]
    pub source_page: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UnsubscribeRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    pub subscription_type: Option<NewsletterType>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TutorialTrackRequest {
    #[validate(length(min = 1, max = 255, message = "Tutorial name is required"))]
    pub tutorial_name: String,

    pub action_type: TutorialAction,

    #[serde(default)]
    #[validate(range(min = 0, message = "Watch duration must be zero or greater"))]
    pub watch_duration: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Total duration must be zero or greater"))]
    pub total_duration: i32,

    #[serde(default)]
    #[validate(custom(function = "percentage"))]
    pub completion_percentage: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InteractionTrackRequest {
    pub interaction_type: InteractionType,

    #[validate(length(max = 100, message = "Page name must be at most 100 characters"))]
    pub page_name: Option<String>,

    #[validate(length(max = 100, message = "Element name must be at most 100 characters"))]
    pub element_name: Option<String>,

    pub metadata: Option<Value>,
}

pub async fn subscribe(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let auth = auth.map(|Extension(a)| a);
    let visitor = Visitor::from_request(auth.as_ref(), &headers, peer.as_ref());
    let email = normalize_email(&req.email);

    if let Some(existing) = NewsletterSubscription::find(&state.db, &email, req.subscription_type).await? {
        if existing.is_active {
            return Err(ApiError::BadRequest(
                "Email is already subscribed to our newsletter".to_string(),
            ));
        }

        let subscription =
            NewsletterSubscription::reactivate(&state.db, existing.id, visitor.user_id, req.source_page)
                .await?;

        tracing::info!(subscription_id = subscription.id, "Newsletter subscription reactivated");

        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Welcome back! Your newsletter subscription has been reactivated.",
                "subscription": subscription,
            })),
        ));
    }

    let subscription = NewsletterSubscription::create(
        &state.db,
        &email,
        visitor.user_id,
        req.subscription_type,
        req.source_page.clone(),
    )
    .await?;

    visitor
        .track(
            &state,
            InteractionType::FormSubmit,
            req.source_page,
            Some("newsletter_subscribe".to_string()),
            Some(json!({ "subscription_type": req.subscription_type.as_str() })),
        )
        .await;

    tracing::info!(
        subscription_id = subscription.id,
        subscription_type = req.subscription_type.as_str(),
        "Newsletter subscription created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Successfully subscribed to our newsletter!",
            "subscription": subscription,
        })),
    ))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UnsubscribeRequest>,
) -> ApiResult<Json<Value>> {
    let email = normalize_email(&req.email);
    let removed = NewsletterSubscription::unsubscribe(&state.db, &email, req.subscription_type).await?;

    if removed == 0 {
        return Err(ApiError::NotFound("Email not found in our newsletter list".to_string()));
    }

    tracing::info!(removed, "Newsletter unsubscribed");

    Ok(Json(json!({ "message": "Successfully unsubscribed from newsletter" })))
}

pub async fn track_tutorial(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<TutorialTrackRequest>,
) -> Json<Value> {
    let event = NewTutorialEvent {
        user_id: auth.map(|Extension(a)| a.user_id),
        session_id: session_id(&headers),
        tutorial_name: req.tutorial_name,
        action_type: req.action_type,
        watch_duration: req.watch_duration,
        total_duration: req.total_duration,
        completion_percentage: req.completion_percentage,
    };
    let action = event.action_type;

    if let Err(e) = event.insert(&state.db).await {
        tracing::warn!(error = %e, action = action.as_str(), "Failed to record tutorial event");
    }

    Json(json!({ "message": "Tutorial interaction tracked successfully" }))
}

pub async fn track_interaction(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<InteractionTrackRequest>,
) -> Json<Value> {
    let auth = auth.map(|Extension(a)| a);
    let visitor = Visitor::from_request(auth.as_ref(), &headers, peer.as_ref());

    visitor
        .track(&state, req.interaction_type, req.page_name, req.element_name, req.metadata)
        .await;

    Json(json!({ "message": "Interaction tracked successfully" }))
}

pub async fn my_subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let subscriptions = NewsletterSubscription::list_for_user(&state.db, auth.user_id, &auth.email).await?;
    Ok(Json(json!({ "subscriptions": subscriptions })))
}
