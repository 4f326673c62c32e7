/// Admin dashboard endpoints
///
/// Every route needs an admin token. Responses are wrapped as
/// `{message, data}` for the dashboard frontend.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use flexjobs_shared::{
    auth::{
        authorization::require_admin,
        middleware::{authenticate, AuthContext},
        password::unusable_password_hash,
    },
    db::query::{AdminPagination, PageParams, PageQuery, Pagination},
    models::{
        agent::{Agent, AgentSort},
        application::Application,
        company::Company,
        job::Job,
        user::{normalize_email, CreateUser, User, UserType},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::agents::{approve_review, CreateAgentRequest, UpdateAgentRequest},
};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const RECENT_DAYS: i32 = 30;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", delete(delete_job))
        .route("/agents", get(list_agents).post(create_agent))
        .route("/agents/:id", get(get_agent).put(update_agent).delete(delete_agent))
        .route("/reviews/:reviewId/approve", put(approve_review))
        .route_layer(middleware::from_fn(admin_only))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate))
}

/// Rejects non-admins; runs after [`authenticate`]
async fn admin_only(
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_admin(&auth)?;
    Ok(next.run(request).await)
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminSearch {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateAgentRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[serde(default)]
    pub is_featured: bool,

    #[serde(flatten)]
    #[validate(nested)]
    pub profile: CreateAgentRequest,
}

/// Splits an agent name into first and last name for a new account
fn split_name(agent_name: &str) -> (String, String) {
    let mut parts = agent_name.split_whitespace();
    let first = parts.next().unwrap_or(agent_name).to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Awaits a count, logging and substituting 0 on failure
async fn count_or_zero<F>(name: &'static str, count: F) -> i64
where
    F: Future<Output = Result<i64, sqlx::Error>>,
{
    match count.await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(stat = name, error = %e, "Admin stat query failed");
            0
        }
    }
}

fn page_block(page: PageParams, total: i64) -> AdminPagination {
    Pagination::new(page, total).into()
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let db = &state.db;
    let all_users = User::admin_filters(None, None);

    let (total_users, total_jobs, total_companies, total_agents, total_applications, active_jobs, new_users) = tokio::join!(
        count_or_zero("totalUsers", User::count(db, &all_users)),
        count_or_zero("totalJobs", Job::count_all(db)),
        count_or_zero("totalCompanies", Company::count_all(db)),
        count_or_zero("totalAgents", Agent::count_all(db)),
        count_or_zero("totalApplications", Application::count_all(db)),
        count_or_zero("activeJobs", Job::count_active_since_days(db, RECENT_DAYS)),
        count_or_zero("newUsers", User::count_created_since_days(db, RECENT_DAYS)),
    );

    Ok(Json(json!({
        "message": "Dashboard stats retrieved successfully",
        "data": {
            "totalUsers": total_users,
            "totalJobs": total_jobs,
            "totalCompanies": total_companies,
            "totalAgents": total_agents,
            "totalApplications": total_applications,
            "activeJobs": active_jobs,
            "newUsers": new_users,
        },
    })))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<AdminSearch>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = User::admin_filters(search.search.as_deref(), None);

    let total = User::count(&state.db, &filters).await?;
    let users = User::list_summaries(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "message": "Users retrieved successfully",
        "data": {
            "users": users,
            "pagination": page_block(page, total),
        },
    })))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<AdminSearch>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = Job::admin_filters(search.search.as_deref());

    let total = Job::count(&state.db, &filters).await?;
    let jobs = Job::list(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "message": "Jobs retrieved successfully",
        "data": {
            "jobs": jobs,
            "pagination": page_block(page, total),
        },
    })))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<AdminSearch>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = Agent::admin_filters(search.search.as_deref());

    let total = Agent::count(&state.db, &filters).await?;
    let agents = Agent::list(&state.db, &filters, AgentSort::CreatedAt, Some("desc"), page).await?;

    Ok(Json(json!({
        "message": "Agents retrieved successfully",
        "data": {
            "agents": agents,
            "pagination": page_block(page, total),
        },
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if id == auth.user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(target_user_id = id, admin_id = %auth.user_id, "User deleted");

    Ok(Json(json!({ "message": "User deleted successfully" })))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !Job::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Job not found".to_string()));
    }

    tracing::info!(job_id = id, admin_id = %auth.user_id, "Job deleted");

    Ok(Json(json!({ "message": "Job deleted successfully" })))
}

/// Creates an agent profile, creating its account first when the email is new
///
/// New accounts get an unusable password; the agent sets one through the
/// password reset flow.
pub async fn create_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<AdminCreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let email = normalize_email(&req.email);
    let existing = User::find_by_email(&state.db, &email).await?;

    if let Some(user) = &existing {
        if Agent::find_by_user_id(&state.db, user.id).await?.is_some() {
            return Err(ApiError::BadRequest("User already has an agent profile".to_string()));
        }
    }

    let mut tx = state.db.begin().await?;
    let user_id = match existing {
        Some(user) => user.id,
        None => {
            let (first_name, last_name) = split_name(&req.profile.agent_name);
            let user = User::create_with(
                &mut tx,
                CreateUser {
                    email,
                    password_hash: unusable_password_hash()?,
                    first_name,
                    last_name,
                    user_type: UserType::Agent,
                },
            )
            .await?;
            tracing::info!(user_id = user.id, "Account created for agent");
            user.id
        }
    };

    let agent = Agent::create_with(&mut tx, req.profile.into_create(user_id, req.is_featured)).await?;
    tx.commit().await?;

    tracing::info!(agent_id = agent.id, user_id, admin_id = %auth.user_id, "Agent created by admin");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Agent created successfully",
            "data": { "id": agent.id },
        })),
    ))
}

pub async fn get_agent(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let agent = Agent::find_with_user(&state.db, id, true)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    Ok(Json(json!({
        "message": "Agent retrieved successfully",
        "data": agent,
    })))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateAgentRequest>,
) -> ApiResult<Json<Value>> {
    let changes = req.changes(true);
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let agent = Agent::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    tracing::info!(agent_id = id, admin_id = %auth.user_id, "Agent updated by admin");

    Ok(Json(json!({
        "message": "Agent updated successfully",
        "data": agent,
    })))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !Agent::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Agent not found".to_string()));
    }

    tracing::info!(agent_id = id, admin_id = %auth.user_id, "Agent deleted by admin");

    Ok(Json(json!({ "message": "Agent deleted successfully" })))
}
