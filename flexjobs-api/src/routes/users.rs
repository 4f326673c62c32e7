/// User profile and dashboard endpoints
///
/// - `GET /api/users/:id` - public profile (no token needed)
/// - `GET /api/users/:id/applications` - owner or admin
/// - `GET /api/users/:id/saved-jobs` - owner or admin
/// - `PUT /api/users/:id/status` - admin only
/// - `GET /api/users/:id/dashboard` - owner or admin

use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, put},
    Extension, Json, Router,
};
use flexjobs_shared::{
    auth::{
        authorization::{require_admin, require_owner_or_admin},
        middleware::{authenticate, AuthContext},
    },
    db::query::{PageParams, PageQuery, Pagination},
    models::{
        application::{Application, SavedJob},
        company::Company,
        job::Job,
        user::{User, UserType},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;
const DASHBOARD_RECENT: i64 = 5;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/:id", get(get_profile));

    let authenticated = Router::new()
        .route("/:id/applications", get(list_applications))
        .route("/:id/saved-jobs", get(list_saved_jobs))
        .route("/:id/status", put(set_status))
        .route("/:id/dashboard", get(dashboard))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    public.merge(authenticated)
}

/// Body of the status toggle
///
/// `is_active` is kept loose so a non-boolean gets a readable 400 instead of
/// a deserialization error.
#[derive(Debug, Deserialize, Validate)]
pub struct SetStatusRequest {
    #[serde(default)]
    pub is_active: Value,
}

pub async fn get_profile(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let profile = User::find_public_profile(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if UserType::from_str(&profile.user_type) != Some(UserType::JobSeeker) {
        return Ok(Json(json!({ "user": profile })));
    }

    let total_applications = Application::count_for_user(&state.db, id).await?;
    let saved_jobs = SavedJob::count_for_user(&state.db, id).await?;

    let mut user = serde_json::to_value(&profile)
        .map_err(|e| ApiError::InternalError(format!("Failed to serialize profile: {}", e)))?;
    if let Some(fields) = user.as_object_mut() {
        fields.insert(
            "stats".to_string(),
            json!({
                "total_applications": total_applications,
                "saved_jobs": saved_jobs,
            }),
        );
    }

    Ok(Json(json!({ "user": user })))
}

pub async fn list_applications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    require_owner_or_admin(&auth, id)?;

    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let total = Application::count_for_user(&state.db, id).await?;
    let applications = Application::list_for_user(&state.db, id, page).await?;

    Ok(Json(json!({
        "applications": applications,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn list_saved_jobs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    require_owner_or_admin(&auth, id)?;

    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let total = SavedJob::count_for_user(&state.db, id).await?;
    let saved_jobs = SavedJob::list_for_user(&state.db, id, page).await?;

    Ok(Json(json!({
        "saved_jobs": saved_jobs,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SetStatusRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    let is_active = req
        .is_active
        .as_bool()
        .ok_or_else(|| ApiError::BadRequest("is_active must be a boolean".to_string()))?;

    User::set_active(&state.db, id, is_active)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(target_user_id = id, is_active, admin_id = %auth.user_id, "User status changed");

    let verb = if is_active { "activated" } else { "deactivated" };
    Ok(Json(json!({ "message": format!("User {} successfully", verb) })))
}

/// Summary for the user's home screen
///
/// The shape follows the account's type: employers see their company's
/// jobs, everyone else sees their applications.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_owner_or_admin(&auth, id)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.get_user_type() == Some(UserType::Employer) {
        let Some(company) = Company::find_first_by_owner(&state.db, id).await? else {
            return Ok(Json(json!({ "message": "No company found" })));
        };

        let stats = Job::employer_stats(&state.db, company.id).await?;
        let recent_jobs = Job::recent_for_company(&state.db, company.id, DASHBOARD_RECENT).await?;

        return Ok(Json(json!({
            "company": company,
            "stats": stats,
            "recent_jobs": recent_jobs,
        })));
    }

    let application_stats = Application::stats_for_user(&state.db, id).await?;
    let saved_jobs = SavedJob::count_for_user(&state.db, id).await?;
    let recent = PageParams::new(Some(1), Some(DASHBOARD_RECENT), DASHBOARD_RECENT, DASHBOARD_RECENT);
    let recent_applications = Application::list_for_user(&state.db, id, recent).await?;

    let mut stats = serde_json::to_value(application_stats)
        .map_err(|e| ApiError::InternalError(format!("Failed to serialize stats: {}", e)))?;
    if let Some(fields) = stats.as_object_mut() {
        fields.insert("saved_jobs".to_string(), json!(saved_jobs));
    }

    Ok(Json(json!({
        "stats": stats,
        "recent_applications": recent_applications,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_keeps_raw_value() {
        let req: SetStatusRequest = serde_json::from_value(json!({ "is_active": false })).unwrap();
        assert_eq!(req.is_active.as_bool(), Some(false));

        let req: SetStatusRequest = serde_json::from_value(json!({ "is_active": "yes" })).unwrap();
        assert_eq!(req.is_active.as_bool(), None);

        let req: SetStatusRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.is_active.is_null());
    }
}
