/// Application and saved-job endpoints
///
/// Everything here requires a token.
///
/// - `POST   /api/applications/apply`
/// - `GET    /api/applications/job/:jobId` - applicants for a job (owner or admin)
/// - `PUT    /api/applications/:id/status` - move an application through the pipeline
/// - `GET    /api/applications/:id`
/// - `DELETE /api/applications/:id` - withdraw (applicant only)
/// - `POST   /api/applications/save-job`
/// - `DELETE /api/applications/save-job/:jobId`
/// - `GET    /api/applications/saved-status/:jobId`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use flexjobs_shared::{
    auth::{
        authorization::{require_optional_owner_or_admin, AuthzError},
        middleware::{authenticate, AuthContext},
    },
    db::query::{PageParams, PageQuery, Pagination},
    models::{
        application::{Application, ApplicationStatus, SavedJob},
        job::Job,
    },
    quota::LimitType,
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

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/apply", post(apply))
        .route("/job/:jobId", get(list_job_applications))
        .route("/save-job", post(save_job))
        .route("/save-job/:jobId", delete(unsave_job))
        .route("/saved-status/:jobId", get(saved_status))
        .route("/:id", get(get_application).delete(withdraw_application))
        .route("/:id/status", put(update_status))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyRequest {
    #[validate(range(min = 1, message = "Valid job ID is required"))]
    pub job_id: i64,

    #[validate(length(max = 5000, message = "Cover letter must be at most 5000 characters"))]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,

    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveJobRequest {
    #[validate(range(min = 1, message = "Valid job ID is required"))]
    pub job_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ApplicationStatus>,
}

pub async fn apply(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let job = Job::ownership(&state.db, req.job_id)
        .await?
        .filter(|job| job.is_active)
        .ok_or_else(|| ApiError::NotFound("Job not found or no longer active".to_string()))?;

    if Application::exists(&state.db, job.job_id, auth.user_id).await? {
        return Err(ApiError::BadRequest("You have already applied for this job".to_string()));
    }

    state.limits.enforce(auth.user_id, LimitType::JobApplications).await?;

    let cover_letter = req
        .cover_letter
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let mut tx = state.db.begin().await?;
    let application_id = Application::create(&mut tx, job.job_id, auth.user_id, cover_letter).await?;
    tx.commit().await?;

    tracing::info!(application_id, job_id = job.job_id, user_id = %auth.user_id, "Application submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Application submitted successfully",
            "applicationId": application_id,
        })),
    ))
}

pub async fn list_job_applications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<i64>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Value>> {
    let job = Job::ownership(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found or access denied".to_string()))?;

    // Non-owners get the same answer as a missing job
    if require_optional_owner_or_admin(&auth, job.owner_id, "").is_err() {
        return Err(ApiError::NotFound("Job not found or access denied".to_string()));
    }

    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = Application::job_filters(job_id, filter.status);

    let total = Application::count(&state.db, &filters).await?;
    let applications = Application::list_for_job(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "applications": applications,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<Json<Value>> {
    let detail = Application::find_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    require_optional_owner_or_admin(
        &auth,
        detail.employer_id,
        "You can only update applications for your own jobs",
    )?;

    let notes = req.notes.map(|n| n.trim().to_string());
    let application = Application::update_status(&state.db, id, req.status, notes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    tracing::info!(
        application_id = id,
        status = req.status.as_str(),
        user_id = %auth.user_id,
        "Application status updated"
    );

    Ok(Json(json!({
        "message": "Application status updated successfully",
        "application": application,
    })))
}

pub async fn get_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let detail = Application::find_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    let is_applicant = detail.application.user_id == auth.user_id;
    let is_employer = auth.is_employer() && detail.employer_id == Some(auth.user_id);

    if !(is_applicant || is_employer || auth.is_admin()) {
        return Err(AuthzError::AccessDenied.into());
    }

    Ok(Json(json!({ "application": detail })))
}

pub async fn withdraw_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let application = Application::find_by_id(&state.db, id)
        .await?
        .filter(|a| a.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound("Application not found or access denied".to_string()))?;

    let mut tx = state.db.begin().await?;
    let withdrawn = Application::withdraw(&mut tx, application.id, application.job_id).await?;
    tx.commit().await?;

    if !withdrawn {
        return Err(ApiError::NotFound("Application not found or access denied".to_string()));
    }

    tracing::info!(application_id = id, user_id = %auth.user_id, "Application withdrawn");

    Ok(Json(json!({ "message": "Application withdrawn successfully" })))
}

pub async fn save_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<SaveJobRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if Job::find_by_id(&state.db, req.job_id).await?.is_none() {
        return Err(ApiError::NotFound("Job not found".to_string()));
    }

    if SavedJob::exists(&state.db, auth.user_id, req.job_id).await? {
        return Err(ApiError::BadRequest("Job already saved".to_string()));
    }

    SavedJob::create(&state.db, auth.user_id, req.job_id).await?;

    tracing::debug!(job_id = req.job_id, user_id = %auth.user_id, "Job saved");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Job saved successfully" })),
    ))
}

pub async fn unsave_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !SavedJob::delete(&state.db, auth.user_id, job_id).await? {
        return Err(ApiError::NotFound("Saved job not found".to_string()));
    }

    Ok(Json(json!({ "message": "Job unsaved successfully" })))
}

pub async fn saved_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let is_saved = SavedJob::exists(&state.db, auth.user_id, job_id).await?;
    Ok(Json(json!({ "is_saved": is_saved })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_request_validation() {
        let req: ApplyRequest =
            serde_json::from_value(json!({ "job_id": 3, "cover_letter": "Hello" })).unwrap();
        assert!(req.validate().is_ok());

        let req: ApplyRequest = serde_json::from_value(json!({ "job_id": 0 })).unwrap();
        assert!(req.validate().is_err());

        let req: ApplyRequest =
            serde_json::from_value(json!({ "job_id": 1, "cover_letter": "x".repeat(5001) })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_request_rejects_unknown_status() {
        let req: UpdateStatusRequest =
            serde_json::from_value(json!({ "status": "interviewed", "notes": "Strong" })).unwrap();
        assert_eq!(req.status, ApplicationStatus::Interviewed);

        assert!(serde_json::from_value::<UpdateStatusRequest>(json!({ "status": "ghosted" })).is_err());
    }

    #[test]
    fn test_status_filter_is_optional() {
        let filter: StatusFilter = serde_json::from_value(json!({})).unwrap();
        assert!(filter.status.is_none());

        let filter: StatusFilter = serde_json::from_value(json!({ "status": "hired" })).unwrap();
        assert_eq!(filter.status, Some(ApplicationStatus::Hired));
    }
}
