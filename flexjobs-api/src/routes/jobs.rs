/// Job endpoints
///
/// # Endpoints
///
/// - `GET    /api/jobs` - search active jobs
/// - `GET    /api/jobs/categories/list` - categories with active job counts
/// - `GET    /api/jobs/company/:id` - active jobs of one company
/// - `GET    /api/jobs/:id` - job detail; counts a view
/// - `POST   /api/jobs` - post a job (employer or admin)
/// - `PUT    /api/jobs/:id` - partial update (company owner or admin)
/// - `DELETE /api/jobs/:id` - deactivate (company owner or admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use flexjobs_shared::{
    auth::{
        authorization::{require_employer, require_optional_owner_or_admin},
        middleware::{authenticate, AuthContext},
    },
    db::query::{Changes, PageParams, PageQuery, Pagination},
    models::{
        category::Category,
        company::Company,
        job::{CreateJob, Job, JobSearch, JobType, RemoteType, SkillInput},
        user::ExperienceLevel,
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

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 50;
const COMPANY_DEFAULT_LIMIT: i64 = 10;

const NOT_OWNER: &str = "You can only manage jobs for your own company";

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_jobs))
        .route("/categories/list", get(list_categories))
        .route("/company/:id", get(company_jobs))
        .route("/:id", get(get_job));

    let authenticated = Router::new()
        .route("/", post(create_job))
        .route("/:id", axum::routing::put(update_job).delete(delete_job))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    public.merge(authenticated)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SkillRequest {
    #[validate(length(min = 1, max = 100, message = "Skill name must be 1-100 characters"))]
    pub name: String,

    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl From<SkillRequest> for SkillInput {
    fn from(skill: SkillRequest) -> Self {
        SkillInput {
            name: skill.name.trim().to_string(),
            required: skill.required,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 3, max = 255, message = "Title must be 3-255 characters"))]
    pub title: String,

    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,

    pub requirements: Option<String>,
    pub responsibilities: Option<String>,

    #[validate(range(min = 1, message = "Valid company is required"))]
    pub company_id: i64,

    #[validate(range(min = 1, message = "Invalid category"))]
    pub category_id: Option<i64>,

    pub location: Option<String>,
    pub job_type: JobType,
    pub remote_type: RemoteType,
    pub experience_level: Option<ExperienceLevel>,

    #[validate(custom(function = "non_negative"))]
    pub salary_min: Option<Decimal>,

    #[validate(custom(function = "non_negative"))]
    pub salary_max: Option<Decimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub salary_currency: Option<String>,

    pub benefits: Option<String>,
    pub application_deadline: Option<NaiveDate>,

    #[validate(url(message = "Application URL must be a valid URL"))]
    pub application_url: Option<String>,

    #[validate(nested)]
    #[serde(default)]
    pub skills: Vec<SkillRequest>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateJobRequest {
    #[validate(length(min = 3, max = 255, message = "Title must be 3-255 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: Option<String>,

    pub requirements: Option<String>,
    pub responsibilities: Option<String>,

    #[validate(range(min = 1, message = "Invalid category"))]
    pub category_id: Option<i64>,

    pub location: Option<String>,
    pub job_type: Option<JobType>,
    pub remote_type: Option<RemoteType>,
    pub experience_level: Option<ExperienceLevel>,

    #[validate(custom(function = "non_negative"))]
    pub salary_min: Option<Decimal>,

    #[validate(custom(function = "non_negative"))]
    pub salary_max: Option<Decimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub salary_currency: Option<String>,

    pub benefits: Option<String>,
    pub application_deadline: Option<NaiveDate>,

    #[validate(url(message = "Application URL must be a valid URL"))]
    pub application_url: Option<String>,

    /// Replaces every skill when present
    #[validate(nested)]
    pub skills: Option<Vec<SkillRequest>>,
}

impl UpdateJobRequest {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        changes
            .set_opt("title", self.title.as_deref().map(str::trim))
            .set_opt("description", self.description.clone())
            .set_opt("requirements", self.requirements.clone())
            .set_opt("responsibilities", self.responsibilities.clone())
            .set_opt("category_id", self.category_id)
            .set_opt("location", self.location.clone())
            .set_opt("job_type", self.job_type.map(|t| t.as_str()))
            .set_opt("remote_type", self.remote_type.map(|t| t.as_str()))
            .set_opt("experience_level", self.experience_level.map(|l| l.as_str()))
            .set_opt("salary_min", self.salary_min)
            .set_opt("salary_max", self.salary_max)
            .set_opt("salary_currency", self.salary_currency.as_deref().map(str::to_uppercase))
            .set_opt("benefits", self.benefits.clone())
            .set_opt("application_deadline", self.application_deadline)
            .set_opt("application_url", self.application_url.clone());
        changes
    }
}

fn check_salary_range(min: Option<Decimal>, max: Option<Decimal>) -> ApiResult<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ApiError::invalid(
            "salary_max",
            "Maximum salary must not be below minimum salary",
        )),
        _ => Ok(()),
    }
}

/// Search active jobs, featured first then newest
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<JobSearch>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = search.filters();

    let total = Job::count(&state.db, &filters).await?;
    let jobs = Job::list(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "jobs": jobs,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let categories = Category::list_with_job_counts(&state.db).await?;
    Ok(Json(json!({ "categories": categories })))
}

pub async fn company_jobs(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, COMPANY_DEFAULT_LIMIT, MAX_LIMIT);
    let filters = Job::company_filters(company_id);

    let total = Job::count(&state.db, &filters).await?;
    let jobs = Job::list(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "jobs": jobs,
        "pagination": Pagination::new(page, total),
    })))
}

/// Job detail with company, category, poster and skills
///
/// Each successful fetch counts one view.
pub async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let mut job = Job::find_detail(&state.db, id)
        .await?
        .filter(|detail| detail.job.is_active)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    job.skills = Job::skills(&state.db, id).await?;
    Job::increment_views(&state.db, id).await?;

    Ok(Json(json!({ "job": job })))
}

/// Post a job for a company the caller owns
///
/// The job row and its skills commit together.
pub async fn create_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_employer(&auth)?;
    check_salary_range(req.salary_min, req.salary_max)?;

    let company = Company::find_by_id(&state.db, req.company_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Company not found".to_string()))?;

    if !auth.is_admin() && !company.is_owned_by(auth.user_id) {
        return Err(ApiError::Forbidden(
            "You can only post jobs for your own company".to_string(),
        ));
    }

    let skills: Vec<SkillInput> = req.skills.into_iter().map(SkillInput::from).collect();

    let mut tx = state.db.begin().await?;

    let job_id = Job::create(
        &mut tx,
        CreateJob {
            title: req.title.trim().to_string(),
            description: req.description,
            requirements: req.requirements,
            responsibilities: req.responsibilities,
            company_id: company.id,
            category_id: req.category_id,
            location: req.location,
            job_type: req.job_type,
            remote_type: req.remote_type,
            experience_level: req.experience_level,
            salary_min: req.salary_min,
            salary_max: req.salary_max,
            salary_currency: req
                .salary_currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
            benefits: req.benefits,
            application_deadline: req.application_deadline,
            application_url: req.application_url,
            source: None,
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    if !skills.is_empty() {
        Job::replace_skills(&mut tx, job_id, &skills).await?;
    }

    tx.commit().await?;

    tracing::info!(job_id, company_id = company.id, user_id = %auth.user_id, "Job created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Job created successfully",
            "jobId": job_id,
        })),
    ))
}

/// Partial update; skills, when given, are replaced in the same transaction
pub async fn update_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateJobRequest>,
) -> ApiResult<Json<Value>> {
    require_employer(&auth)?;

    let ownership = Job::ownership(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    require_optional_owner_or_admin(&auth, ownership.owner_id, NOT_OWNER)?;

    let current = Job::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    check_salary_range(
        req.salary_min.or(current.salary_min),
        req.salary_max.or(current.salary_max),
    )?;

    let changes = req.changes();
    if changes.is_empty() && req.skills.is_none() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let mut tx = state.db.begin().await?;

    Job::update(&mut tx, id, &changes).await?;

    if let Some(skills) = req.skills {
        let skills: Vec<SkillInput> = skills.into_iter().map(SkillInput::from).collect();
        Job::replace_skills(&mut tx, id, &skills).await?;
    }

    tx.commit().await?;

    tracing::info!(job_id = id, user_id = %auth.user_id, fields = changes.len(), "Job updated");

    Ok(Json(json!({ "message": "Job updated successfully" })))
}

/// Deactivates the job; applications stay intact
pub async fn delete_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_employer(&auth)?;

    let ownership = Job::ownership(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    require_optional_owner_or_admin(&auth, ownership.owner_id, NOT_OWNER)?;

    Job::soft_delete(&state.db, id).await?;

    tracing::info!(job_id = id, user_id = %auth.user_id, "Job deactivated");

    Ok(Json(json!({ "message": "Job deleted successfully" })))
}
