/// Company endpoints
///
/// - `GET  /api/companies` - search by name or description, filter by industry
/// - `GET  /api/companies/mine` - the caller's companies
/// - `GET  /api/companies/:id` - one company with its active job count
/// - `POST /api/companies` - create a company owned by the caller (employer or admin)
/// - `PUT  /api/companies/:id` - partial update (owner or admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use flexjobs_shared::{
    auth::{
        authorization::{require_employer, require_optional_owner_or_admin},
        middleware::{authenticate, AuthContext},
    },
    db::query::{Changes, PageParams, PageQuery, Pagination},
    models::company::{Company, CompanySize, CreateCompany},
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
const MAX_LIMIT: i64 = 50;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_companies))
        .route("/:id", get(get_company));

    let authenticated = Router::new()
        .route("/", post(create_company))
        .route("/mine", get(my_companies))
        .route("/:id", put(update_company))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    public.merge(authenticated)
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanySearch {
    pub search: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 255, message = "Company name is required (max 255 characters)"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,

    pub logo: Option<String>,

    #[validate(length(max = 100, message = "Industry must be at most 100 characters"))]
    pub industry: Option<String>,

    pub company_size: Option<CompanySize>,
    pub location: Option<String>,

    #[validate(range(min = 1800, max = 2100, message = "Founded year must be between 1800 and 2100"))]
    pub founded_year: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 255, message = "Company name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,

    pub logo: Option<String>,

    #[validate(length(max = 100, message = "Industry must be at most 100 characters"))]
    pub industry: Option<String>,

    pub company_size: Option<CompanySize>,
    pub location: Option<String>,

    #[validate(range(min = 1800, max = 2100, message = "Founded year must be between 1800 and 2100"))]
    pub founded_year: Option<i32>,
}

impl UpdateCompanyRequest {
    fn changes(self) -> Changes {
        let mut changes = Changes::new();
        changes
            .set_opt("name", self.name.map(|n| n.trim().to_string()))
            .set_opt("description", self.description)
            .set_opt("website", self.website)
            .set_opt("logo", self.logo)
            .set_opt("industry", self.industry)
            .set_opt("company_size", self.company_size.map(|s| s.as_str()))
            .set_opt("location", self.location)
            .set_opt("founded_year", self.founded_year);
        changes
    }
}

pub async fn list_companies(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<CompanySearch>,
) -> ApiResult<Json<Value>> {
    let page = PageParams::from_query(page, DEFAULT_LIMIT, MAX_LIMIT);
    let filters = Company::list_filters(search.search.as_deref(), search.industry.as_deref());

    let total = Company::count(&state.db, &filters).await?;
    let companies = Company::list(&state.db, &filters, page).await?;

    Ok(Json(json!({
        "companies": companies,
        "pagination": Pagination::new(page, total),
    })))
}

pub async fn get_company(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let company = Company::find_with_job_count(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Company not found".to_string()))?;

    Ok(Json(json!({ "company": company })))
}

pub async fn my_companies(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let companies = Company::list_by_owner(&state.db, auth.user_id).await?;
    Ok(Json(json!({ "companies": companies })))
}

pub async fn create_company(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_employer(&auth)?;

    let company = Company::create(
        &state.db,
        CreateCompany {
            name: req.name.trim().to_string(),
            description: req.description,
            website: req.website,
            logo: req.logo,
            industry: req.industry,
            company_size: req.company_size,
            location: req.location,
            founded_year: req.founded_year,
            user_id: auth.user_id,
        },
    )
    .await?;

    tracing::info!(company_id = company.id, user_id = %auth.user_id, "Company created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Company created successfully",
            "company": company,
        })),
    ))
}

pub async fn update_company(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateCompanyRequest>,
) -> ApiResult<Json<Value>> {
    let company = Company::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Company not found".to_string()))?;
    require_optional_owner_or_admin(&auth, company.user_id, "You can only update your own company")?;

    let changes = req.changes();
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let company = Company::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Company not found".to_string()))?;

    tracing::info!(company_id = id, user_id = %auth.user_id, "Company updated");

    Ok(Json(json!({
        "message": "Company updated successfully",
        "company": company,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let req: CreateCompanyRequest = serde_json::from_value(json!({
            "name": "Acme",
            "company_size": "51-200",
            "founded_year": 1999
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.company_size, Some(CompanySize::Medium));

        let req: CreateCompanyRequest =
            serde_json::from_value(json!({ "name": "", "founded_year": 1200 })).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("founded_year"));
    }

    #[test]
    fn test_update_changes() {
        let req: UpdateCompanyRequest =
            serde_json::from_value(json!({ "industry": "Software", "company_size": "1000+" })).unwrap();
        assert_eq!(req.changes().len(), 2);
        assert!(UpdateCompanyRequest::default().changes().is_empty());
    }
}
