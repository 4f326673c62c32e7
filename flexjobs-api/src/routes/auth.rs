/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register` - create a job seeker or employer account
/// - `POST /api/auth/login` - exchange credentials for a token
/// - `GET  /api/auth/profile` - current user
/// - `PUT  /api/auth/profile` - partial profile update
/// - `PUT  /api/auth/change-password`
/// - `GET  /api/auth/verify` - check a token
/// - `POST /api/auth/forgot-password` - issue a one-time reset token
/// - `POST /api/auth/reset-password` - redeem it
///
/// Login, register and both password reset endpoints sit behind the strict
/// rate limiter.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Duration;
use flexjobs_shared::{
    auth::{
        jwt::{create_token, Claims},
        middleware::{authenticate, AuthContext},
        password::{hash_password, verify_password},
    },
    db::query::Changes,
    models::{
        password_reset::{generate_token, PasswordResetToken},
        user::{normalize_email, CreateUser, ExperienceLevel, User, UserType},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    middleware::rate_limit::rate_limit,
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, password reset instructions have been sent";

pub fn routes(state: &AppState) -> Router<AppState> {
    let strict = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route_layer(middleware::from_fn_with_state(
            state.strict_limiter.clone(),
            rate_limit,
        ));

    let authenticated = Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", put(change_password))
        .route("/verify", get(verify))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate));

    strict.merge(authenticated)
}

fn validate_registration_type(user_type: &str) -> Result<(), ValidationError> {
    match UserType::from_str(user_type) {
        Some(UserType::JobSeeker) | Some(UserType::Employer) => Ok(()),
        _ => {
            let mut error = ValidationError::new("user_type");
            error.message = Some("User type must be job_seeker or employer".into());
            Err(error)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "First name is required (max 100 characters)"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required (max 100 characters)"))]
    pub last_name: String,

    #[validate(custom(function = "validate_registration_type"))]
    pub user_type: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token plus the account it belongs to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,

    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,

    pub bio: Option<String>,
    pub skills: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub location: Option<String>,

    #[validate(url(message = "LinkedIn URL must be a valid URL"))]
    pub linkedin_url: Option<String>,

    #[validate(url(message = "Portfolio URL must be a valid URL"))]
    pub portfolio_url: Option<String>,
}

impl UpdateProfileRequest {
    fn changes(self) -> Changes {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());

        let mut changes = Changes::new();
        changes
            .set_opt("first_name", trim(self.first_name))
            .set_opt("last_name", trim(self.last_name))
            .set_opt("phone", trim(self.phone))
            .set_opt("bio", trim(self.bio))
            .set_opt("skills", trim(self.skills))
            .set_opt("experience_level", self.experience_level.map(|l| l.as_str()))
            .set_opt("location", trim(self.location))
            .set_opt("linkedin_url", self.linkedin_url)
            .set_opt("portfolio_url", self.portfolio_url);
        changes
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,

    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    let claims = Claims::with_expiration(
        user.id,
        user.email.as_str(),
        user.user_type.as_str(),
        Duration::hours(state.config.jwt.expires_hours),
    );
    Ok(create_token(&claims, state.jwt_secret())?)
}

/// Register a new account
///
/// # Errors
///
/// - `400`: validation failed or the email is taken
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&req.email);

    if User::email_exists(&state.db, &email).await? {
        return Err(ApiError::BadRequest(
            "User already exists with this email".to_string(),
        ));
    }

    let user_type = UserType::from_str(&req.user_type).unwrap_or(UserType::JobSeeker);
    let user = User::create(
        &state.db,
        CreateUser {
            email,
            password_hash: hash_password(&req.password)?,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            user_type,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, user_type = user_type.as_str(), "User registered");

    let token = issue_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            token,
            user,
        }),
    ))
}

/// Log in with email and password
///
/// Unknown emails and wrong passwords get the same answer.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::BadRequest("Invalid credentials".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        return Err(ApiError::BadRequest("Account is deactivated".to_string()));
    }

    if !verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    let token = issue_token(&state, &user)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user,
    }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "user": user })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<Json<Value>> {
    let changes = req.changes();
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let user = User::update_profile(&state.db, auth.user_id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %auth.user_id, fields = changes.len(), "Profile updated");

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user,
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&req.new_password)?;
    let mut conn = state.db.acquire().await?;
    User::update_password(&mut conn, user.id, &new_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

pub async fn verify(Extension(auth): Extension<AuthContext>) -> Json<Value> {
    Json(json!({
        "valid": true,
        "user": {
            "id": auth.user_id,
            "email": auth.email,
            "user_type": auth.user_type,
        }
    }))
}

/// Issue a password reset token
///
/// Always answers 200 so the endpoint cannot be used to probe for accounts.
/// The token is logged at debug level; there is no mail delivery.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    if let Some(user) = User::find_by_email(&state.db, &req.email)
        .await?
        .filter(|u| u.is_active)
    {
        let token = generate_token();
        let stored = PasswordResetToken::create(&state.db, user.id, &token).await?;

        tracing::info!(user_id = %user.id, expires_at = %stored.expires_at, "Password reset requested");
        tracing::debug!(user_id = %user.id, reset_token = %token, "Password reset token issued");
    }

    Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })))
}

/// Redeem a reset token
///
/// The token lookup, password update and token invalidation commit together.
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let new_hash = hash_password(&req.new_password)?;

    let mut tx = state.db.begin().await?;

    let reset = PasswordResetToken::find_valid(&mut tx, &req.token)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".to_string()))?;

    User::update_password(&mut tx, reset.user_id, &new_hash).await?;
    PasswordResetToken::mark_used(&mut tx, reset.id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %reset.user_id, "Password reset completed");

    Ok(Json(json!({ "message": "Password has been reset successfully" })))
}
