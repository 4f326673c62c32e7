/// Authentication middleware for Axum
///
/// Reads `Authorization: Bearer <jwt>`, validates the token, then loads the
/// user so that deactivated accounts lose access immediately. On success an
/// [`AuthContext`] is inserted into the request extensions.
///
/// Two flavors:
///
/// - [`authenticate`] rejects the request when anything is wrong
/// - [`optional_auth`] lets it through without a context instead
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use flexjobs_shared::auth::middleware::{authenticate, AuthContext, AuthState};
/// use sqlx::PgPool;
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     format!("user {} ({})", auth.user_id, auth.user_type.as_str())
/// }
///
/// fn router(db: PgPool) -> Router {
///     let auth = AuthState::new(db, "a-secret-that-is-at-least-32-bytes");
///     Router::new()
///         .route("/me", get(me))
///         .layer(middleware::from_fn_with_state(auth, authenticate))
/// }
/// ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use super::jwt::{validate_token, JwtError};
use crate::models::user::{User, UserType};

/// What the auth layers need from application state
#[derive(Clone)]
pub struct AuthState {
    pub db: PgPool,
    pub jwt_secret: Arc<str>,
}

impl AuthState {
    pub fn new(db: PgPool, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// Authenticated caller, available to handlers as `Extension<AuthContext>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub user_type: UserType,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn is_employer(&self) -> bool {
        self.user_type == UserType::Employer
    }
}

/// Why a request could not be authenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Access token required")]
    MissingToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid or inactive user")]
    InactiveUser,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::TokenExpired | AuthError::InactiveUser => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Database error during authentication");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the bearer token and loads the active user behind it
pub async fn resolve_context(state: &AuthState, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;

    let claims = validate_token(token, &state.jwt_secret).map_err(|e| match e {
        JwtError::Expired => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InactiveUser)?;

    let user_type = user.get_user_type().ok_or(AuthError::InactiveUser)?;

    Ok(AuthContext {
        user_id: user.id,
        email: user.email,
        user_type,
    })
}

/// Rejects unauthenticated requests
///
/// - no bearer token: 401 "Access token required"
/// - expired token: 401 "Token expired"
/// - any other bad token: 403 "Invalid token"
/// - unknown or deactivated user: 401 "Invalid or inactive user"
pub async fn authenticate(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = resolve_context(&state, req.headers()).await?;

    tracing::debug!(user_id = context.user_id, "Authenticated request");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Attaches an [`AuthContext`] when the request carries a usable token
///
/// Failures are ignored; handlers take `Option<Extension<AuthContext>>`.
pub async fn optional_auth(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    match resolve_context(&state, req.headers()).await {
        Ok(context) => {
            req.extensions_mut().insert(context);
        }
        Err(AuthError::MissingToken) => {}
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring failed optional authentication");
        }
    }

    next.run(req).await
}
