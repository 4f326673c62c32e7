/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use flexjobs_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use axum::{
    handler::Handler,
    http::{header, HeaderName, HeaderValue, Method},
    middleware, Router,
};
use flexjobs_shared::{auth::middleware::AuthState, quota::LimitEnforcer};
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    middleware::{
        rate_limit::{rate_limit, RateLimiter},
        security::{security_headers, Hsts},
    },
    routes,
};

/// Request bodies above this size are rejected with 413
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Monthly subscription limits
    pub limits: LimitEnforcer,

    /// Applies to every `/api` route
    pub general_limiter: RateLimiter,

    /// Applies to login, registration and password reset
    pub strict_limiter: RateLimiter,
}

impl AppState {
    /// State with in-memory rate limiting
    pub fn new(db: PgPool, config: Config) -> Self {
        let window = config.rate_limit.window_seconds();
        let trust_proxy = config.rate_limit.trust_proxy;
        let general = RateLimiter::in_memory("general", config.rate_limit.max_requests, window)
            .trust_forwarded_for(trust_proxy);
        let strict = RateLimiter::in_memory("strict", config.rate_limit.strict_max_requests, window)
            .trust_forwarded_for(trust_proxy);
        Self::with_limiters(db, config, general, strict)
    }

    pub fn with_limiters(
        db: PgPool,
        config: Config,
        general_limiter: RateLimiter,
        strict_limiter: RateLimiter,
    ) -> Self {
        Self {
            limits: LimitEnforcer::new(db.clone()),
            db,
            config: Arc::new(config),
            general_limiter,
            strict_limiter,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// State for the authentication layers
    pub fn auth_state(&self) -> AuthState {
        AuthState::new(self.db.clone(), self.config.jwt.secret.as_str())
    }
}

/// Builds the complete router
///
/// ```text
/// /api
/// ├── /health
/// ├── /auth             register, login, profile, password reset
/// ├── /jobs             search, detail, employer CRUD
/// ├── /companies
/// ├── /applications     apply, review, saved jobs
/// ├── /users            profiles, dashboards
/// ├── /agents           directory, bookings, reviews
/// ├── /subscriptions    plans, current, limits
/// ├── /payment-methods  cards, billing addresses
/// ├── /admin            stats and management (admin only)
/// └── /interactions     newsletter and tracking
/// /*                    static frontend, then the 404 handler
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, tracing, compression, body
/// limit, then the general rate limiter on `/api`. Authentication is
/// attached per route.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health::routes())
        .nest("/auth", routes::auth::routes(&state))
        .nest("/jobs", routes::jobs::routes(&state))
        .nest("/companies", routes::companies::routes(&state))
        .nest("/applications", routes::applications::routes(&state))
        .nest("/users", routes::users::routes(&state))
        .nest("/agents", routes::agents::routes(&state))
        .nest("/subscriptions", routes::subscriptions::routes(&state))
        .nest("/payment-methods", routes::payment_methods::routes(&state))
        .nest("/admin", routes::admin::routes(&state))
        .nest("/interactions", routes::interactions::routes(&state))
        .route_layer(middleware::from_fn_with_state(
            state.general_limiter.clone(),
            rate_limit,
        ));

    let static_files = ServeDir::new(&state.config.api.frontend_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(routes::fallback::not_found.with_state(state.clone()));

    Router::new()
        .nest("/api", api)
        .fallback_service(static_files)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(middleware::from_fn_with_state(
            Hsts(state.config.api.production),
            security_headers,
        ))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-session-id"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
