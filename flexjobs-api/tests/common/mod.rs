/// Shared setup for the API integration tests
///
/// Database-backed tests need `DATABASE_URL` pointing at a scratch
/// PostgreSQL database; migrations run on first connect. Each context
/// seeds its own job seeker, employer (with a company) and admin under
/// unique emails and removes them again in `cleanup`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use flexjobs_api::app::{build_router, AppState};
use flexjobs_api::config::Config;
use flexjobs_shared::auth::jwt::{create_token, Claims};
use flexjobs_shared::auth::password::hash_password;
use flexjobs_shared::db::migrations::run_migrations;
use flexjobs_shared::models::company::{Company, CreateCompany};
use flexjobs_shared::models::user::{CreateUser, User, UserType};
use serde_json::Value;
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse-battery";
const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// A seeded user and a token for it
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub seeker: TestUser,
    pub employer: TestUser,
    pub admin: TestUser,
    pub company: Company,
}

/// Configuration for tests, with the database URL from the environment when set
pub fn test_config() -> Config {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/flexjobs_test".to_string());

    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "JWT_SECRET" => Some(TEST_SECRET.to_string()),
        "FRONTEND_DIR" => Some("./does-not-exist".to_string()),
        _ => None,
    })
    .expect("test configuration")
}

/// Router over a pool that never connects, for requests that stop before the database
pub fn offline_app() -> axum::Router {
    let config = test_config();
    let db = PgPool::connect_lazy(&config.database.url).expect("lazy pool");
    build_router(AppState::new(db, config))
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let config = test_config();
        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let seeker = seed_user(&db, &config, UserType::JobSeeker).await?;
        let employer = seed_user(&db, &config, UserType::Employer).await?;
        let admin = seed_user(&db, &config, UserType::Admin).await?;

        let company = Company::create(
            &db,
            CreateCompany {
                name: format!("Test Co {}", Uuid::new_v4().simple()),
                description: Some("Integration test company".to_string()),
                website: None,
                logo: None,
                industry: Some("Software".to_string()),
                company_size: None,
                location: Some("Remote".to_string()),
                founded_year: None,
                user_id: employer.user.id,
            },
        )
        .await?;

        let app = build_router(AppState::new(db.clone(), config.clone()));

        Ok(Self {
            db,
            app,
            config,
            seeker,
            employer,
            admin,
            company,
        })
    }

    /// Sends a request through the router and returns status plus JSON body
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        bearer: Option<String>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(&self.app, method, uri, bearer, body).await
    }

    /// Posts a job for the seeded company and returns its id
    pub async fn post_job(&self, title: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/api/jobs",
                Some(self.employer.bearer()),
                Some(serde_json::json!({
                    "title": title,
                    "description": "Build and run the platform",
                    "company_id": self.company.id,
                    "job_type": "full-time",
                    "remote_type": "remote",
                    "salary_min": 90000,
                    "salary_max": 120000
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["jobId"].as_i64().expect("jobId")
    }

    /// Another seeded user outside the context; the test deletes it
    pub async fn extra_user(&self, user_type: UserType) -> anyhow::Result<TestUser> {
        seed_user(&self.db, &self.config, user_type).await
    }

    pub async fn cleanup(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(self.company.id)
            .execute(&self.db)
            .await?;
        for user in [&self.seeker, &self.employer, &self.admin] {
            User::delete(&self.db, user.user.id).await?;
        }
        Ok(())
    }
}

async fn seed_user(db: &PgPool, config: &Config, user_type: UserType) -> anyhow::Result<TestUser> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("{}-{}@example.com", user_type.as_str(), Uuid::new_v4().simple()),
            password_hash: hash_password(TEST_PASSWORD)?,
            first_name: "Test".to_string(),
            last_name: user_type.as_str().to_string(),
            user_type,
        },
    )
    .await?;

    let claims = Claims::new(user.id, user.email.clone(), user_type.as_str());
    let token = create_token(&claims, &config.jwt.secret)?;

    Ok(TestUser { user, token })
}

pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    bearer: Option<String>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header("authorization", bearer);
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().call(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}
