/// Integration tests for the HTTP surface
///
/// Tests at the top run against a router whose pool never connects and
/// only exercise paths that answer before touching the database. The
/// rest need PostgreSQL:
///
/// ```bash
/// DATABASE_URL=postgresql://localhost/flexjobs_test cargo test -p flexjobs-api -- --ignored
/// ```

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{offline_app, send, TestContext, TEST_PASSWORD};
use serde_json::json;
use tower::Service as _;

#[tokio::test]
async fn test_unknown_api_route_suggests_endpoints() {
    let app = offline_app();

    let (status, body) = send(&app, "GET", "/api/job/123/extra", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["suggestions"], json!(["/api/jobs"]));
}

#[tokio::test]
async fn test_missing_asset_returns_short_json() {
    let app = offline_app();

    let (status, body) = send(&app, "GET", "/css/missing.css", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Resource not found");
    assert_eq!(body["path"], "/css/missing.css");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = offline_app();

    for (method, uri) in [
        ("GET", "/api/auth/profile"),
        ("GET", "/api/users/1/dashboard"),
        ("POST", "/api/applications/apply"),
        ("GET", "/api/payment-methods"),
        ("GET", "/api/subscriptions/limits"),
        ("GET", "/api/admin/stats"),
    ] {
        let (status, body) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["message"], "Access token required");
    }
}

#[tokio::test]
async fn test_malformed_token_forbidden() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        "GET",
        "/api/auth/profile",
        Some("Bearer not-a-jwt".to_string()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_register_validation_error() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "password": "123",
            "first_name": "",
            "last_name": "Doe",
            "user_type": "job_seeker"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].is_object() || body["message"].is_string());
}

#[tokio::test]
async fn test_register_rejects_admin_type() {
    let app = offline_app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "sneaky@example.com",
            "password": "long-enough",
            "first_name": "Sneaky",
            "last_name": "User",
            "user_type": "admin"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_and_rate_limit_headers() {
    let mut app = offline_app();

    let request = Request::builder()
        .uri("/api/auth/profile")
        .body(Body::empty())
        .unwrap();
    let response = app.call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let headers = response.headers();

    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-ratelimit-limit"));
    assert!(headers.contains_key("x-ratelimit-remaining"));
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_health_reports_database() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("GET", "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_register_login_and_profile() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("Reg-{}@Example.com", uuid::Uuid::new_v4().simple());

    let (status, body) = ctx
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "secret-password",
                "first_name": "Reg",
                "last_name": "User",
                "user_type": "job_seeker"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["email"], email.to_lowercase());
    assert!(body["user"].get("password_hash").is_none());
    let user_id = body["user"]["id"].as_i64().unwrap();

    let (status, _) = ctx
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "secret-password",
                "first_name": "Reg",
                "last_name": "Again",
                "user_type": "job_seeker"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "secret-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = ctx
        .request("GET", "/api/auth/profile", Some(format!("Bearer {}", token)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id);

    flexjobs_shared::models::user::User::delete(&ctx.db, user_id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_seeded_login_uses_test_password() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": ctx.seeker.user.email, "password": TEST_PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["user_type"], "job_seeker");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_job_seeker_cannot_post_jobs() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx
        .request(
            "POST",
            "/api/jobs",
            Some(ctx.seeker.bearer()),
            Some(json!({
                "title": "Not allowed",
                "description": "Job seekers cannot post jobs",
                "company_id": ctx.company.id,
                "job_type": "contract",
                "remote_type": "remote"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_apply_flow_and_duplicate() {
    let ctx = TestContext::new().await.unwrap();
    let job_id = ctx.post_job("Senior Rust Engineer").await;

    let (status, body) = ctx.request("GET", &format!("/api/jobs/{}", job_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["title"], "Senior Rust Engineer");

    let apply = json!({ "job_id": job_id, "cover_letter": "I write Rust every day." });

    let (status, body) = ctx
        .request("POST", "/api/applications/apply", Some(ctx.seeker.bearer()), Some(apply.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let application_id = body["applicationId"].as_i64().unwrap();

    let (status, _) = ctx
        .request("POST", "/api/applications/apply", Some(ctx.seeker.bearer()), Some(apply))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .request(
            "GET",
            &format!("/api/applications/job/{}", job_id),
            Some(ctx.employer.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applications"].as_array().unwrap().len(), 1);

    let (status, _) = ctx
        .request(
            "GET",
            &format!("/api/applications/job/{}", job_id),
            Some(ctx.seeker.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx
        .request(
            "PUT",
            &format!("/api/applications/{}/status", application_id),
            Some(ctx.employer.bearer()),
            Some(json!({ "status": "reviewed", "notes": "Looks good" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["status"], "reviewed");

    let (status, body) = ctx
        .request("GET", "/api/subscriptions/limits", Some(ctx.seeker.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limits"]["job_applications"]["used"], 1);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_saved_jobs() {
    let ctx = TestContext::new().await.unwrap();
    let job_id = ctx.post_job("Remote Support Lead").await;
    let status_uri = format!("/api/applications/saved-status/{}", job_id);

    let (_, body) = ctx.request("GET", &status_uri, Some(ctx.seeker.bearer()), None).await;
    assert_eq!(body["is_saved"], false);

    let (status, _) = ctx
        .request(
            "POST",
            "/api/applications/save-job",
            Some(ctx.seeker.bearer()),
            Some(json!({ "job_id": job_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .request(
            "POST",
            "/api/applications/save-job",
            Some(ctx.seeker.bearer()),
            Some(json!({ "job_id": job_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = ctx.request("GET", &status_uri, Some(ctx.seeker.bearer()), None).await;
    assert_eq!(body["is_saved"], true);

    let (status, _) = ctx
        .request(
            "DELETE",
            &format!("/api/applications/save-job/{}", job_id),
            Some(ctx.seeker.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .request(
            "DELETE",
            &format!("/api/applications/save-job/{}", job_id),
            Some(ctx.seeker.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_payment_method_default_switching() {
    let ctx = TestContext::new().await.unwrap();
    let year = chrono::Datelike::year(&chrono::Utc::now()) + 2;

    let card = |digits: &str| {
        json!({
            "payment_type": "credit_card",
            "card_brand": "Visa",
            "last_four_digits": digits,
            "cardholder_name": "Test Seeker",
            "expiry_month": 6,
            "expiry_year": year,
            "is_default": true
        })
    };

    let (status, first) = ctx
        .request("POST", "/api/payment-methods", Some(ctx.seeker.bearer()), Some(card("4242")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    let first_id = first["paymentMethod"]["id"].as_i64().unwrap();

    let (status, second) = ctx
        .request("POST", "/api/payment-methods", Some(ctx.seeker.bearer()), Some(card("1881")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = second["paymentMethod"]["id"].as_i64().unwrap();

    let (_, body) = ctx
        .request("GET", "/api/payment-methods", Some(ctx.seeker.bearer()), None)
        .await;
    let defaults: Vec<i64> = body["paymentMethods"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["is_default"] == true)
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(defaults, vec![second_id]);

    let (status, _) = ctx
        .request(
            "PUT",
            &format!("/api/payment-methods/{}/set-default", first_id),
            Some(ctx.seeker.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Another user's card is invisible
    let (status, _) = ctx
        .request(
            "PUT",
            &format!("/api/payment-methods/{}/set-default", first_id),
            Some(ctx.employer.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .request("POST", "/api/payment-methods", Some(ctx.seeker.bearer()), Some(card("42a2")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_admin_routes_require_admin() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx
        .request("GET", "/api/admin/stats", Some(ctx.employer.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .request("GET", "/api/admin/stats", Some(ctx.admin.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["totalUsers"].as_i64().unwrap() >= 3);

    let (status, _) = ctx
        .request(
            "DELETE",
            &format!("/api/admin/users/{}", ctx.admin.user.id),
            Some(ctx.admin.bearer()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .request("GET", "/api/admin/users?page=1&limit=2", Some(ctx.admin.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["users"].as_array().unwrap().len() <= 2);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_newsletter_subscribe_cycle() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("reader-{}@example.com", uuid::Uuid::new_v4().simple());
    let subscribe = json!({ "email": email, "source_page": "home" });

    let (status, _) = ctx
        .request("POST", "/api/interactions/newsletter/subscribe", None, Some(subscribe.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .request("POST", "/api/interactions/newsletter/subscribe", None, Some(subscribe.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .request(
            "POST",
            "/api/interactions/newsletter/unsubscribe",
            None,
            Some(json!({ "email": email })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .request("POST", "/api/interactions/newsletter/subscribe", None, Some(subscribe))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().starts_with("Welcome back"));

    sqlx::query("DELETE FROM newsletter_subscriptions WHERE email = $1")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

async fn plan_id(ctx: &TestContext, name: &str) -> i64 {
    let (status, body) = ctx.request("GET", "/api/subscriptions/plans", None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["plans"]
        .as_array()
        .unwrap()
        .iter()
        .find(|plan| plan["name"] == name)
        .and_then(|plan| plan["id"].as_i64())
        .unwrap()
}

async fn apply(ctx: &TestContext, job_id: i64) -> (StatusCode, serde_json::Value) {
    ctx.request(
        "POST",
        "/api/applications/apply",
        Some(ctx.seeker.bearer()),
        Some(json!({ "job_id": job_id })),
    )
    .await
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_free_plan_application_quota() {
    let ctx = TestContext::new().await.unwrap();

    let mut jobs = Vec::new();
    for i in 0..6 {
        jobs.push(ctx.post_job(&format!("Quota Role {}", i)).await);
    }

    for job_id in &jobs[..2] {
        let (status, body) = apply(&ctx, *job_id).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (status, body) = ctx
        .request("GET", "/api/subscriptions/limits", Some(ctx.seeker.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let applications = &body["limits"]["job_applications"];
    assert_eq!(applications["used"], 2);
    assert_eq!(applications["max"], 5);
    assert_eq!(applications["remaining"], 3);
    assert_eq!(body["limits"]["agent_consultations"]["max"], 0);
    assert_eq!(body["limits"]["agent_consultations"]["remaining"], 0);

    for job_id in &jobs[2..5] {
        let (status, _) = apply(&ctx, *job_id).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = apply(&ctx, jobs[5]).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (_, body) = ctx
        .request("GET", "/api/subscriptions/limits", Some(ctx.seeker.bearer()), None)
        .await;
    assert_eq!(body["limits"]["job_applications"]["remaining"], 0);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_subscribe_and_change_plan() {
    let ctx = TestContext::new().await.unwrap();
    let basic = plan_id(&ctx, "Basic").await;
    let professional = plan_id(&ctx, "Professional").await;
    let bearer = || Some(ctx.seeker.bearer());

    let (status, body) = ctx
        .request("POST", "/api/subscriptions/subscribe", bearer(), Some(json!({ "plan_id": basic })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["subscription"]["plan_id"], basic);

    let (status, _) = ctx
        .request("POST", "/api/subscriptions/subscribe", bearer(), Some(json!({ "plan_id": professional })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .request("PUT", "/api/subscriptions/change-plan", bearer(), Some(json!({ "new_plan_id": basic })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .request(
            "PUT",
            "/api/subscriptions/change-plan",
            bearer(),
            Some(json!({ "new_plan_id": professional })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = ctx.request("GET", "/api/subscriptions/current", bearer(), None).await;
    assert_eq!(body["subscription"]["plan_id"], professional);

    let (_, body) = ctx.request("GET", "/api/subscriptions/history", bearer(), None).await;
    let history = body["subscriptions"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["plan_id"], professional);
    assert_eq!(history[0]["status"], "active");
    assert_eq!(history[1]["plan_id"], basic);
    assert_eq!(history[1]["status"], "cancelled");

    let (_, body) = ctx.request("GET", "/api/subscriptions/limits", bearer(), None).await;
    assert_eq!(body["limits"]["job_applications"]["remaining"], -1);
    assert_eq!(body["limits"]["agent_consultations"]["remaining"], 3);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_booking_transitions_and_reviews() {
    let ctx = TestContext::new().await.unwrap();
    let client = || Some(ctx.seeker.bearer());
    let agent_side = || Some(ctx.employer.bearer());

    let (status, body) = ctx
        .request("POST", "/api/agents", agent_side(), Some(json!({ "agent_name": "Career Coaching Co" })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let agent_id = body["agentId"].as_i64().unwrap();

    let bookings_uri = format!("/api/agents/{}/bookings", agent_id);
    let slot = json!({ "scheduled_at": (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339() });

    let (status, _) = ctx.request("POST", &bookings_uri, agent_side(), Some(slot.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Free plan has no consultations
    let (status, _) = ctx.request("POST", &bookings_uri, client(), Some(slot.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let professional = plan_id(&ctx, "Professional").await;
    let (status, _) = ctx
        .request("POST", "/api/subscriptions/subscribe", client(), Some(json!({ "plan_id": professional })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx.request("POST", &bookings_uri, client(), Some(slot.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["booking"]["status"], "pending");
    let booking_uri = format!("/api/agents/bookings/{}/status", body["booking"]["id"].as_i64().unwrap());

    let reviews_uri = format!("/api/agents/{}/reviews", agent_id);
    let (status, _) = ctx.request("POST", &reviews_uri, client(), Some(json!({ "rating": 4 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let set = |status: &str| Some(json!({ "status": status }));

    let (status, _) = ctx.request("PUT", &booking_uri, client(), set("confirmed")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.request("PUT", &booking_uri, agent_side(), set("confirmed")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ctx.request("PUT", &booking_uri, agent_side(), set("completed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "completed");

    let (status, _) = ctx.request("PUT", &booking_uri, client(), set("cancelled")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = ctx.request("POST", &bookings_uri, client(), Some(slot)).await;
    let second_uri = format!("/api/agents/bookings/{}/status", body["booking"]["id"].as_i64().unwrap());
    let (status, _) = ctx.request("PUT", &second_uri, client(), set("cancelled")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.request("PUT", &second_uri, agent_side(), set("confirmed")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx.request("POST", &reviews_uri, client(), Some(json!({ "rating": 4 }))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let approve_uri = format!("/api/admin/reviews/{}/approve", body["review"]["id"].as_i64().unwrap());

    let agent_uri = format!("/api/agents/{}", agent_id);
    let (_, body) = ctx.request("GET", &agent_uri, None, None).await;
    assert_eq!(body["agent"]["total_reviews"], 0);

    let (status, _) = ctx.request("PUT", &approve_uri, agent_side(), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = ctx.request("PUT", &approve_uri, Some(ctx.admin.bearer()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx.request("GET", &agent_uri, None, None).await;
    assert_eq!(body["agent"]["total_reviews"], 1);
    assert_eq!(body["agent"]["rating"].as_f64(), Some(4.0));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_password_reset_round_trip() {
    use flexjobs_shared::models::password_reset::{generate_token, PasswordResetToken};

    let ctx = TestContext::new().await.unwrap();
    let email = ctx.seeker.user.email.clone();

    let (status, _) = ctx
        .request("POST", "/api/auth/forgot-password", None, Some(json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens WHERE user_id = $1")
        .bind(ctx.seeker.user.id)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(issued, 1);

    // The mailed token is never returned, so redeem one issued the same way
    let token = generate_token();
    PasswordResetToken::create(&ctx.db, ctx.seeker.user.id, &token).await.unwrap();

    let reset = json!({ "token": token, "newPassword": "brand-new-secret" });
    let (status, body) = ctx
        .request("POST", "/api/auth/reset-password", None, Some(reset.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = ctx.request("POST", "/api/auth/reset-password", None, Some(reset)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "brand-new-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .request("POST", "/api/auth/login", None, Some(json!({ "email": email, "password": TEST_PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_other_employer_cannot_touch_job() {
    use flexjobs_shared::models::user::{User, UserType};

    let ctx = TestContext::new().await.unwrap();
    let rival = ctx.extra_user(UserType::Employer).await.unwrap();
    let job_uri = format!("/api/jobs/{}", ctx.post_job("Platform Engineer").await);

    let (status, _) = ctx
        .request("PUT", &job_uri, Some(rival.bearer()), Some(json!({ "title": "Hijacked Role" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.request("DELETE", &job_uri, Some(rival.bearer()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = ctx.request("GET", &job_uri, None, None).await;
    assert_eq!(body["job"]["title"], "Platform Engineer");

    let (status, _) = ctx.request("DELETE", &job_uri, Some(ctx.employer.bearer()), None).await;
    assert_eq!(status, StatusCode::OK);

    User::delete(&ctx.db, rival.user.id).await.unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_withdrawal_decrements_application_count() {
    let ctx = TestContext::new().await.unwrap();
    let job_id = ctx.post_job("Data Analyst").await;
    let job_uri = format!("/api/jobs/{}", job_id);

    let (_, body) = apply(&ctx, job_id).await;
    let application_uri = format!("/api/applications/{}", body["applicationId"].as_i64().unwrap());

    let (_, body) = ctx.request("GET", &job_uri, None, None).await;
    assert_eq!(body["job"]["applications_count"], 1);

    let (status, _) = ctx
        .request("DELETE", &application_uri, Some(ctx.employer.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .request("DELETE", &application_uri, Some(ctx.seeker.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx.request("GET", &job_uri, None, None).await;
    assert_eq!(body["job"]["applications_count"], 0);

    let (status, _) = ctx
        .request("DELETE", &application_uri, Some(ctx.seeker.bearer()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database (DATABASE_URL)"]
async fn test_admin_seed_is_idempotent() {
    use flexjobs_api::bootstrap::{ensure_admin, AdminSeedOutcome};
    use flexjobs_api::config::AdminSeedConfig;
    use flexjobs_shared::models::user::User;

    let ctx = TestContext::new().await.unwrap();
    let seed = AdminSeedConfig {
        email: format!("root-{}@example.com", uuid::Uuid::new_v4().simple()),
        password: "seeded-admin-pass".to_string(),
        first_name: "Admin".to_string(),
        last_name: "User".to_string(),
    };

    assert_eq!(ensure_admin(&ctx.db, &seed).await.unwrap(), AdminSeedOutcome::Created);
    assert_eq!(ensure_admin(&ctx.db, &seed).await.unwrap(), AdminSeedOutcome::Unchanged);

    let (status, body) = ctx
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": seed.email, "password": seed.password })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["user_type"], "admin");

    let promote = AdminSeedConfig {
        email: ctx.seeker.user.email.clone(),
        ..seed.clone()
    };
    assert_eq!(ensure_admin(&ctx.db, &promote).await.unwrap(), AdminSeedOutcome::Promoted);

    let (status, body) = ctx
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": ctx.seeker.user.email, "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["user_type"], "admin");

    let created = User::find_by_email(&ctx.db, &seed.email).await.unwrap().unwrap();
    User::delete(&ctx.db, created.id).await.unwrap();
    ctx.cleanup().await.unwrap();
}
