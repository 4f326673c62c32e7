/// Not-found handling behind the static file service
///
/// Requests that match no route and no file under `FRONTEND_DIR` land here
/// and are answered according to what was asked for:
///
/// - `/api/...`: JSON with suggestions for the closest resource
/// - static assets and `/components/...`: short JSON
/// - anything else: `404.html` from the frontend, or a built-in page

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::app::AppState;

const ASSET_EXTENSIONS: [&str; 12] = [
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "woff", "woff2", "ttf", "eot",
];

/// Substring of the path mapped to the endpoints worth suggesting
const API_SUGGESTIONS: [(&str, &[&str]); 9] = [
    ("job", &["/api/jobs"]),
    ("user", &["/api/users"]),
    ("compan", &["/api/companies"]),
    ("application", &["/api/applications"]),
    ("agent", &["/api/agents"]),
    ("subscription", &["/api/subscriptions"]),
    ("payment", &["/api/payment-methods"]),
    ("admin", &["/api/admin"]),
    ("auth", &["/api/auth/login", "/api/auth/register"]),
];

const DEFAULT_SUGGESTIONS: [&str; 4] = ["/api/jobs", "/api/users", "/api/companies", "/api/applications"];

const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Api,
    Asset,
    Page,
}

pub fn classify(path: &str) -> NotFoundKind {
    if path == "/api" || path.starts_with("/api/") {
        return NotFoundKind::Api;
    }

    if path.starts_with("/components/") {
        return NotFoundKind::Asset;
    }

    let is_asset = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if is_asset {
        NotFoundKind::Asset
    } else {
        NotFoundKind::Page
    }
}

pub fn api_suggestions(path: &str) -> Vec<&'static str> {
    let rest = path.trim_start_matches("/api").to_ascii_lowercase();

    let mut suggestions: Vec<&'static str> = Vec::new();
    for (needle, targets) in API_SUGGESTIONS {
        if rest.contains(needle) {
            for &target in targets.iter() {
                if !suggestions.contains(&target) {
                    suggestions.push(target);
                }
            }
        }
    }

    if suggestions.is_empty() {
        suggestions.extend(DEFAULT_SUGGESTIONS);
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

fn fallback_page(path: &str) -> String {
    let escaped = path
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Page Not Found - FlexJobs</title>
</head>
<body>
    <main>
        <h1>404</h1>
        <h2>Page Not Found</h2>
        <p>The page you're looking for doesn't exist.</p>
        <pre>{}</pre>
        <a href="/">Go Home</a>
        <a href="/browse-jobs.html">Browse Jobs</a>
    </main>
</body>
</html>
"#,
        escaped
    )
}

pub async fn not_found(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path = uri.path();
    let kind = classify(path);

    tracing::info!(method = %method, path = %path, kind = ?kind, "Not found");

    match kind {
        NotFoundKind::Api => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not Found",
                "message": "The requested API endpoint does not exist",
                "endpoint": uri.to_string(),
                "method": method.as_str(),
                "timestamp": Utc::now(),
                "suggestions": api_suggestions(path),
            })),
        )
            .into_response(),
        NotFoundKind::Asset => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not Found",
                "message": "Resource not found",
                "path": path,
            })),
        )
            .into_response(),
        NotFoundKind::Page => {
            let custom = state.config.api.frontend_dir.join("404.html");
            match tokio::fs::read_to_string(&custom).await {
                Ok(page) => (StatusCode::NOT_FOUND, Html(page)).into_response(),
                Err(_) => (
                    StatusCode::NOT_FOUND,
                    [(header::CACHE_CONTROL, "no-store")],
                    Html(fallback_page(path)),
                )
                    .into_response(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("/api/nope"), NotFoundKind::Api);
        assert_eq!(classify("/api"), NotFoundKind::Api);
        assert_eq!(classify("/apiary.html"), NotFoundKind::Page);
        assert_eq!(classify("/css/site.CSS"), NotFoundKind::Asset);
        assert_eq!(classify("/fonts/icons.woff2"), NotFoundKind::Asset);
        assert_eq!(classify("/components/header.html"), NotFoundKind::Asset);
        assert_eq!(classify("/missing-page"), NotFoundKind::Page);
        assert_eq!(classify("/v1.2/about"), NotFoundKind::Page);
    }

    #[test]
    fn test_api_suggestions() {
        assert_eq!(api_suggestions("/api/job/5"), vec!["/api/jobs"]);
        assert_eq!(api_suggestions("/api/company"), vec!["/api/companies"]);
        assert_eq!(
            api_suggestions("/api/auth/signin"),
            vec!["/api/auth/login", "/api/auth/register"]
        );
        assert_eq!(
            api_suggestions("/api/nothing"),
            vec!["/api/jobs", "/api/users", "/api/companies"]
        );
    }

    #[test]
    fn test_suggestions_capped() {
        let suggestions = api_suggestions("/api/user-job-application-agent");
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        assert_eq!(suggestions[0], "/api/jobs");
    }

    #[test]
    fn test_fallback_page_escapes_path() {
        let page = fallback_page("/<script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
