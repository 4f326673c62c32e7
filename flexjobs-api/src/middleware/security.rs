/// Hardening headers added to every response, API and static alike
///
/// HSTS is only sent when the server runs in production behind HTTPS.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
    style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self' data:; \
    connect-src 'self'; frame-ancestors 'none'; object-src 'none'";

const HSTS: &str = "max-age=31536000; includeSubDomains";

const HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=(), payment=(), usb=()"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
];

/// Whether `Strict-Transport-Security` is sent
#[derive(Debug, Clone, Copy)]
pub struct Hsts(pub bool);

pub fn apply_security_headers(headers: &mut HeaderMap, hsts: Hsts) {
    for (name, value) in HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if hsts.0 {
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static(HSTS),
        );
    }
}

/// Use with `middleware::from_fn_with_state(Hsts(production), security_headers)`
pub async fn security_headers(State(hsts): State<Hsts>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), hsts);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::Service as _;

    async fn fetch(production: bool, uri: &str) -> Response {
        let mut app = Router::new()
            .route("/jobs", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(Hsts(production), security_headers));

        app.call(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_headers_on_success_and_not_found() {
        for uri in ["/jobs", "/missing"] {
            let response = fetch(false, uri).await;
            let headers = response.headers();

            assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
            assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
            assert_eq!(headers.get("Referrer-Policy").unwrap(), "strict-origin-when-cross-origin");
            assert_eq!(headers.get("Content-Security-Policy").unwrap(), CONTENT_SECURITY_POLICY);
            assert!(headers.get("Strict-Transport-Security").is_none());
        }
    }

    #[tokio::test]
    async fn test_hsts_in_production() {
        let response = fetch(true, "/jobs").await;
        assert_eq!(response.headers().get("Strict-Transport-Security").unwrap(), HSTS);
    }
}
