//! Request extractors and header helpers

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, ConnectInfo, FromRequest, Request},
    http::HeaderMap,
    Json,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// JSON body that has passed its `validator` rules
///
/// Malformed JSON becomes a 400 with the parser's message; rule violations
/// become a 400 with per-field `details`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// `validator` rule for amounts that may not go below zero
pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.message = Some("Must be zero or greater".into());
        return Err(error);
    }
    Ok(())
}

/// Socket peer address
pub fn peer_ip(peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    peer.map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Client address as reported by a proxy: first `X-Forwarded-For` hop, else the peer address
///
/// The header is client-controlled unless a proxy overwrites it.
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer_ip(peer))
}

/// `X-Session-Id` header, or a fresh `sess_<uuid>`
pub fn session_id(headers: &HeaderMap) -> String {
    headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("sess_{}", uuid::Uuid::new_v4().simple()))
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::HeaderValue};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Login {
        #[validate(email(message = "Valid email is required"))]
        email: String,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_validated_json_accepts_valid_body() {
        let ValidatedJson(login) = ValidatedJson::<Login>::from_request(json_request(r#"{"email":"a@b.test"}"#), &())
            .await
            .unwrap();
        assert_eq!(login.email, "a@b.test");
    }

    #[tokio::test]
    async fn test_validated_json_rejects_rule_violation() {
        let err = ValidatedJson::<Login>::from_request(json_request(r#"{"email":"nope"}"#), &())
            .await
            .unwrap_err();

        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "email");
                assert_eq!(details[0].message, "Valid email is required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validated_json_rejects_malformed_body() {
        let err = ValidatedJson::<Login>::from_request(json_request("{"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_non_negative() {
        assert!(non_negative(&Decimal::ZERO).is_ok());
        assert!(non_negative(&Decimal::new(4999, 2)).is_ok());
        assert!(non_negative(&Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000)));

        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("10.0.0.9"));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_session_id() {
        let mut headers = HeaderMap::new();
        let generated = session_id(&headers);
        assert!(generated.starts_with("sess_"));
        assert_ne!(generated, session_id(&headers));

        headers.insert("x-session-id", HeaderValue::from_static("sess_abc"));
        assert_eq!(session_id(&headers), "sess_abc");
    }
}
