/// Session tokens
///
/// HS256 tokens carrying the user's id, email and type. Handlers trust the
/// claims for routing decisions, but the auth middleware reloads the user
/// so a deactivated account loses access before its token runs out.
///
/// ```
/// use flexjobs_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-signing-secret-of-32-bytes-min";
/// let token = create_token(&Claims::new(42, "ada@example.com", "job_seeker"), secret)?;
/// assert_eq!(validate_token(&token, secret)?.sub, 42);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const ISSUER: &str = "flexjobs";

/// Lifetime used when the server config does not set one
pub const DEFAULT_EXPIRATION_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("Token has expired")]
    Expired,

    /// Bad signature, malformed token, wrong issuer or not yet valid
    #[error("Invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    /// `job_seeker`, `employer`, `admin` or `agent`
    pub user_type: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, email: impl Into<String>, user_type: impl Into<String>) -> Self {
        Self::with_expiration(user_id, email, user_type, Duration::hours(DEFAULT_EXPIRATION_HOURS))
    }

    /// Claims that expire after `ttl`; a negative `ttl` yields an expired token
    pub fn with_expiration(
        user_id: i64,
        email: impl Into<String>,
        user_type: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let issued = Utc::now().timestamp();
        Self {
            sub: user_id,
            email: email.into(),
            user_type: user_type.into(),
            iss: ISSUER.to_string(),
            iat: issued,
            nbf: issued,
            exp: issued + ttl.num_seconds(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(JwtError::Signing)
}

/// Checks signature, `exp`, `nbf` and `iss` with no leeway
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_default_lifetime() {
        let claims = Claims::new(12, "ada@example.com", "job_seeker");

        assert_eq!(claims.iss, "flexjobs");
        assert_eq!(claims.exp - claims.iat, DEFAULT_EXPIRATION_HOURS * 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_token_carries_claims() {
        let claims = Claims::with_expiration(99, "boss@acme.test", "employer", Duration::hours(2));
        let token = create_token(&claims, SECRET).unwrap();

        assert_eq!(validate_token(&token, SECRET).unwrap(), claims);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = create_token(&Claims::new(1, "a@b.test", "admin"), SECRET).unwrap();

        let result = validate_token(&token, "some-other-secret-also-32-bytes-long");
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::with_expiration(1, "a@b.test", "job_seeker", Duration::seconds(-60));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_is_invalid() {
        let mut claims = Claims::new(1, "a@b.test", "job_seeker");
        claims.iss = "someone-else".to_string();

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(validate_token("not.a.jwt", SECRET), Err(JwtError::Invalid(_))));
    }
}
