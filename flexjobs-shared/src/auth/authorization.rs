/// Role and ownership checks
///
/// Handlers call these after authentication. All failures are 403s with
/// fixed messages.
///
/// ```
/// use flexjobs_shared::auth::authorization::{require_employer, require_owner_or_admin, AuthzError};
/// use flexjobs_shared::auth::middleware::AuthContext;
/// use flexjobs_shared::models::user::UserType;
///
/// let seeker = AuthContext { user_id: 5, email: "s@x.test".into(), user_type: UserType::JobSeeker };
///
/// assert!(matches!(require_employer(&seeker), Err(AuthzError::EmployerRequired)));
/// assert!(require_owner_or_admin(&seeker, 5).is_ok());
/// assert!(require_owner_or_admin(&seeker, 6).is_err());
/// ```

use super::middleware::AuthContext;
use crate::models::user::UserType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Employer access required")]
    EmployerRequired,

    #[error("Admin access required")]
    AdminRequired,

    #[error("Access denied")]
    AccessDenied,

    /// Resource-specific denial with its own message
    #[error("{0}")]
    Denied(String),
}

/// Employers and admins pass
pub fn require_employer(auth: &AuthContext) -> Result<(), AuthzError> {
    match auth.user_type {
        UserType::Employer | UserType::Admin => Ok(()),
        _ => Err(AuthzError::EmployerRequired),
    }
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

/// The resource owner or an admin passes
pub fn require_owner_or_admin(auth: &AuthContext, owner_id: i64) -> Result<(), AuthzError> {
    if auth.user_id == owner_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AccessDenied)
    }
}

/// Like [`require_owner_or_admin`] for resources whose owner may be gone
pub fn require_optional_owner_or_admin(
    auth: &AuthContext,
    owner_id: Option<i64>,
    message: &str,
) -> Result<(), AuthzError> {
    if auth.is_admin() || owner_id == Some(auth.user_id) {
        Ok(())
    } else {
        Err(AuthzError::Denied(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user_id: i64, user_type: UserType) -> AuthContext {
        AuthContext {
            user_id,
            email: format!("user{}@flexjobs.test", user_id),
            user_type,
        }
    }

    #[test]
    fn test_require_employer() {
        assert!(require_employer(&ctx(1, UserType::Employer)).is_ok());
        assert!(require_employer(&ctx(1, UserType::Admin)).is_ok());
        assert_eq!(
            require_employer(&ctx(1, UserType::Agent)),
            Err(AuthzError::EmployerRequired)
        );
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&ctx(1, UserType::Admin)).is_ok());
        let err = require_admin(&ctx(1, UserType::Employer)).unwrap_err();
        assert_eq!(err.to_string(), "Admin access required");
    }

    #[test]
    fn test_require_owner_or_admin() {
        assert!(require_owner_or_admin(&ctx(7, UserType::JobSeeker), 7).is_ok());
        assert!(require_owner_or_admin(&ctx(1, UserType::Admin), 7).is_ok());
        assert_eq!(
            require_owner_or_admin(&ctx(8, UserType::Employer), 7),
            Err(AuthzError::AccessDenied)
        );
    }

    #[test]
    fn test_optional_owner() {
        let employer = ctx(3, UserType::Employer);
        assert!(require_optional_owner_or_admin(&employer, Some(3), "nope").is_ok());
        assert_eq!(
            require_optional_owner_or_admin(&employer, None, "nope"),
            Err(AuthzError::Denied("nope".to_string()))
        );
    }
}
