/// Authentication and authorization
///
/// - [`password`]: Argon2id hashing
/// - [`jwt`]: session tokens
/// - [`middleware`]: bearer token to [`middleware::AuthContext`] for Axum routes
/// - [`authorization`]: role and ownership checks

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
