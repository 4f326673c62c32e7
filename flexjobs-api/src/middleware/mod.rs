/// Middleware for the API server
///
/// - `security`: security response headers
/// - `rate_limit`: per-IP fixed-window rate limiting
///
/// Authentication lives in `flexjobs_shared::auth::middleware`.

pub mod rate_limit;
pub mod security;
