/// Per-IP fixed-window rate limiting
///
/// Each client IP gets `max_requests` per window. Two limiters run side by
/// side: a general one over all of `/api` and a strict one over login,
/// registration and password reset.
///
/// # Storage
///
/// - Redis when `REDIS_URL` is set: `INCR` and `TTL` on
///   `ratelimit:{scope}:{ip}` in one transaction, then `EXPIRE` whenever the
///   key has no expiry, so a lost `EXPIRE` is repaired on the next hit
/// - otherwise an in-process map, sharded to keep lock contention low
///
/// A Redis failure lets the request through and logs a warning.
///
/// # Client key
///
/// The peer socket address. `X-Forwarded-For` is only honored when the
/// limiter sits behind a trusted proxy (`TRUST_PROXY=true`).
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per window
/// - `X-RateLimit-Remaining`: requests left in this window
/// - `X-RateLimit-Reset`: seconds until the window resets
/// - `Retry-After`: on 429 responses only
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::post, Router};
/// use flexjobs_api::middleware::rate_limit::{rate_limit, RateLimiter};
///
/// let strict = RateLimiter::in_memory("strict", 5, 900);
/// let app: Router = Router::new()
///     .route("/login", post(|| async { "ok" }))
///     .layer(middleware::from_fn_with_state(strict, rate_limit));
/// ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::extract::{client_ip, peer_ip};

const SHARD_COUNT: usize = 16;

/// Buckets per shard before expired ones are swept
const MAX_BUCKETS_PER_SHARD: usize = 10_000;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<Vec<Mutex<HashMap<String, Window>>>>),
    Redis(ConnectionManager),
}

#[derive(Clone)]
pub struct RateLimiter {
    scope: &'static str,
    max_requests: u32,
    window: Duration,
    backend: Backend,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn in_memory(scope: &'static str, max_requests: u32, window_seconds: u64) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            scope,
            max_requests,
            window: Duration::from_secs(window_seconds.max(1)),
            backend: Backend::Memory(Arc::new(shards)),
            trust_forwarded_for: false,
        }
    }

    pub fn redis(scope: &'static str, max_requests: u32, window_seconds: u64, conn: ConnectionManager) -> Self {
        Self {
            scope,
            max_requests,
            window: Duration::from_secs(window_seconds.max(1)),
            backend: Backend::Redis(conn),
            trust_forwarded_for: false,
        }
    }

    /// Key clients by the first `X-Forwarded-For` hop (behind a trusted proxy only)
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    fn client_key(&self, request: &Request) -> String {
        let peer = request.extensions().get::<ConnectInfo<SocketAddr>>();
        let ip = if self.trust_forwarded_for {
            client_ip(request.headers(), peer)
        } else {
            peer_ip(peer)
        };
        ip.unwrap_or_else(|| "unknown".to_string())
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Counts one request from `client`
    pub async fn hit(&self, client: &str) -> RateLimitDecision {
        match &self.backend {
            Backend::Memory(shards) => self.hit_memory(shards, client).await,
            Backend::Redis(conn) => match self.hit_redis(conn.clone(), client).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(error = %e, scope = self.scope, "Rate limit backend unavailable, allowing request");
                    RateLimitDecision {
                        allowed: true,
                        limit: self.max_requests,
                        remaining: self.max_requests,
                        reset_after: self.window.as_secs(),
                    }
                }
            },
        }
    }

    fn decide(&self, count: u32, reset_after: u64) -> RateLimitDecision {
        RateLimitDecision {
            allowed: count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(count),
            reset_after,
        }
    }

    async fn hit_memory(&self, shards: &[Mutex<HashMap<String, Window>>], client: &str) -> RateLimitDecision {
        let mut hasher = DefaultHasher::new();
        client.hash(&mut hasher);
        let shard = &shards[(hasher.finish() as usize) % shards.len()];

        let now = Instant::now();
        let mut windows = shard.lock().await;

        if windows.len() >= MAX_BUCKETS_PER_SHARD {
            windows.retain(|_, w| w.reset_at > now);
        }

        let window = windows.entry(client.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        window.count = window.count.saturating_add(1);
        let reset_after = window.reset_at.saturating_duration_since(now).as_secs().max(1);

        self.decide(window.count, reset_after)
    }

    async fn hit_redis(&self, mut conn: ConnectionManager, client: &str) -> redis::RedisResult<RateLimitDecision> {
        let key = format!("ratelimit:{}:{}", self.scope, client);
        let window_secs = self.window.as_secs();

        let (count, ttl): (u32, i64) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .ttl(&key)
            .query_async(&mut conn)
            .await?;

        if missing_expiry(ttl) {
            conn.expire::<_, ()>(&key, window_secs as i64).await?;
        }

        let reset_after = if ttl > 0 { ttl as u64 } else { window_secs };

        Ok(self.decide(count, reset_after))
    }
}

/// `TTL` answers -1 for a key without expiry (and -2 for a missing one)
fn missing_expiry(ttl: i64) -> bool {
    ttl < 0
}

fn set_header(response: &mut Response, name: &'static str, value: u64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, value);
    }
}

/// Counts the request against the client's window; 429 once it is used up
pub async fn rate_limit(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client = limiter.client_key(&request);

    let decision = limiter.hit(&client).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, scope = limiter.scope, "Rate limit exceeded");
        ApiError::RateLimitExceeded {
            retry_after: decision.reset_after,
            message: RATE_LIMIT_MESSAGE.to_string(),
        }
        .into_response()
    };

    set_header(&mut response, "x-ratelimit-limit", u64::from(decision.limit));
    set_header(&mut response, "x-ratelimit-remaining", u64::from(decision.remaining));
    set_header(&mut response, "x-ratelimit-reset", decision.reset_after);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::Service as _;

    #[tokio::test]
    async fn test_memory_window_counts_per_client() {
        let limiter = RateLimiter::in_memory("test", 2, 60);

        let first = limiter.hit("1.1.1.1").await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        assert!(limiter.hit("1.1.1.1").await.allowed);

        let third = limiter.hit("1.1.1.1").await;
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert!(third.reset_after > 0 && third.reset_after <= 60);

        assert!(limiter.hit("2.2.2.2").await.allowed);
    }

    #[tokio::test]
    async fn test_memory_window_resets() {
        let limiter = RateLimiter::in_memory("test", 1, 1);

        assert!(limiter.hit("1.1.1.1").await.allowed);
        assert!(!limiter.hit("1.1.1.1").await.allowed);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(limiter.hit("1.1.1.1").await.allowed);
    }

    fn login_from(peer: [u8; 4], forwarded: &str) -> Request {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        request
    }

    async fn allowed_logins(limiter: RateLimiter, peer: [u8; 4]) -> usize {
        let mut app = Router::new()
            .route("/api/auth/login", axum::routing::post(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit));

        let mut allowed = 0;
        for i in 0..20 {
            let forwarded = format!("203.0.113.{}", i);
            let response = app.call(login_from(peer, &forwarded)).await.unwrap();
            if response.status() == StatusCode::OK {
                allowed += 1;
            }
        }
        allowed
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_by_default() {
        let allowed = allowed_logins(RateLimiter::in_memory("strict", 5, 900), [192, 0, 2, 10]).await;
        assert_eq!(allowed, 5);
    }

    #[tokio::test]
    async fn test_forwarded_for_used_behind_trusted_proxy() {
        let limiter = RateLimiter::in_memory("strict", 5, 900).trust_forwarded_for(true);
        assert_eq!(allowed_logins(limiter, [10, 0, 0, 1]).await, 20);
    }

    #[test]
    fn test_missing_expiry_detection() {
        assert!(missing_expiry(-1));
        assert!(missing_expiry(-2));
        assert!(!missing_expiry(0));
        assert!(!missing_expiry(899));
    }

    #[tokio::test]
    async fn test_middleware_returns_429_with_headers() {
        let limiter = RateLimiter::in_memory("test", 1, 60);
        let mut app = Router::new()
            .route("/api/jobs", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit));

        let request = || {
            Request::builder()
                .uri("/api/jobs")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };

        let ok = app.call(request()).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers().get("x-ratelimit-limit").unwrap(), "1");
        assert_eq!(ok.headers().get("x-ratelimit-remaining").unwrap(), "0");

        let limited = app.call(request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().get("retry-after").is_some());

        let body = axum::body::to_bytes(limited.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], RATE_LIMIT_MESSAGE);
    }
}
