/// Configuration for the API server
///
/// Loaded from environment variables, with a `.env` file picked up in
/// development.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:3000)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `JWT_EXPIRES_HOURS`: token lifetime (default: 24)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: `*`)
/// - `NODE_ENV` / `APP_ENV`: `production` turns on HSTS
/// - `RATE_LIMIT_WINDOW`: window length in minutes (default: 15)
/// - `RATE_LIMIT_MAX`: requests per window on `/api` (default: 100)
/// - `STRICT_RATE_LIMIT_MAX`: requests per window on login, register and password reset (default: 5)
/// - `REDIS_URL`: share rate-limit counters through Redis instead of memory
/// - `TRUST_PROXY`: `true` keys rate limits on the first `X-Forwarded-For` hop
///   instead of the socket peer; only set it behind a proxy that overwrites the header (default: false)
/// - `ADMIN_EMAIL` / `ADMIN_PASSWORD`: admin account ensured at startup (optional, both or neither)
/// - `ADMIN_FIRSTNAME` / `ADMIN_LASTNAME`: name for a newly created admin (default: Admin User)
/// - `FRONTEND_DIR`: static frontend root (default: ./frontend)
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
///
/// # Example
///
/// ```no_run
/// use flexjobs_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub log_format: LogFormat,

    /// Admin account created or promoted at startup
    pub admin_seed: Option<AdminSeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,

    /// Directory the static frontend is served from
    pub frontend_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
    pub expires_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_minutes: u64,
    pub max_requests: u32,
    pub strict_max_requests: u32,

    /// When set, counters live in Redis
    pub redis_url: Option<String>,

    /// Honor `X-Forwarded-For` when keying clients
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    pub fn window_seconds(&self) -> u64 {
        self.window_minutes.saturating_mul(60).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSeedConfig {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Same floor as registration
const MIN_ADMIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let environment = get("NODE_ENV").or_else(|| get("APP_ENV")).unwrap_or_default();

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        };

        let admin_seed = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (None, None) => None,
            (Some(email), Some(password)) => {
                if !email.contains('@') {
                    anyhow::bail!("ADMIN_EMAIL must be an email address");
                }
                if password.chars().count() < MIN_ADMIN_PASSWORD_CHARS {
                    anyhow::bail!("ADMIN_PASSWORD must be at least {} characters", MIN_ADMIN_PASSWORD_CHARS);
                }
                Some(AdminSeedConfig {
                    email,
                    password,
                    first_name: get("ADMIN_FIRSTNAME").unwrap_or_else(|| "Admin".to_string()),
                    last_name: get("ADMIN_LASTNAME").unwrap_or_else(|| "User".to_string()),
                })
            }
            _ => anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            api: ApiConfig {
                host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "API_PORT", 3000)?,
                cors_origins,
                production: environment.eq_ignore_ascii_case("production"),
                frontend_dir: PathBuf::from(get("FRONTEND_DIR").unwrap_or_else(|| "./frontend".to_string())),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_hours: parse_or(&get, "JWT_EXPIRES_HOURS", 24)?,
            },
            rate_limit: RateLimitConfig {
                window_minutes: parse_or(&get, "RATE_LIMIT_WINDOW", 15)?,
                max_requests: parse_or(&get, "RATE_LIMIT_MAX", 100)?,
                strict_max_requests: parse_or(&get, "STRICT_RATE_LIMIT_MAX", 5)?,
                redis_url: get("REDIS_URL"),
                trust_proxy: parse_or(&get, "TRUST_PROXY", false)?,
            },
            log_format,
            admin_seed,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}
