//! # FlexJobs Shared Library
//!
//! Database access, models and authentication shared by the API server and
//! the scraper.
//!
//! - `db`: connection pool, migrations, query building and pagination
//! - `auth`: password hashing, JWT, request authentication and role checks
//! - `models`: one module per table family
//! - `quota`: monthly subscription limits

pub mod auth;
pub mod db;
pub mod models;
pub mod quota;
