/// Database layer
///
/// - `pool`: connection pool setup and the health ping
/// - `migrations`: embedded schema migrations
/// - `query`: dynamic filters, partial updates and pagination
///
/// Table access lives in the crate-level `models` module.

pub mod migrations;
pub mod pool;
pub mod query;
