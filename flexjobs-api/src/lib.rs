//! # FlexJobs API Server Library
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `bootstrap`: startup tasks (admin account seeding)
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `extract`: validated JSON and request header helpers
//! - `middleware`: security headers and rate limiting
//! - `routes`: route handlers, one module per resource

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
