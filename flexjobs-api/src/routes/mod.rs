/// API route handlers, one module per resource under `/api`
///
/// - `health`: liveness and database check
/// - `auth`: registration, login, profile and password flows
/// - `jobs`, `companies`: listings and employer management
/// - `applications`: applying, applicant review and saved jobs
/// - `users`: public profiles and dashboards
/// - `agents`: career agents, bookings and reviews
/// - `subscriptions`, `payment_methods`: plans, limits and billing data
/// - `admin`: dashboard stats and moderation
/// - `interactions`: newsletter and engagement tracking
/// - `fallback`: 404 handling behind the static frontend

pub mod admin;
pub mod agents;
pub mod applications;
pub mod auth;
pub mod companies;
pub mod fallback;
pub mod health;
pub mod interactions;
pub mod jobs;
pub mod payment_methods;
pub mod subscriptions;
pub mod users;
