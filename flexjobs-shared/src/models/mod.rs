/// Database models for FlexJobs
///
/// Each model owns its SQL. Row structs store enum columns as `String` and
/// expose typed accessors; inputs take the typed enums.
///
/// # Models
///
/// - `user`: accounts and roles
/// - `company`: employer companies
/// - `category`: seeded job categories
/// - `job`: postings and required skills
/// - `application`: applications and saved jobs
/// - `agent`: career agents and reviews
/// - `booking`: agent consultation bookings
/// - `subscription`: plans and user subscriptions
/// - `payment`: payment methods and billing addresses
/// - `password_reset`: one-time reset tokens
/// - `interaction`: newsletter and engagement tracking

pub mod agent;
pub mod application;
pub mod booking;
pub mod category;
pub mod company;
pub mod interaction;
pub mod job;
pub mod password_reset;
pub mod payment;
pub mod subscription;
pub mod user;
