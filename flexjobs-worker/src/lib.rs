//! # FlexJobs Scraper
//!
//! Imports remote job listings from third-party boards into the `jobs`
//! table. Runs as a batch job: scrape every enabled source, save what is
//! new, log a summary and exit.
//!
//! ## Modules
//!
//! - `config`: `SCRAPER_*` settings
//! - `sources`: one [`sources::JobSource`] per board
//! - `heuristics`: text cleanup, category, remote type, salary and requirements
//! - `ingest`: company and category resolution, deduplication and inserts

pub mod config;
pub mod heuristics;
pub mod ingest;
pub mod sources;
