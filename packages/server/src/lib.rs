// LeadHunter - scraping job scheduler
//
// This crate provides the backend for lead-generation scrape jobs: a
// bounded-concurrency job scheduler, the per-job scrape pipeline (map stage
// plus site-targeted search with engine fallback), and the HTTP/SSE surface
// clients use to submit jobs and watch them run.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
