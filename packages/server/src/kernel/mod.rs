//! Core scraping machinery: stage engines, the per-stage runner with its
//! circuit breaker, the job pipeline, and the scheduler that drives it all.

pub mod admission;
pub mod engines;
pub mod history;
pub mod jobs;
pub mod orchestrator;
pub mod output;
pub mod scheduler;
pub mod stage;
pub mod stream_hub;
