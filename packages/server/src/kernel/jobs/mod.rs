//! Job model: parameters, lifecycle status, and the event log.

pub mod events;
pub mod job;

pub use events::{JobEvent, RecordedEvent};
pub use job::{Job, JobParams, JobStatus, QueueStatus, ScrapeMode, ServiceTier, DEFAULT_SITES};
