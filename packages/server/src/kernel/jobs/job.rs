use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RecordedEvent;

/// Sites searched when a submission doesn't name any.
pub const DEFAULT_SITES: &[&str] = &["linkedin.com/in", "facebook.com", "instagram.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl JobStatus {
    /// Queued or running; the job still occupies the user's admission slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Which contact types the search stage hunts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    Emails,
    Phones,
    Both,
}

impl ScrapeMode {
    pub fn wants_emails(&self) -> bool {
        matches!(self, ScrapeMode::Emails | ScrapeMode::Both)
    }

    pub fn wants_phones(&self) -> bool {
        matches!(self, ScrapeMode::Phones | ScrapeMode::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTier {
    #[default]
    Basic,
    Advance,
    Premium,
}

impl ServiceTier {
    /// Elevated tiers keep only map listings that carry both an email and a
    /// phone number.
    pub fn strict_listing_filter(&self) -> bool {
        !matches!(self, ServiceTier::Basic)
    }
}

/// Everything a submission specifies about what to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParams {
    pub country: String,
    pub cities: Vec<String>,
    /// Administrative areas, recorded for provenance and validated against
    /// the metadata client when one is configured.
    #[serde(default)]
    pub states: Vec<String>,
    pub niches: Vec<String>,
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,
    #[serde(default = "default_mode")]
    pub scrape_mode: ScrapeMode,
    #[serde(default)]
    pub include_map_stage: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tier: ServiceTier,
}

fn default_sites() -> Vec<String> {
    DEFAULT_SITES.iter().map(|s| s.to_string()).collect()
}

fn default_mode() -> ScrapeMode {
    ScrapeMode::Emails
}

impl JobParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.country.trim().is_empty() {
            return Err("country is required".to_string());
        }
        if self.cities.is_empty() || self.cities.iter().all(|c| c.trim().is_empty()) {
            return Err("at least one city is required".to_string());
        }
        if self.niches.is_empty() || self.niches.iter().all(|n| n.trim().is_empty()) {
            return Err("at least one niche is required".to_string());
        }
        if self.sites.is_empty() {
            return Err("at least one target site is required".to_string());
        }
        Ok(())
    }
}

/// A scrape job as the scheduler tracks and persists it. Live subscriber
/// state is deliberately not here; it lives in the stream hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub user_id: String,
    pub params: JobParams,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub events: Vec<RecordedEvent>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Job {
    pub fn new(user_id: impl Into<String>, params: JobParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            params,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
            events: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// Snapshot of scheduler occupancy for the queue endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    pub active: usize,
    pub queued: usize,
    pub max: usize,
}
