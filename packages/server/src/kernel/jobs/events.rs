use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobStatus;

/// Facts emitted by a running scrape job.
///
/// These are what SSE subscribers see and what the history store persists,
/// so the wire shape is fixed: a kebab-case `type` tag plus camelCase
/// payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum JobEvent {
    /// Pipeline accepted the job and started working.
    JobStart { message: String },

    /// A search query is about to run.
    SearchQuery { query: String, message: String },

    /// Free-form progress line.
    Log { message: String },

    /// A result row was appended to a leads file.
    LeadSaved {
        title: String,
        city: String,
        niche: String,
        site: String,
        file_name: String,
        total_saved_for_file: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        email_file_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        all_emails_file_name: Option<String>,
        message: String,
    },

    /// A first-seen phone number was appended to the phone files.
    PhoneSaved {
        phone: String,
        city: String,
        niche: String,
        site: String,
        title: String,
        phone_file_name: String,
        all_phones_file_name: String,
        message: String,
    },

    /// A city finished processing.
    CityUpdate { city: String, message: String },

    /// The map stage rewrote a city's listing snapshot and CSV.
    CsvSaved {
        city: String,
        file_name: String,
        json_file_name: String,
        rows: usize,
        message: String,
    },

    /// Terminal: the pipeline ran every unit.
    JobCompleted { message: String, files: Vec<String> },

    /// Terminal: the job was stopped on request.
    JobStopped { message: String },

    /// Terminal: the pipeline gave up.
    JobFailed { message: String },
}

impl JobEvent {
    /// The wire `type` tag, used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::JobStart { .. } => "job-start",
            JobEvent::SearchQuery { .. } => "search-query",
            JobEvent::Log { .. } => "log",
            JobEvent::LeadSaved { .. } => "lead-saved",
            JobEvent::PhoneSaved { .. } => "phone-saved",
            JobEvent::CityUpdate { .. } => "city-update",
            JobEvent::CsvSaved { .. } => "csv-saved",
            JobEvent::JobCompleted { .. } => "job-completed",
            JobEvent::JobStopped { .. } => "job-stopped",
            JobEvent::JobFailed { .. } => "job-failed",
        }
    }

    /// The status a terminal event transitions the job into.
    pub fn terminal_status(&self) -> Option<JobStatus> {
        match self {
            JobEvent::JobCompleted { .. } => Some(JobStatus::Completed),
            JobEvent::JobStopped { .. } => Some(JobStatus::Stopped),
            JobEvent::JobFailed { .. } => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Output files this event references, for the job's download list.
    pub fn file_names(&self) -> Vec<&str> {
        match self {
            JobEvent::LeadSaved {
                file_name,
                email_file_name,
                all_emails_file_name,
                ..
            } => {
                let mut names = vec![file_name.as_str()];
                if let Some(n) = email_file_name {
                    names.push(n.as_str());
                }
                if let Some(n) = all_emails_file_name {
                    names.push(n.as_str());
                }
                names
            }
            JobEvent::PhoneSaved {
                phone_file_name,
                all_phones_file_name,
                ..
            } => vec![phone_file_name.as_str(), all_phones_file_name.as_str()],
            JobEvent::CsvSaved {
                file_name,
                json_file_name,
                ..
            } => vec![file_name.as_str(), json_file_name.as_str()],
            JobEvent::JobCompleted { files, .. } => files.iter().map(|f| f.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// A [`JobEvent`] as recorded in the job's ordered log: the payload with the
/// scheduler-assigned timestamp flattened alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub event: JobEvent,
}
