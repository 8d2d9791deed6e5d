//! Stage engines: swappable backends that turn a query into result rows.
//!
//! The stage runner treats every engine the same way; only the error
//! classification matters to it. `Blocked` means the engine hit a
//! bot-challenge wall and further attempts are pointless.

pub mod chrome_map;
pub mod duckduckgo;
pub mod search_cli;

pub use chrome_map::ChromeMapEngine;
pub use duckduckgo::DuckDuckGoEngine;
pub use search_cli::SearchCliEngine;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// One result row: a headline, the surrounding snippet text contacts get
/// extracted from, and the source link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub title: String,
    pub detail: String,
    pub link: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bot-challenge signature. Not retryable on this engine.
    #[error("engine blocked: {0}")]
    Blocked(String),

    #[error("engine timed out after {0}s")]
    Timeout(u64),

    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine process exited with status {status}: {stderr}")]
    Process { status: i32, stderr: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unparseable engine output: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait StageEngine: Send + Sync {
    /// Short label used in events and logs.
    fn name(&self) -> &'static str;

    /// Run one query and return its result rows.
    async fn fetch(&self, query: &str) -> Result<Vec<StageResult>, EngineError>;
}

/// The engines a job draws on: one for map listings, a primary for
/// site-targeted search, and the fallback it switches to when the primary
/// goes unrecoverable.
#[derive(Clone)]
pub struct EngineSet {
    pub map: Arc<dyn StageEngine>,
    pub search_primary: Arc<dyn StageEngine>,
    pub search_fallback: Arc<dyn StageEngine>,
}

/// Markers that show up in challenge pages and engine stderr when a request
/// tripped bot detection. Matched against lowercased text.
pub(crate) fn looks_blocked(text: &str) -> bool {
    ["captcha", "unusual traffic", "verify you are", "/sorry/index", "anomaly"]
        .iter()
        .any(|marker| text.contains(marker))
}
