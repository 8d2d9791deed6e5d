//! JSON-file job history.
//!
//! The whole registry is serialized on every terminal transition; writes go
//! through a temp file + rename so a crash mid-write can't truncate the
//! history. Saves are serialized behind a mutex: terminal transitions of
//! different jobs land from separate tasks, and overlapping writers would
//! otherwise race on the shared temp file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::kernel::jobs::Job;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub struct HistoryStore {
    path: PathBuf,
    write_gate: Mutex<()>,
}

impl HistoryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("history.json"),
            write_gate: Mutex::new(()),
        }
    }

    /// Load all persisted jobs. A missing file is an empty history.
    pub async fn load(&self) -> Result<Vec<Job>, HistoryError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    pub async fn save(&self, jobs: &[Job]) -> Result<(), HistoryError> {
        let _guard = self.write_gate.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let json = serde_json::to_vec_pretty(jobs)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_err(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
