//! Primary search engine: a spawned search-helper CLI.
//!
//! The helper drives a real browser against Google and prints a JSON object
//! on stdout. Captcha walls surface as a non-zero exit with a marker in
//! stderr, which we classify as `Blocked` so the stage runner can escalate
//! straight to the fallback engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{looks_blocked, EngineError, StageEngine, StageResult};

pub struct SearchCliEngine {
    command: String,
    state_file: PathBuf,
    limit: u32,
    pages: u32,
}

impl SearchCliEngine {
    pub fn new(command: impl Into<String>, state_dir: &Path) -> Self {
        Self {
            command: command.into(),
            state_file: state_dir.join("browser-state.json"),
            limit: 10,
            pages: 5,
        }
    }

    /// Stale browser state makes the helper reuse a fingerprint Google has
    /// already flagged, so both files are wiped before every run.
    async fn clear_state(&self) -> Result<(), EngineError> {
        let fingerprint = self.state_file.with_file_name("browser-state-fingerprint.json");
        for path in [&self.state_file, &fingerprint] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StageEngine for SearchCliEngine {
    fn name(&self) -> &'static str {
        "google-search"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StageResult>, EngineError> {
        self.clear_state().await?;

        let output = Command::new(&self.command)
            .arg(query)
            .args(["--limit", &self.limit.to_string()])
            .args(["--pages", &self.pages.to_string()])
            .arg("--state-file")
            .arg(&self.state_file)
            .env("LOG_LEVEL", "silent")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Launch {
                command: self.command.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if looks_blocked(&stderr.to_lowercase()) {
                return Err(EngineError::Blocked(stderr));
            }
            return Err(EngineError::Process {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_cli_output(&stdout)
    }
}

#[derive(Deserialize)]
struct CliOutput {
    #[serde(default)]
    results: Vec<CliResult>,
}

#[derive(Deserialize)]
struct CliResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

/// Pull the JSON object out of stdout, tolerating log noise around it.
fn parse_cli_output(stdout: &str) -> Result<Vec<StageResult>, EngineError> {
    let (Some(first), Some(last)) = (stdout.find('{'), stdout.rfind('}')) else {
        return Ok(Vec::new());
    };
    let payload: CliOutput = serde_json::from_str(&stdout[first..=last])
        .map_err(|e| EngineError::Parse(e.to_string()))?;

    Ok(payload
        .results
        .into_iter()
        .filter(|r| r.link.starts_with("http"))
        .map(|r| StageResult {
            title: r.title,
            detail: r.snippet,
            link: r.link,
        })
        .collect())
}
