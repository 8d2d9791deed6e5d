// Common test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::watch;
use uuid::Uuid;

use leadhunter_core::kernel::engines::{EngineError, EngineSet, StageEngine, StageResult};
use leadhunter_core::kernel::history::HistoryStore;
use leadhunter_core::kernel::jobs::{Job, JobParams, ScrapeMode, ServiceTier};
use leadhunter_core::kernel::scheduler::{JobScheduler, SchedulerConfig};
use leadhunter_core::kernel::stream_hub::StreamHub;

/// Scriptable stage engine. Pops scripted outcomes in order, then falls back
/// to a default result set. Optionally blocks each fetch behind a watch gate
/// so tests can hold a job "running".
pub struct MockEngine {
    name: &'static str,
    script: Mutex<VecDeque<Result<Vec<StageResult>, EngineError>>>,
    default: Vec<StageResult>,
    queries: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<watch::Receiver<bool>>,
}

impl MockEngine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            script: Mutex::new(VecDeque::new()),
            default: Vec::new(),
            queries: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Queue one successful response.
    pub fn respond(self, results: Vec<StageResult>) -> Self {
        self.script.lock().unwrap().push_back(Ok(results));
        self
    }

    /// Queue one error.
    pub fn fail(self, error: EngineError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Results returned once the script runs out.
    pub fn default_results(mut self, results: Vec<StageResult>) -> Self {
        self.default = results;
        self
    }

    /// Block every fetch until the paired sender publishes `true`.
    pub fn gated(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageEngine for MockEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StageResult>, EngineError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            while !*gate.borrow() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
        }

        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.default.clone()),
        }
    }
}

pub fn result(title: &str, detail: &str, link: &str) -> StageResult {
    StageResult {
        title: title.to_string(),
        detail: detail.to_string(),
        link: link.to_string(),
    }
}

/// An engine that is never called; panicking here surfaces scheduling bugs.
pub struct UnusedEngine;

#[async_trait]
impl StageEngine for UnusedEngine {
    fn name(&self) -> &'static str {
        "unused"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StageResult>, EngineError> {
        panic!("engine should not have been called (query: {query})");
    }
}

pub fn engine_set(
    map: Arc<dyn StageEngine>,
    primary: Arc<dyn StageEngine>,
    fallback: Arc<dyn StageEngine>,
) -> EngineSet {
    EngineSet {
        map,
        search_primary: primary,
        search_fallback: fallback,
    }
}

pub struct TestHarness {
    pub scheduler: Arc<JobScheduler>,
    pub hub: StreamHub,
    pub output_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestHarness {
    pub async fn start(engines: EngineSet, max_concurrent: usize) -> Self {
        let output_dir = tempfile::tempdir().expect("Failed to create output dir");
        let data_dir = tempfile::tempdir().expect("Failed to create data dir");
        Self::start_in(output_dir, data_dir, engines, max_concurrent).await
    }

    /// Start against existing directories. Used for restart tests.
    pub async fn start_in(
        output_dir: TempDir,
        data_dir: TempDir,
        engines: EngineSet,
        max_concurrent: usize,
    ) -> Self {
        let history = HistoryStore::new(data_dir.path());
        let hub = StreamHub::new();
        let scheduler = JobScheduler::start(
            SchedulerConfig {
                max_concurrent,
                output_dir: output_dir.path().to_path_buf(),
                unit_timeout: Duration::from_secs(5),
            },
            engines,
            history,
            hub.clone(),
        )
        .await
        .expect("Failed to start scheduler");

        Self {
            scheduler,
            hub,
            output_dir,
            data_dir,
        }
    }
}

pub fn params(cities: &[&str], niches: &[&str]) -> JobParams {
    JobParams {
        country: "United Kingdom".to_string(),
        cities: cities.iter().map(|c| c.to_string()).collect(),
        states: Vec::new(),
        niches: niches.iter().map(|n| n.to_string()).collect(),
        sites: vec!["instagram.com".to_string()],
        scrape_mode: ScrapeMode::Emails,
        include_map_stage: false,
        category: None,
        tier: ServiceTier::Basic,
    }
}

/// Poll until the job leaves the active states.
pub async fn wait_for_terminal(scheduler: &Arc<JobScheduler>, id: Uuid) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = scheduler.job(id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not reach a terminal status in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the job is running (its first engine call may still be gated).
pub async fn wait_for_running(scheduler: &Arc<JobScheduler>, id: Uuid) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = scheduler.job(id) {
            if job.status == leadhunter_core::kernel::jobs::JobStatus::Running {
                return;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not start running in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
