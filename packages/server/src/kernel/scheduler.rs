//! Bounded-concurrency job scheduler.
//!
//! One registry mutex guards jobs, the FIFO queue, and the active set.
//! Event publication happens under that same lock, which is what makes the
//! SSE replay-then-live handoff exact: `subscribe` snapshots the event log
//! and opens the live receiver atomically, so a subscriber sees every event
//! exactly once, in order.
//!
//! The lock is a std Mutex and is never held across an await; persistence
//! snapshots the registry under the lock, behind an async gate that keeps
//! saves from different job tasks in order.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::kernel::engines::EngineSet;
use crate::kernel::history::{HistoryError, HistoryStore};
use crate::kernel::jobs::{Job, JobEvent, JobParams, JobStatus, QueueStatus, RecordedEvent};
use crate::kernel::orchestrator::{Outcome, ScrapeOrchestrator};
use crate::kernel::stream_hub::StreamHub;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid job parameters: {0}")]
    InvalidParams(String),

    #[error("user already has an active job")]
    AlreadyActive,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub output_dir: PathBuf,
    pub unit_timeout: Duration,
}

#[derive(Default)]
struct SchedulerState {
    jobs: HashMap<Uuid, Job>,
    /// Submission order, for history listings and persistence.
    order: Vec<Uuid>,
    queue: VecDeque<Uuid>,
    active: HashMap<Uuid, CancellationToken>,
}

pub struct JobScheduler {
    state: Mutex<SchedulerState>,
    hub: StreamHub,
    history: HistoryStore,
    engines: EngineSet,
    config: SchedulerConfig,
    persist_gate: tokio::sync::Mutex<()>,
}

impl JobScheduler {
    /// Load persisted history and reconcile it: jobs that were queued or
    /// running when the process died are marked failed, since their engine
    /// state is gone.
    pub async fn start(
        config: SchedulerConfig,
        engines: EngineSet,
        history: HistoryStore,
        hub: StreamHub,
    ) -> Result<Arc<Self>, HistoryError> {
        let mut state = SchedulerState::default();
        let mut interrupted = 0usize;

        for mut job in history.load().await? {
            if job.status.is_active() {
                let message = "interrupted by server restart".to_string();
                job.status = JobStatus::Failed;
                job.error = Some(message.clone());
                job.finished_at = Some(Utc::now());
                job.events.push(RecordedEvent {
                    time: Utc::now(),
                    event: JobEvent::JobFailed { message },
                });
                interrupted += 1;
            }
            state.order.push(job.id);
            state.jobs.insert(job.id, job);
        }

        if interrupted > 0 {
            tracing::warn!(count = interrupted, "Marked interrupted jobs as failed");
        }
        tracing::info!(jobs = state.order.len(), "Job history loaded");

        let scheduler = Arc::new(Self {
            state: Mutex::new(state),
            hub,
            history,
            engines,
            config,
            persist_gate: tokio::sync::Mutex::new(()),
        });

        let snapshot = scheduler.jobs_snapshot(&scheduler.lock());
        scheduler.history.save(&snapshot).await?;
        Ok(scheduler)
    }

    /// Admit a job. At most one queued-or-running job per user.
    pub async fn submit(
        self: &Arc<Self>,
        user_id: &str,
        params: JobParams,
    ) -> Result<Job, SubmitError> {
        params.validate().map_err(SubmitError::InvalidParams)?;

        let job = {
            let mut state = self.lock();
            if state
                .jobs
                .values()
                .any(|j| j.user_id == user_id && j.status.is_active())
            {
                return Err(SubmitError::AlreadyActive);
            }

            let job = Job::new(user_id, params);
            let id = job.id;
            tracing::info!(job_id = %id, user_id, "Job submitted");
            state.order.push(id);
            state.queue.push_back(id);
            state.jobs.insert(id, job);
            self.pump_locked(&mut state);

            state.jobs[&id].clone()
        };

        self.persist().await;
        Ok(job)
    }

    /// Stop a job. Queued jobs are removed and marked immediately; running
    /// jobs get their token cancelled and flip to stopped once the pipeline
    /// acknowledges. Returns false for unknown or already-terminal jobs.
    pub async fn stop(&self, job_id: Uuid) -> bool {
        let (stopped, terminal) = {
            let mut state = self.lock();
            let Some(job) = state.jobs.get_mut(&job_id) else {
                return false;
            };

            match job.status {
                JobStatus::Running => {
                    tracing::info!(job_id = %job_id, "Stop requested for running job");
                    if let Some(token) = state.active.get(&job_id) {
                        token.cancel();
                    }
                    (true, false)
                }
                JobStatus::Queued => {
                    tracing::info!(job_id = %job_id, "Stopping queued job");
                    let recorded = RecordedEvent {
                        time: Utc::now(),
                        event: JobEvent::JobStopped {
                            message: "Job stopped while queued.".to_string(),
                        },
                    };
                    job.status = JobStatus::Stopped;
                    job.finished_at = Some(recorded.time);
                    job.events.push(recorded.clone());
                    state.queue.retain(|id| *id != job_id);
                    self.hub.publish(job_id, recorded);
                    (true, true)
                }
                _ => (false, false),
            }
        };

        if terminal {
            self.persist().await;
        }
        stopped
    }

    /// Snapshot the job's event log and open a live receiver atomically, so
    /// replay-then-live neither drops nor duplicates an event.
    pub fn subscribe(
        &self,
        job_id: Uuid,
    ) -> Option<(Vec<RecordedEvent>, broadcast::Receiver<RecordedEvent>)> {
        let state = self.lock();
        let job = state.jobs.get(&job_id)?;
        let rx = self.hub.subscribe(job_id);
        Some((job.events.clone(), rx))
    }

    pub fn job(&self, job_id: Uuid) -> Option<Job> {
        self.lock().jobs.get(&job_id).cloned()
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            active: state.active.len(),
            queued: state.queue.len(),
            max: self.config.max_concurrent,
        }
    }

    /// The user's jobs, newest first.
    pub fn user_history(&self, user_id: &str) -> Vec<Job> {
        let state = self.lock();
        state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.jobs.get(id))
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Resolve a download path, but only for file names the job actually
    /// produced (and nothing that could escape the output directory).
    pub fn job_file_path(&self, job_id: Uuid, file_name: &str) -> Option<PathBuf> {
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return None;
        }
        let state = self.lock();
        let job = state.jobs.get(&job_id)?;
        if job.files.iter().any(|f| f == file_name) {
            Some(self.config.output_dir.join(file_name))
        } else {
            None
        }
    }

    /// Start queued jobs while capacity allows.
    fn pump_locked(self: &Arc<Self>, state: &mut SchedulerState) {
        while state.active.len() < self.config.max_concurrent {
            let Some(id) = state.queue.pop_front() else {
                break;
            };
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            // A job stopped while queued stays in the map but must not run.
            if job.status != JobStatus::Queued {
                continue;
            }

            job.status = JobStatus::Running;
            let cancel = CancellationToken::new();
            state.active.insert(id, cancel.clone());

            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let orchestrator = ScrapeOrchestrator::new(
                id,
                job.params.clone(),
                self.engines.clone(),
                tx.clone(),
                cancel,
                self.config.output_dir.clone(),
                self.config.unit_timeout,
            );

            tracing::info!(job_id = %id, user_id = %job.user_id, "Starting job");
            tokio::spawn(drive(orchestrator, tx));
            tokio::spawn(self.clone().consume(id, rx));
        }
    }

    /// Per-job event consumer: timestamps, appends to the log, publishes,
    /// and on the terminal event frees the slot, re-pumps, and persists.
    async fn consume(self: Arc<Self>, job_id: Uuid, mut rx: mpsc::Receiver<JobEvent>) {
        while let Some(event) = rx.recv().await {
            let recorded = RecordedEvent {
                time: Utc::now(),
                event,
            };
            let terminal = recorded.event.terminal_status();

            {
                let mut state = self.lock();
                if let Some(job) = state.jobs.get_mut(&job_id) {
                    for name in recorded.event.file_names() {
                        if !job.files.iter().any(|f| f == name) {
                            job.files.push(name.to_string());
                        }
                    }
                    if let Some(status) = terminal {
                        // stop() may have marked a queued job already;
                        // the first terminal transition wins.
                        if job.status.is_active() {
                            job.status = status;
                        }
                        job.finished_at = Some(recorded.time);
                        if let JobEvent::JobFailed { message } = &recorded.event {
                            job.error = Some(message.clone());
                        }
                    }
                    job.events.push(recorded.clone());
                }
                self.hub.publish(job_id, recorded);

                if terminal.is_some() {
                    state.active.remove(&job_id);
                    self.pump_locked(&mut state);
                }
            }

            if terminal.is_some() {
                // Drop stream channels nobody listens to anymore.
                self.hub.cleanup();
                self.persist().await;
            }
        }
    }

    fn jobs_snapshot(&self, state: &SchedulerState) -> Vec<Job> {
        state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .cloned()
            .collect()
    }

    /// Snapshot and save the registry. The gate is taken before the
    /// snapshot, so concurrent callers write in snapshot order and a slow
    /// save can never overwrite a newer state.
    async fn persist(&self) {
        let _guard = self.persist_gate.lock().await;
        let jobs = self.jobs_snapshot(&self.lock());
        if let Err(e) = self.history.save(&jobs).await {
            tracing::error!(error = %e, "Failed to persist job history");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Await the pipeline and turn its outcome into the job's single terminal
/// event.
async fn drive(orchestrator: ScrapeOrchestrator, events: mpsc::Sender<JobEvent>) {
    let terminal = match orchestrator.run().await {
        Ok(Outcome::Completed(files)) => JobEvent::JobCompleted {
            message: "Scraping completed successfully.".to_string(),
            files,
        },
        Ok(Outcome::Stopped) => JobEvent::JobStopped {
            message: "Job stopped by user.".to_string(),
        },
        Err(e) => {
            tracing::error!(error = %e, "Job pipeline failed");
            JobEvent::JobFailed {
                message: e.to_string(),
            }
        }
    };
    let _ = events.send(terminal).await;
}
