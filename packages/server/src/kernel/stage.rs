//! Stage runner: one engine plus the failure policy around it.
//!
//! Every query goes through the same gauntlet: cancellation check, timeout,
//! and a consecutive-failure circuit breaker. Two failures in a row (or a
//! single bot-challenge signature) take the engine out of play for the rest
//! of the job, which is what `Unrecoverable` means to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::kernel::engines::{EngineError, StageEngine, StageResult};

/// Consecutive failures before an engine is considered gone.
pub const FAILURE_THRESHOLD: u32 = 2;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage cancelled")]
    Cancelled,

    /// Unit failed but the engine is still worth trying.
    #[error("stage query failed: {0}")]
    Failed(String),

    /// The engine is done for this job: breaker tripped or challenge hit.
    #[error("engine unrecoverable: {0}")]
    Unrecoverable(String),
}

/// Consecutive-failure counter. Any success resets it.
#[derive(Debug)]
pub struct CircuitBreaker {
    consecutive: u32,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Returns true once the threshold is reached.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.threshold
    }
}

pub struct StageRunner {
    engine: Arc<dyn StageEngine>,
    breaker: CircuitBreaker,
    timeout: Duration,
    cancel: CancellationToken,
}

impl StageRunner {
    pub fn new(engine: Arc<dyn StageEngine>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            engine,
            breaker: CircuitBreaker::new(FAILURE_THRESHOLD),
            timeout,
            cancel,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run one query through the engine.
    pub async fn run(&mut self, query: &str) -> Result<Vec<StageResult>, StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Err(StageError::Cancelled),
            res = tokio::time::timeout(self.timeout, self.engine.fetch(query)) => res,
        };

        match fetched {
            Err(_elapsed) => self.failure(format!(
                "{} timed out after {}s",
                self.engine.name(),
                self.timeout.as_secs()
            )),
            Ok(Err(EngineError::Blocked(reason))) => {
                tracing::warn!(engine = self.engine.name(), reason = %reason, "Engine blocked");
                Err(StageError::Unrecoverable(format!(
                    "{} blocked: {reason}",
                    self.engine.name()
                )))
            }
            Ok(Err(e)) => self.failure(e.to_string()),
            Ok(Ok(results)) => {
                self.breaker.record_success();
                Ok(results)
            }
        }
    }

    fn failure(&mut self, reason: String) -> Result<Vec<StageResult>, StageError> {
        tracing::warn!(engine = self.engine.name(), reason = %reason, "Stage query failed");
        if self.breaker.record_failure() {
            Err(StageError::Unrecoverable(format!(
                "{} failed {} times in a row, last: {reason}",
                self.engine.name(),
                FAILURE_THRESHOLD
            )))
        } else {
            Err(StageError::Failed(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn breaker_trips_at_threshold_and_resets_on_success() {
        let mut breaker = CircuitBreaker::new(2);
        assert!(!breaker.record_failure());
        assert!(breaker.record_failure());

        let mut breaker = CircuitBreaker::new(2);
        assert!(!breaker.record_failure());
        breaker.record_success();
        assert!(!breaker.record_failure());
        assert!(breaker.record_failure());
    }

    struct ScriptedEngine {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl StageEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self, _query: &str) -> Result<Vec<StageResult>, EngineError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(EngineError::Process {
                    status: 1,
                    stderr: "boom".to_string(),
                })
            } else {
                Ok(vec![])
            }
        }
    }

    #[tokio::test]
    async fn second_consecutive_failure_is_unrecoverable() {
        let engine = Arc::new(ScriptedEngine {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        });
        let mut runner = StageRunner::new(
            engine,
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        assert!(matches!(runner.run("q").await, Err(StageError::Failed(_))));
        assert!(matches!(
            runner.run("q").await,
            Err(StageError::Unrecoverable(_))
        ));
    }

    #[tokio::test]
    async fn success_between_failures_keeps_engine_alive() {
        let engine = Arc::new(ScriptedEngine {
            calls: AtomicUsize::new(0),
            fail_first: 1,
        });
        let mut runner = StageRunner::new(
            engine.clone(),
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        assert!(matches!(runner.run("q").await, Err(StageError::Failed(_))));
        assert!(runner.run("q").await.is_ok());
        // Breaker reset: a later single failure is still just Failed.
        engine.calls.store(0, Ordering::SeqCst);
        assert!(matches!(runner.run("q").await, Err(StageError::Failed(_))));
    }

    struct BlockedEngine;

    #[async_trait]
    impl StageEngine for BlockedEngine {
        fn name(&self) -> &'static str {
            "blocked"
        }

        async fn fetch(&self, _query: &str) -> Result<Vec<StageResult>, EngineError> {
            Err(EngineError::Blocked("captcha".to_string()))
        }
    }

    #[tokio::test]
    async fn blocked_engine_is_immediately_unrecoverable() {
        let mut runner = StageRunner::new(
            Arc::new(BlockedEngine),
            Duration::from_secs(5),
            CancellationToken::new(),
        );
        assert!(matches!(
            runner.run("q").await,
            Err(StageError::Unrecoverable(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut runner = StageRunner::new(
            Arc::new(BlockedEngine),
            Duration::from_secs(5),
            cancel,
        );
        assert!(matches!(runner.run("q").await, Err(StageError::Cancelled)));
    }
}
