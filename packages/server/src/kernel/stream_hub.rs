//! In-process pub/sub hub for real-time job streaming.
//!
//! One broadcast channel per job id, feeding SSE endpoints. Locking is
//! synchronous (std Mutex, never held across await) so the scheduler can
//! publish while holding its registry lock, which keeps the replay-then-live
//! handoff gap-free for subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::kernel::jobs::RecordedEvent;

/// Thread-safe, cloneable. Keyed by job id.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<RecordedEvent>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new StreamHub with default capacity (256 events per job).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish an event for a job. No-op if nobody is subscribed.
    pub fn publish(&self, job_id: Uuid, event: RecordedEvent) {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = channels.get(&job_id) {
            // Ignore send errors (no active receivers)
            let _ = tx.send(event);
        }
    }

    /// Subscribe to a job's events. Creates the channel if it doesn't exist.
    pub fn subscribe(&self, job_id: Uuid) -> broadcast::Receiver<RecordedEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let tx = channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers. The scheduler runs this on
    /// every terminal transition so the channel map doesn't grow for the
    /// process lifetime.
    pub fn cleanup(&self) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
