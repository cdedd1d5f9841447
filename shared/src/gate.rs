/// Bounded admission gate for download jobs.
///
/// A tokio Semaphore caps how many jobs run at once; per-job metadata is
/// tracked alongside so logs and tests can observe queue depth.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a single job. Transitions only move forward; `Failed` is
/// terminal and reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Admitted,
    Downloading,
    ValidatingSize,
    Uploading,
    Completed,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Admitted => write!(f, "admitted"),
            JobState::Downloading => write!(f, "downloading"),
            JobState::ValidatingSize => write!(f, "validating-size"),
            JobState::Uploading => write!(f, "uploading"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Metadata for a job known to the gate.
#[derive(Debug, Clone)]
pub struct TrackedJob {
    pub id: Uuid,
    pub chat_id: i64,
    pub url: String,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub admitted_at: Option<DateTime<Utc>>,
}

/// Slot held while a job runs. Dropping it returns the slot to the gate,
/// whichever path the job exits through.
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

/// Caps concurrent downloads at a fixed number of slots.
pub struct JobGate {
    semaphore: Arc<Semaphore>,
    jobs: Mutex<HashMap<Uuid, TrackedJob>>,
    max_slots: usize,
}

impl JobGate {
    /// Create a gate with the given number of slots.
    pub fn new(max_slots: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_slots)),
            jobs: Mutex::new(HashMap::new()),
            max_slots,
        }
    }

    /// Register a job ahead of admission. Returns false if the id is
    /// already tracked.
    pub async fn register(&self, id: Uuid, chat_id: i64, url: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&id) {
            warn!("Job {} already registered", id);
            return false;
        }

        jobs.insert(
            id,
            TrackedJob {
                id,
                chat_id,
                url: url.to_string(),
                state: JobState::Queued,
                enqueued_at: Utc::now(),
                admitted_at: None,
            },
        );

        info!("Job {} registered for chat {}", id, chat_id);
        true
    }

    /// Wait for a slot. Suspends the calling task while the gate is full;
    /// other tasks keep running. Returns `None` only if the semaphore has
    /// been closed, which the bot never does in normal operation.
    pub async fn admit(&self, id: Uuid) -> Option<SlotPermit> {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                warn!("Gate closed, job {} not admitted", id);
                return None;
            }
        };

        if let Some(job) = self.jobs.lock().await.get_mut(&id) {
            job.state = JobState::Admitted;
            job.admitted_at = Some(Utc::now());
        }

        info!("Job {} admitted ({}/{} slots busy)", id, self.running(), self.max_slots);
        Some(SlotPermit { _permit: permit })
    }

    /// Advance a job to its next pipeline state.
    pub async fn transition(&self, id: Uuid, state: JobState) {
        if let Some(job) = self.jobs.lock().await.get_mut(&id) {
            debug!("Job {}: {} -> {}", id, job.state, state);
            job.state = state;
        }
    }

    /// Remove a finished job, logging its outcome and elapsed time. The
    /// slot itself is returned by dropping the job's `SlotPermit`.
    pub async fn finish(&self, id: Uuid, state: JobState) {
        match self.jobs.lock().await.remove(&id) {
            Some(job) => match job.admitted_at {
                Some(at) => {
                    let secs = Utc::now().signed_duration_since(at).num_seconds();
                    info!("Job {} {} after {}s", id, state, secs);
                }
                None => info!("Job {} {} before admission", id, state),
            },
            None => warn!("Job {} finished but was not tracked", id),
        }
    }

    /// Configured slot count.
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Jobs currently holding a slot.
    pub fn running(&self) -> usize {
        self.max_slots - self.semaphore.available_permits()
    }

    /// Jobs registered but not yet admitted.
    pub async fn waiting(&self) -> usize {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|j| j.state == JobState::Queued)
            .count()
    }

    /// Gate statistics snapshot.
    pub async fn stats(&self) -> GateStats {
        GateStats {
            max_slots: self.max_slots,
            running: self.running(),
            waiting: self.waiting().await,
        }
    }
}

/// Point-in-time view of the gate.
#[derive(Debug, Clone)]
pub struct GateStats {
    pub max_slots: usize,
    pub running: usize,
    pub waiting: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_admit() {
        let gate = JobGate::new(2);
        let id = Uuid::new_v4();
        assert!(gate.register(id, 123, "http://example.com/a").await);

        let permit = gate.admit(id).await;
        assert!(permit.is_some());
        assert_eq!(gate.running(), 1);
    }

    #[tokio::test]
    async fn test_drop_permit_releases_slot() {
        let gate = JobGate::new(1);
        let id = Uuid::new_v4();
        gate.register(id, 123, "http://example.com/a").await;

        let permit = gate.admit(id).await.unwrap();
        assert_eq!(gate.running(), 1);

        drop(permit);
        assert_eq!(gate.running(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_register() {
        let gate = JobGate::new(2);
        let id = Uuid::new_v4();
        assert!(gate.register(id, 123, "http://example.com/a").await);
        assert!(!gate.register(id, 123, "http://example.com/a").await);
    }

    #[tokio::test]
    async fn test_stats() {
        let gate = JobGate::new(3);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        gate.register(a, 100, "http://example.com/a").await;
        gate.register(b, 100, "http://example.com/b").await;

        let _permit = gate.admit(a).await.unwrap();

        let stats = gate.stats().await;
        assert_eq!(stats.running, 1);
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.max_slots, 3);
    }

    #[tokio::test]
    async fn test_finish_removes_job() {
        let gate = JobGate::new(1);
        let id = Uuid::new_v4();
        gate.register(id, 123, "http://example.com/a").await;

        let permit = gate.admit(id).await.unwrap();
        drop(permit);
        gate.finish(id, JobState::Completed).await;

        let stats = gate.stats().await;
        assert_eq!(stats.running, 0);
        assert_eq!(stats.waiting, 0);
    }
}
