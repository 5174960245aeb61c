//! Concurrency-safe discovery job table.
//!
//! One writer (the running pipeline task) and many readers (status polls).
//! Reads take cheap cloned snapshots; writes hold the lock only long enough
//! to mutate one record. Counters only increase and `status` only advances
//! through the declared stage order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use pavescout_common::types::{DiscoveryJob, JobProgress, JobStage};

#[derive(Clone, Default)]
pub struct JobTable {
    inner: Arc<RwLock<HashMap<Uuid, DiscoveryJob>>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `Queued` job record. This runs before the pipeline task is
    /// spawned, so a status query issued right after submission always finds
    /// the job.
    pub async fn initialize(&self, job_id: Uuid, owner_id: &str) {
        let job = DiscoveryJob {
            id: job_id,
            owner_id: owner_id.to_string(),
            status: JobStage::Queued,
            steps_completed: 0,
            progress: JobProgress::default(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        };
        self.inner.write().await.insert(job_id, job);
    }

    /// Read-only snapshot of a job.
    pub async fn snapshot(&self, job_id: Uuid) -> Option<DiscoveryJob> {
        self.inner.read().await.get(&job_id).cloned()
    }

    /// Advance a job to the given stage. Stage transitions never move
    /// backwards: an out-of-order call leaves the record untouched.
    pub async fn advance(&self, job_id: Uuid, stage: JobStage) {
        let Some(index) = stage.step_index() else {
            return; // Failed is set through fail()
        };
        let mut table = self.inner.write().await;
        if let Some(job) = table.get_mut(&job_id) {
            if job.status.is_terminal() || index < job.steps_completed {
                return;
            }
            job.status = stage;
            job.steps_completed = index;
        }
    }

    /// Apply a progress update. Counters are expected to only grow.
    pub async fn update_progress<F>(&self, job_id: Uuid, f: F)
    where
        F: FnOnce(&mut JobProgress),
    {
        let mut table = self.inner.write().await;
        if let Some(job) = table.get_mut(&job_id) {
            f(&mut job.progress);
        }
    }

    /// Mark a job completed.
    pub async fn complete(&self, job_id: Uuid) {
        let mut table = self.inner.write().await;
        if let Some(job) = table.get_mut(&job_id) {
            job.status = JobStage::Completed;
            if let Some(index) = JobStage::Completed.step_index() {
                job.steps_completed = index;
            }
            job.completed_at = Some(Utc::now());
        }
    }

    /// Mark a job failed, recording the message. Progress counters and
    /// `steps_completed` keep whatever the job accumulated before the
    /// failure.
    pub async fn fail(&self, job_id: Uuid, message: String) {
        let mut table = self.inner.write().await;
        if let Some(job) = table.get_mut(&job_id) {
            job.status = JobStage::Failed;
            job.errors.push(message);
            job.completed_at = Some(Utc::now());
        }
    }

    /// Drop job records completed before `cutoff`. Returns how many were
    /// removed.
    pub async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut table = self.inner.write().await;
        let before = table.len();
        table.retain(|_, job| match job.completed_at {
            Some(done) => done >= cutoff,
            None => true,
        });
        let removed = before - table.len();
        if removed > 0 {
            info!(removed, "Purged expired job records");
        }
        removed
    }
}
