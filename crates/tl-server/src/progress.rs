//! In-memory progress tracking for video jobs.
//!
//! The [`ProgressTracker`] is the only shared mutable structure in the upload
//! path: the detached pipeline writes to it and any number of polling
//! handlers read from it. Entries are removed after their retention window,
//! either lazily on read or by the periodic sweeper from [`start_sweeper`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use tl_core::{JobId, JobStatus};

/// Progress state of one video job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub job_id: JobId,
    pub status: JobStatus,
    /// 0..=100; never decreases while the job is running.
    pub progress: u8,
    pub message: String,
    pub output_filename: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingJob {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// What a poller sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ProcessingJob> for ProgressView {
    fn from(job: ProcessingJob) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            progress: job.progress,
            message: job.message,
            error: job.error,
        }
    }
}

/// Thread-safe registry of job progress.
///
/// Cloning is cheap; every clone shares the same table.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    jobs: Arc<DashMap<JobId, ProcessingJob>>,
    /// Age after which a job without a scheduled expiry is dropped.
    stale_after: Duration,
}

impl ProgressTracker {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            stale_after,
        }
    }

    /// Register a job in `preparing` at progress 0.
    pub fn create(&self, job_id: JobId, output_filename: impl Into<String>) {
        let output_filename = output_filename.into();
        tracing::debug!(job_id = %job_id, output = %output_filename, "Tracking new job");
        self.jobs.insert(
            job_id,
            ProcessingJob {
                job_id,
                status: JobStatus::Preparing,
                progress: 0,
                message: JobStatus::Preparing.default_message().to_string(),
                output_filename,
                created_at: Utc::now(),
                finished_at: None,
                expires_at: None,
                error: None,
            },
        );
    }

    /// Overwrite the mutable fields of a running job.
    ///
    /// Silently ignored when the job is unknown or already terminal, and when
    /// `status` would move the job back to an earlier stage. Progress is
    /// clamped to 100 and never decreases; moving to `error` keeps the last
    /// progress value.
    pub fn update(
        &self,
        job_id: JobId,
        status: JobStatus,
        progress: u8,
        message: impl Into<String>,
        error: Option<String>,
    ) {
        let Some(mut job) = self.jobs.get_mut(&job_id) else {
            tracing::debug!(job_id = %job_id, "Ignoring update for unknown job");
            return;
        };

        if job.status.is_terminal() {
            tracing::debug!(job_id = %job_id, status = %job.status, "Ignoring update for finished job");
            return;
        }
        if status.rank() < job.status.rank() {
            tracing::debug!(
                job_id = %job_id,
                from = %job.status,
                to = %status,
                "Ignoring stage regression"
            );
            return;
        }

        if status != JobStatus::Error {
            job.progress = job.progress.max(progress.min(100));
        }
        job.status = status;
        job.message = message.into();
        if status == JobStatus::Error {
            job.error = Some(error.unwrap_or_else(|| "unknown error".to_string()));
        }
        if status.is_terminal() {
            job.finished_at = Some(Utc::now());
        }
    }

    /// Snapshot of a job, or `None` if it never existed or has expired.
    pub fn get(&self, job_id: JobId) -> Option<ProcessingJob> {
        let now = Utc::now();
        if self
            .jobs
            .remove_if(&job_id, |_, job| job.is_expired(now))
            .is_some()
        {
            tracing::debug!(job_id = %job_id, "Expired job removed on read");
            return None;
        }
        self.jobs.get(&job_id).map(|entry| entry.value().clone())
    }

    /// Schedule removal of a job `after` from now.
    pub fn expire(&self, job_id: JobId, after: Duration) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            let now = Utc::now();
            let at = chrono::Duration::from_std(after)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            job.expires_at = Some(at);
        }
    }

    /// Remove every job whose expiry has passed, plus jobs that never got an
    /// expiry and are older than the stale threshold.
    ///
    /// Returns the number of jobs removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .unwrap_or_else(|_| chrono::Duration::hours(6));

        let mut removed = 0;
        self.jobs.retain(|job_id, job| {
            let expired = job.is_expired(now);
            let stale = job.expires_at.is_none() && now - job.created_at > stale_after;
            if expired || stale {
                tracing::info!(
                    job_id = %job_id,
                    status = %job.status,
                    stale = stale,
                    "Job removed from progress table"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            tracing::debug!(removed = removed, "Swept progress table");
        }
        removed
    }

    /// All tracked jobs, oldest first.
    pub fn snapshot(&self) -> Vec<ProcessingJob> {
        let mut jobs: Vec<_> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(6 * 60 * 60))
    }
}

/// Start a background task that periodically sweeps expired jobs.
///
/// Runs until `cancel` fires.
pub fn start_sweeper(
    tracker: ProgressTracker,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // tokio rejects a zero period.
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracker.sweep_expired();
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("Progress sweeper stopped");
                    break;
                }
            }
        }
    })
}
