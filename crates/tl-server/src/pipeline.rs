//! The video job state machine.
//!
//! ```text
//! preparing -> extracting_cover -> processing_video -> generating_thumbnail -> completed
//!                     |                   |                     |
//!                     +-----------------> error <---------------+
//! ```
//!
//! `preparing` happens in the orchestrator (staging the working copy). The
//! [`VideoPipeline`] owns every later stage, records each transition in the
//! [`ProgressTracker`], and leaves no partial artifacts behind on failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use tl_core::config::{Config, UploadLayout};
use tl_core::{JobId, JobStatus};
use tl_media::actions::{cover_timestamp, thumbnail_timestamp};
use tl_media::{remove_best_effort, VideoBackend, WorkingCopy};

use crate::progress::ProgressTracker;

/// Progress reported when the cover frame is being extracted.
pub const COVER_PROGRESS: u8 = 10;
/// Band the encoder's own 0..100% is mapped onto.
pub const ENCODE_BAND: (u8, u8) = (20, 80);
/// Progress reported while the thumbnail is extracted.
pub const THUMBNAIL_PROGRESS: u8 = 80;

/// Map encoder completion onto `[start, end]`:
/// `start + floor(percent) * (end - start) / 100`.
pub fn band_progress(start: u8, end: u8, encoder_percent: f64) -> u8 {
    let pct = if encoder_percent.is_finite() {
        encoder_percent.clamp(0.0, 100.0).floor() as u32
    } else {
        0
    };
    let width = u32::from(end.saturating_sub(start));
    let mapped = u32::from(start) + pct * width / 100;
    mapped.min(100) as u8
}

// ---------------------------------------------------------------------------
// VideoArtifacts
// ---------------------------------------------------------------------------

/// Output paths and client URLs for one video job.
///
/// URLs are computed before any file exists so fire-and-forget responses
/// can hand them out immediately.
#[derive(Debug, Clone, Serialize)]
pub struct VideoArtifacts {
    pub processed_name: String,
    #[serde(skip)]
    pub video_path: PathBuf,
    #[serde(skip)]
    pub cover_path: PathBuf,
    #[serde(skip)]
    pub thumbnail_path: PathBuf,
    pub video_url: String,
    pub cover_url: String,
    pub thumbnail_url: String,
}

impl VideoArtifacts {
    /// Lay out artifacts for `<processed_name>` under `layout`.
    pub fn plan(layout: &UploadLayout, processed_name: &str, container: &str) -> Self {
        let video = format!("{processed_name}.{container}");
        let cover = format!("{processed_name}_cover.jpg");
        let thumbnail = format!("{processed_name}_thumb.jpg");
        Self {
            processed_name: processed_name.to_string(),
            video_path: layout.videos.join(&video),
            cover_path: layout.covers.join(&cover),
            thumbnail_path: layout.thumbnails.join(&thumbnail),
            video_url: format!("videos/{video}"),
            cover_url: format!("covers/{cover}"),
            thumbnail_url: format!("thumbnails/{thumbnail}"),
        }
    }

    /// File name of the transcoded video.
    pub fn video_file_name(&self) -> String {
        self.video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.processed_name.clone())
    }

    fn paths(&self) -> [&Path; 3] {
        [&self.video_path, &self.cover_path, &self.thumbnail_path]
    }

    /// Remove whatever this job managed to write.
    pub fn remove_partial(&self) {
        for path in self.paths() {
            if path.exists() {
                remove_best_effort(path, "partial artifact");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// VideoPipeline
// ---------------------------------------------------------------------------

/// Runs the post-`preparing` stages of a video job.
#[derive(Clone)]
pub struct VideoPipeline {
    backend: Arc<dyn VideoBackend>,
    tracker: ProgressTracker,
    config: Arc<Config>,
    permits: Arc<Semaphore>,
}

impl VideoPipeline {
    pub fn new(backend: Arc<dyn VideoBackend>, tracker: ProgressTracker, config: Arc<Config>) -> Self {
        let permits = Arc::new(Semaphore::new(config.jobs.max_concurrent_transcodes.max(1)));
        Self {
            backend,
            tracker,
            config,
            permits,
        }
    }

    /// Number of transcodes that could start right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Drive a staged job to a terminal state.
    ///
    /// Waits for a transcoding slot first. Whatever the outcome, the working
    /// copy is removed and the job is scheduled to expire after the
    /// retention window. On failure every partial artifact is deleted and
    /// the error is both recorded in the tracker and returned.
    pub async fn run(
        &self,
        job_id: JobId,
        working: WorkingCopy,
        artifacts: &VideoArtifacts,
    ) -> tl_core::Result<()> {
        if self.permits.available_permits() == 0 {
            self.tracker.update(
                job_id,
                JobStatus::Preparing,
                0,
                "Waiting for a free transcoding slot",
                None,
            );
        }
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| tl_core::Error::Internal("transcoding pool is closed".into()))?;

        tracing::info!(
            job_id = %job_id,
            backend = self.backend.name(),
            output = %artifacts.processed_name,
            "Video job started"
        );

        let result = self.run_stages(job_id, working.path(), artifacts).await;
        working.cleanup();

        match &result {
            Ok(()) => {
                self.tracker.update(
                    job_id,
                    JobStatus::Completed,
                    100,
                    JobStatus::Completed.default_message(),
                    None,
                );
                tracing::info!(job_id = %job_id, output = %artifacts.video_url, "Video job completed");
            }
            Err(e) => {
                artifacts.remove_partial();
                self.tracker.update(
                    job_id,
                    JobStatus::Error,
                    0,
                    JobStatus::Error.default_message(),
                    Some(e.to_string()),
                );
                tracing::warn!(job_id = %job_id, error = %e, "Video job failed");
            }
        }

        self.tracker.expire(job_id, self.config.jobs.retention());
        result
    }

    async fn run_stages(
        &self,
        job_id: JobId,
        input: &Path,
        artifacts: &VideoArtifacts,
    ) -> tl_core::Result<()> {
        let video = &self.config.video;

        self.advance(job_id, JobStatus::ExtractingCover, COVER_PROGRESS);
        let duration = self.backend.probe_duration(input).await?;
        self.backend
            .extract_frame(
                input,
                &artifacts.cover_path,
                cover_timestamp(duration),
                video.cover_width,
            )
            .await?;

        self.advance(job_id, JobStatus::ProcessingVideo, ENCODE_BAND.0);
        let tracker = self.tracker.clone();
        let sink = move |percent: f64| {
            let progress = band_progress(ENCODE_BAND.0, ENCODE_BAND.1, percent);
            tracker.update(
                job_id,
                JobStatus::ProcessingVideo,
                progress,
                format!("Transcoding video ({}%)", percent.clamp(0.0, 100.0).floor()),
                None,
            );
        };
        self.backend
            .transcode(input, &artifacts.video_path, duration, &sink)
            .await?;

        self.advance(job_id, JobStatus::GeneratingThumbnail, THUMBNAIL_PROGRESS);
        self.backend
            .extract_frame(
                input,
                &artifacts.thumbnail_path,
                thumbnail_timestamp(video.thumbnail_at_secs, duration),
                video.thumbnail_width,
            )
            .await?;

        Ok(())
    }

    fn advance(&self, job_id: JobId, status: JobStatus, progress: u8) {
        tracing::debug!(job_id = %job_id, stage = %status, progress = progress, "Stage started");
        self.tracker
            .update(job_id, status, progress, status.default_message(), None);
    }
}
