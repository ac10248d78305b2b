//! Upload orchestration: validation, transcoder selection, execution mode and
//! cleanup.
//!
//! Every upload enters as an [`UploadedFile`] that the receiving layer has
//! already written to the staging directory. The orchestrator wraps it in a
//! [`StagedUpload`] guard so the staged file is removed exactly once on every
//! path, rejected or not.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use tl_core::config::{Config, UploadLayout};
use tl_core::{short_suffix, Error, JobId, JobStatus, MediaKind, Result};
use tl_media::{transcode_avatar, transcode_image, StagedUpload, VideoBackend, WorkingCopy};

use crate::pipeline::{VideoArtifacts, VideoPipeline};
use crate::progress::{ProgressTracker, ProgressView};

/// An upload written to the staging directory by the receiving layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub temp_path: PathBuf,
    pub declared_mime_type: String,
    pub original_name: String,
    pub size: u64,
}

/// Response for a video upload.
///
/// With `status = "processing"` the URLs are provisional: the files appear
/// once the job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoUploadResponse {
    pub video_url: String,
    pub cover_url: String,
    pub thumbnail_url: String,
    pub status: String,
    pub job_id: JobId,
}

impl VideoUploadResponse {
    fn new(job_id: JobId, artifacts: &VideoArtifacts, status: &str) -> Self {
        Self {
            video_url: artifacts.video_url.clone(),
            cover_url: artifacts.cover_url.clone(),
            thumbnail_url: artifacts.thumbnail_url.clone(),
            status: status.to_string(),
            job_id,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status == "processing"
    }
}

/// Result of [`UploadOrchestrator::handle_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Image { file_name: String, url: String },
    Avatar { file_name: String, url: String },
    Video(VideoUploadResponse),
}

/// Routes uploads to the right transcoder and owns background video jobs.
#[derive(Clone)]
pub struct UploadOrchestrator {
    config: Arc<Config>,
    layout: UploadLayout,
    tracker: ProgressTracker,
    pipeline: VideoPipeline,
    tasks: TaskTracker,
}

impl UploadOrchestrator {
    pub fn new(config: Arc<Config>, backend: Arc<dyn VideoBackend>, tracker: ProgressTracker) -> Self {
        let layout = config.uploads.layout();
        let pipeline = VideoPipeline::new(backend, tracker.clone(), config.clone());
        Self {
            config,
            layout,
            tracker,
            pipeline,
            tasks: TaskTracker::new(),
        }
    }

    pub fn layout(&self) -> &UploadLayout {
        &self.layout
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Number of detached video jobs still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Transcoding slots not currently held by a job.
    pub fn free_slots(&self) -> usize {
        self.pipeline.available_slots()
    }

    /// Dispatch an upload by kind. Images and avatars always run inline;
    /// videos follow `fast_response`.
    pub async fn handle_upload(
        &self,
        file: UploadedFile,
        kind: MediaKind,
        fast_response: bool,
    ) -> Result<UploadOutcome> {
        match kind {
            MediaKind::Image => {
                let file_name = self.start_image_processing(file).await?;
                Ok(UploadOutcome::Image {
                    url: format!("images/{file_name}"),
                    file_name,
                })
            }
            MediaKind::Avatar => {
                let file_name = self.start_avatar_processing(file).await?;
                Ok(UploadOutcome::Avatar {
                    url: format!("avatars/{file_name}"),
                    file_name,
                })
            }
            MediaKind::Video => self
                .start_video_processing(file, fast_response)
                .await
                .map(UploadOutcome::Video),
        }
    }

    /// Recompress an image into the images directory. Returns the file name.
    pub async fn start_image_processing(&self, file: UploadedFile) -> Result<String> {
        let config = self.config.images.clone();
        let target = self.layout.images.clone();
        self.run_still(file, MediaKind::Image, move |source| {
            transcode_image(source, &target, &config)
        })
        .await
    }

    /// Produce a square avatar in the avatars directory. Returns the file name.
    pub async fn start_avatar_processing(&self, file: UploadedFile) -> Result<String> {
        let config = self.config.avatar.clone();
        let target = self.layout.avatars.clone();
        self.run_still(file, MediaKind::Avatar, move |source| {
            transcode_avatar(source, &target, &config)
        })
        .await
    }

    async fn run_still<F>(&self, file: UploadedFile, kind: MediaKind, transcode: F) -> Result<String>
    where
        F: FnOnce(&Path) -> Result<String> + Send + 'static,
    {
        let staged = StagedUpload::new(&file.temp_path);
        if let Err(e) = self.validate(&file, kind).await {
            tracing::info!(kind = %kind, name = %file.original_name, "Upload rejected: {e}");
            staged.remove();
            return Err(e);
        }

        let source = staged.path().to_path_buf();
        let joined = tokio::task::spawn_blocking(move || transcode(&source))
            .await
            .map_err(|e| Error::Internal(format!("{kind} transcoding task failed: {e}")))
            .and_then(|result| result);

        // The transcoder deletes its source on success.
        let file_name = match joined {
            Ok(name) => {
                staged.disarm();
                name
            }
            Err(e) => {
                staged.remove();
                return Err(e);
            }
        };
        tracing::info!(kind = %kind, file = %file_name, "Upload processed");
        Ok(file_name)
    }

    /// Start a video job.
    ///
    /// The `preparing` stage (job registration and working copy) always runs
    /// inline. The remaining stages run on a tracked task in both modes, so
    /// dropping the caller never abandons a job halfway. With
    /// `fast_response` the response carries provisional URLs; otherwise the
    /// call waits for the job to become terminal.
    pub async fn start_video_processing(
        &self,
        file: UploadedFile,
        fast_response: bool,
    ) -> Result<VideoUploadResponse> {
        let staged = StagedUpload::new(&file.temp_path);
        if let Err(e) = self.validate(&file, MediaKind::Video).await {
            tracing::info!(name = %file.original_name, "Video upload rejected: {e}");
            staged.remove();
            return Err(e);
        }

        let stem = staged
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(tl_core::staged_basename);
        let processed = format!("{stem}_{}", short_suffix());
        let artifacts = VideoArtifacts::plan(&self.layout, &processed, &self.config.video.container);

        let job_id = JobId::new();
        self.tracker.create(job_id, artifacts.video_file_name());
        tracing::info!(
            job_id = %job_id,
            name = %file.original_name,
            output = %artifacts.video_url,
            fast_response = fast_response,
            "Video job registered"
        );

        let extension = staged
            .path()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let working_name = format!("{processed}_temp{extension}");
        let working = match WorkingCopy::stage(staged.path(), &self.layout.temp, &working_name).await {
            Ok(working) => working,
            Err(e) => {
                staged.remove();
                self.tracker.update(
                    job_id,
                    JobStatus::Error,
                    0,
                    JobStatus::Error.default_message(),
                    Some(e.to_string()),
                );
                self.tracker.expire(job_id, self.config.jobs.retention());
                return Err(e);
            }
        };
        // The working copy is authoritative from here on.
        staged.remove();

        let job = self.spawn_supervised(job_id, working, artifacts.clone());
        if fast_response {
            return Ok(VideoUploadResponse::new(job_id, &artifacts, "processing"));
        }
        job.await
            .map_err(|e| Error::Internal(format!("video job supervisor failed: {e}")))??;
        Ok(VideoUploadResponse::new(job_id, &artifacts, "completed"))
    }

    /// Current progress of a video job.
    pub fn get_progress(&self, job_id: JobId) -> Result<ProgressView> {
        self.tracker
            .get(job_id)
            .map(ProgressView::from)
            .ok_or_else(|| Error::not_found("job", job_id))
    }

    /// Stop accepting detached jobs and wait for running ones to finish.
    pub async fn shutdown(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            tracing::info!("Waiting for {} video job(s) to finish", self.tasks.len());
        }
        self.tasks.wait().await;
    }

    /// Run the pipeline on its own task, supervised on the orchestrator's
    /// tracker so a panic still ends the job in `error`.
    ///
    /// The returned handle yields the pipeline's outcome. Dropping it
    /// detaches the job without stopping it.
    fn spawn_supervised(
        &self,
        job_id: JobId,
        working: WorkingCopy,
        artifacts: VideoArtifacts,
    ) -> JoinHandle<Result<()>> {
        let pipeline = self.pipeline.clone();
        let job_artifacts = artifacts.clone();
        let job = tokio::spawn(async move { pipeline.run(job_id, working, &job_artifacts).await });

        let tracker = self.tracker.clone();
        let retention = self.config.jobs.retention();
        self.tasks.spawn(async move {
            let e = match job.await {
                Ok(outcome) => return outcome,
                Err(e) => e,
            };
            let reason = if e.is_panic() {
                "video processing task panicked"
            } else {
                "video processing task was cancelled"
            };
            tracing::error!(job_id = %job_id, "{reason}: {e}");
            artifacts.remove_partial();
            tracker.update(
                job_id,
                JobStatus::Error,
                0,
                JobStatus::Error.default_message(),
                Some(reason.to_string()),
            );
            tracker.expire(job_id, retention);
            Err(Error::Internal(reason.to_string()))
        })
    }

    /// Reject missing files, unsupported MIME types and oversized uploads.
    async fn validate(&self, file: &UploadedFile, kind: MediaKind) -> Result<()> {
        let meta = match tokio::fs::metadata(&file.temp_path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                return Err(Error::Validation(format!(
                    "uploaded file '{}' is missing",
                    file.original_name
                )))
            }
        };

        if !kind.accepts(&file.declared_mime_type) {
            return Err(Error::UnsupportedMedia(format!(
                "'{}' is not accepted for {kind} uploads (accepted: {})",
                file.declared_mime_type,
                kind.accepted_mime_types().join(", ")
            )));
        }

        let limit = match kind {
            MediaKind::Avatar => self.config.avatar.max_file_bytes,
            MediaKind::Image | MediaKind::Video => self.config.uploads.max_file_bytes,
        };
        let size = meta.len().max(file.size);
        if size > limit {
            return Err(Error::TooLarge { size, limit });
        }

        Ok(())
    }
}
