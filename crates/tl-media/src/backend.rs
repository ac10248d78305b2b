//! The encoding backend seam used by the video pipeline.
//!
//! [`VideoBackend`] isolates every call into the encoder so the pipeline only
//! sees durations, finished files and a progress sink. [`FfmpegBackend`] is
//! the production implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tl_core::config::VideoConfig;

use crate::actions;
use crate::probe;
use crate::tools::ToolRegistry;

/// Operations the video pipeline needs from an encoder.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Source duration in seconds.
    async fn probe_duration(&self, input: &Path) -> tl_core::Result<f64>;

    /// Write one still frame taken at `at_secs`, at most `width` wide.
    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        at_secs: f64,
        width: u32,
    ) -> tl_core::Result<()>;

    /// Re-encode `input` into `output`.
    ///
    /// `progress` receives encoder completion as a percentage in
    /// `0.0..=100.0`; it is called from the encoding task and must not block.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: f64,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> tl_core::Result<()>;
}

/// [`VideoBackend`] that shells out to ffmpeg and ffprobe.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    tools: Arc<ToolRegistry>,
    config: VideoConfig,
}

impl FfmpegBackend {
    pub fn new(tools: Arc<ToolRegistry>, config: VideoConfig) -> Self {
        Self { tools, config }
    }
}

#[async_trait]
impl VideoBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe_duration(&self, input: &Path) -> tl_core::Result<f64> {
        let probe = probe::probe_video(&self.tools, input, self.config.frame_timeout()).await?;
        tracing::debug!(
            "Probed {:?}: {:.3}s {}x{}",
            input,
            probe.duration_secs,
            probe.width.unwrap_or_default(),
            probe.height.unwrap_or_default()
        );
        Ok(probe.duration_secs)
    }

    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        at_secs: f64,
        width: u32,
    ) -> tl_core::Result<()> {
        actions::extract_frame(
            &self.tools,
            input,
            output,
            at_secs,
            width,
            self.config.frame_timeout(),
        )
        .await
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: f64,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> tl_core::Result<()> {
        actions::transcode_video(
            &self.tools,
            input,
            output,
            &self.config,
            duration_secs,
            |p| progress(p.percent),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_ffprobe_is_tool_error() {
        let backend = FfmpegBackend::new(Arc::new(ToolRegistry::default()), VideoConfig::default());
        let err = backend
            .probe_duration(Path::new("/tmp/whatever.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, tl_core::Error::Tool { .. }));
    }

    #[tokio::test]
    async fn missing_ffmpeg_fails_transcode() {
        let backend = FfmpegBackend::new(Arc::new(ToolRegistry::default()), VideoConfig::default());
        let sink = |_: f64| {};
        let err = backend
            .transcode(Path::new("in.mp4"), Path::new("out.mp4"), 10.0, &sink)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));
    }
}
