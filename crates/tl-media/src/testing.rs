//! A scripted [`VideoBackend`] for tests that must not depend on ffmpeg.
//!
//! Enabled with the `test-util` feature.
//!
//! - Inputs whose bytes start with `corrupt` fail to probe.
//! - Frames are written as small placeholder files.
//! - The encode walks through a fixed list of percentages, sleeping
//!   `step_delay` between them, then writes the output.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::VideoBackend;

/// Marker prefix that makes [`ScriptedBackend::probe_duration`] fail.
pub const CORRUPT_MARKER: &[u8] = b"corrupt";

const STEPS: &[f64] = &[0.0, 12.5, 25.0, 50.0, 75.0, 99.0, 100.0];

/// Deterministic stand-in for an encoder.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    duration_secs: f64,
    step_delay: Duration,
    fail_transcode: bool,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    transcodes: Arc<AtomicUsize>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            step_delay: Duration::ZERO,
            fail_transcode: false,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            transcodes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep between progress steps so callers can observe a running job.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Make the encode fail after writing part of its output.
    pub fn failing_transcode(mut self) -> Self {
        self.fail_transcode = true;
        self
    }

    /// Highest number of encodes that ran at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of encodes started.
    pub fn transcode_count(&self) -> usize {
        self.transcodes.load(Ordering::SeqCst)
    }
}

impl ScriptedBackend {
    async fn run_steps(
        &self,
        output: &Path,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> tl_core::Result<()> {
        tokio::fs::write(output, b"partial").await?;
        for &step in STEPS {
            if self.fail_transcode && step >= 50.0 {
                return Err(tl_core::Error::tool("ffmpeg", "encoder crashed"));
            }
            progress(step);
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
        }
        tokio::fs::write(output, b"transcoded video").await?;
        Ok(())
    }
}

#[async_trait]
impl VideoBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn probe_duration(&self, input: &Path) -> tl_core::Result<f64> {
        let bytes = tokio::fs::read(input).await?;
        if bytes.starts_with(CORRUPT_MARKER) {
            return Err(tl_core::Error::tool(
                "ffprobe",
                "Invalid data found when processing input",
            ));
        }
        Ok(self.duration_secs)
    }

    async fn extract_frame(
        &self,
        _input: &Path,
        output: &Path,
        at_secs: f64,
        width: u32,
    ) -> tl_core::Result<()> {
        tokio::fs::write(output, format!("frame@{at_secs:.3}w{width}")).await?;
        Ok(())
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _duration_secs: f64,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> tl_core::Result<()> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.run_steps(output, progress).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
