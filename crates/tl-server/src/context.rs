//! Application context shared by all request handlers via Axum state.

use std::sync::Arc;

use tl_core::config::Config;
use tl_media::{ToolRegistry, VideoBackend};

use crate::orchestrator::UploadOrchestrator;
use crate::progress::ProgressTracker;

/// Cheaply cloneable: every field is an `Arc` or wraps one.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    /// In-memory progress for video jobs.
    pub tracker: ProgressTracker,
    /// Upload entry point.
    pub orchestrator: UploadOrchestrator,
}

impl AppContext {
    /// Wire the tracker and orchestrator around `backend`.
    pub fn new(config: Config, tools: Arc<ToolRegistry>, backend: Arc<dyn VideoBackend>) -> Self {
        let config = Arc::new(config);
        let tracker = ProgressTracker::new(config.jobs.stale_after());
        let orchestrator = UploadOrchestrator::new(config.clone(), backend, tracker.clone());
        Self {
            config,
            tools,
            tracker,
            orchestrator,
        }
    }
}
