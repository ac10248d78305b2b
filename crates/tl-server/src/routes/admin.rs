//! Diagnostics route handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;
use crate::progress::ProcessingJob;

/// GET /api/admin/tools
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<tl_media::ToolInfo>> {
    Json(ctx.tools.check_all())
}

/// Snapshot of the progress table.
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub total: usize,
    pub running: usize,
    pub in_flight: usize,
    pub free_slots: usize,
    pub jobs: Vec<ProcessingJob>,
}

/// GET /api/admin/jobs
pub async fn jobs(State(ctx): State<AppContext>) -> Json<JobsResponse> {
    let jobs = ctx.tracker.snapshot();
    let running = jobs.iter().filter(|j| !j.status.is_terminal()).count();
    Json(JobsResponse {
        total: jobs.len(),
        running,
        in_flight: ctx.orchestrator.in_flight(),
        free_slots: ctx.orchestrator.free_slots(),
        jobs,
    })
}
