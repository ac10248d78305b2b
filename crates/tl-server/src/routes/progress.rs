//! Progress polling for fire-and-forget video jobs.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use tl_core::JobId;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::progress::ProgressView;
use crate::routes::reject;

/// GET /api/uploads/video-progress/{id}
///
/// Unknown and expired jobs are indistinguishable: both are 404.
pub async fn video_progress(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ProgressView>, AppError> {
    let job_id: JobId = id
        .parse()
        .map_err(|_| tl_core::Error::Validation(format!("invalid job id '{id}'")))
        .map_err(reject(&request_id))?;

    let view = ctx
        .orchestrator
        .get_progress(job_id)
        .map_err(reject(&request_id))?;
    Ok(Json(view))
}
