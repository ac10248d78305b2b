//! Upload route handlers.
//!
//! Multipart files are streamed chunk by chunk into the staging directory
//! under a random `<uuid-simple><ext>` name, then handed to the
//! [`UploadOrchestrator`](crate::orchestrator::UploadOrchestrator).

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use tl_core::{staged_basename, Error};
use tl_media::remove_best_effort;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::orchestrator::UploadedFile;
use crate::router::request_body_limit;
use crate::routes::reject;

/// Response for image uploads: one URL per file, in upload order.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub files: Vec<String>,
}

/// Response for avatar uploads.
#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub url: String,
}

/// Query parameters for video uploads.
#[derive(Debug, Deserialize)]
pub struct VideoUploadParams {
    /// Return right after the job is registered. Defaults to `true`.
    #[serde(default = "default_fast")]
    pub fast: bool,
}

fn default_fast() -> bool {
    true
}

/// POST /api/uploads/images
pub async fn upload_images(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Json<ImagesResponse>, AppError> {
    let limits = ReceiveLimits {
        file_bytes: ctx.config.uploads.max_file_bytes,
        files: ctx.config.uploads.max_images_per_request,
        body_bytes: request_body_limit(&ctx.config.uploads),
    };
    let files = receive_files(&mut multipart, "images", &ctx.orchestrator.layout().temp, limits)
        .await
    .map_err(reject(&request_id))?;

    let results = futures::future::join_all(
        files
            .into_iter()
            .map(|file| ctx.orchestrator.start_image_processing(file)),
    )
    .await;

    let names = results
        .into_iter()
        .collect::<tl_core::Result<Vec<_>>>()
        .map_err(reject(&request_id))?;

    Ok(Json(ImagesResponse {
        files: names.iter().map(|n| format!("images/{n}")).collect(),
    }))
}

/// POST /api/uploads/avatar
pub async fn upload_avatar(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, AppError> {
    let file = receive_single(&ctx, &mut multipart, "avatar", ctx.config.avatar.max_file_bytes)
        .await
        .map_err(reject(&request_id))?;
    let name = ctx
        .orchestrator
        .start_avatar_processing(file)
        .await
        .map_err(reject(&request_id))?;

    Ok(Json(AvatarResponse {
        url: format!("avatars/{name}"),
    }))
}

/// POST /api/uploads/video
///
/// 202 while the job runs in the background, 201 once it has completed.
pub async fn upload_video(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<VideoUploadParams>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let file = receive_single(&ctx, &mut multipart, "video", ctx.config.uploads.max_file_bytes)
        .await
        .map_err(reject(&request_id))?;
    let response = ctx
        .orchestrator
        .start_video_processing(file, params.fast)
        .await
        .map_err(reject(&request_id))?;

    let status = if response.is_processing() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

/// Size and count limits applied while a multipart body is received.
#[derive(Debug, Clone, Copy)]
struct ReceiveLimits {
    /// Per-file limit for the route; enforced while streaming.
    file_bytes: u64,
    files: usize,
    /// Request body limit installed by the router.
    body_bytes: u64,
}

async fn receive_single(
    ctx: &AppContext,
    multipart: &mut Multipart,
    field_name: &str,
    max_file_bytes: u64,
) -> tl_core::Result<UploadedFile> {
    let limits = ReceiveLimits {
        file_bytes: max_file_bytes,
        files: 1,
        body_bytes: request_body_limit(&ctx.config.uploads),
    };
    let mut files =
        receive_files(multipart, field_name, &ctx.orchestrator.layout().temp, limits).await?;
    files
        .pop()
        .ok_or_else(|| Error::Internal("no file received".into()))
}

/// Stream every part named `field_name` into `temp_dir`.
///
/// Parts with other names are skipped. On any failure the files received so
/// far are removed before the error is returned.
async fn receive_files(
    multipart: &mut Multipart,
    field_name: &str,
    temp_dir: &Path,
    limits: ReceiveLimits,
) -> tl_core::Result<Vec<UploadedFile>> {
    let mut files: Vec<UploadedFile> = Vec::new();
    let result = collect_fields(multipart, field_name, temp_dir, limits, &mut files).await;

    match result {
        Ok(()) if files.is_empty() => Err(Error::Validation(format!(
            "no file uploaded in field '{field_name}'"
        ))),
        Ok(()) => Ok(files),
        Err(e) => {
            for file in &files {
                remove_best_effort(&file.temp_path, "received upload");
            }
            Err(e)
        }
    }
}

async fn collect_fields(
    multipart: &mut Multipart,
    field_name: &str,
    temp_dir: &Path,
    limits: ReceiveLimits,
    files: &mut Vec<UploadedFile>,
) -> tl_core::Result<()> {
    let mut received: u64 = 0;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(()),
            Err(e) => return Err(multipart_error(e, received, limits.body_bytes)),
        };
        if field.name() != Some(field_name) {
            tracing::debug!(field = ?field.name(), "Skipping unexpected multipart field");
            continue;
        }
        if files.len() >= limits.files {
            return Err(Error::Validation(format!(
                "at most {} file(s) accepted in field '{field_name}'",
                limits.files
            )));
        }
        let file = stream_field(field, temp_dir, limits, received).await?;
        received += file.size;
        files.push(file);
    }
}

async fn stream_field(
    mut field: Field<'_>,
    temp_dir: &Path,
    limits: ReceiveLimits,
    received: u64,
) -> tl_core::Result<UploadedFile> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    let declared_mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let temp_path = staged_path(temp_dir, &original_name);

    let mut out = tokio::fs::File::create(&temp_path).await?;
    let written = copy_chunks(&mut field, &mut out, limits, received).await;
    drop(out);

    let size = match written {
        Ok(size) => size,
        Err(e) => {
            remove_best_effort(&temp_path, "partial upload");
            return Err(e);
        }
    };

    tracing::debug!(
        name = %original_name,
        mime = %declared_mime_type,
        size = size,
        path = %temp_path.display(),
        "Upload staged"
    );
    Ok(UploadedFile {
        temp_path,
        declared_mime_type,
        original_name,
        size,
    })
}

async fn copy_chunks(
    field: &mut Field<'_>,
    out: &mut tokio::fs::File,
    limits: ReceiveLimits,
    received: u64,
) -> tl_core::Result<u64> {
    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(move |e| multipart_error(e, received + size, limits.body_bytes))?
    {
        size += chunk.len() as u64;
        if size > limits.file_bytes {
            return Err(Error::TooLarge {
                size,
                limit: limits.file_bytes,
            });
        }
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(size)
}

/// `<temp_dir>/<uuid-simple><ext>`, keeping only a sane extension from the
/// client's file name.
fn staged_path(temp_dir: &Path, original_name: &str) -> PathBuf {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    temp_dir.join(format!("{}{ext}", staged_basename()))
}

/// A body cut off by the router's limit is a 413; `received` counts the
/// file bytes staged before that happened.
fn multipart_error(e: MultipartError, received: u64, body_limit: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::TooLarge {
            size: received,
            limit: body_limit,
        }
    } else {
        Error::Validation(format!("malformed multipart body: {}", e.body_text()))
    }
}
