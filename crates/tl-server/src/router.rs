//! Axum router construction.
//!
//! Builds the application router with the upload routes, progress polling,
//! diagnostics, middleware layers and static serving of produced artifacts.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use tl_core::config::UploadsConfig;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Slack on top of the file payload for multipart framing and other fields.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Largest request body accepted on the upload routes: a full batch of
/// images plus multipart framing.
pub(crate) fn request_body_limit(uploads: &UploadsConfig) -> u64 {
    uploads
        .max_file_bytes
        .saturating_mul(uploads.max_images_per_request.max(1) as u64)
        .saturating_add(MULTIPART_OVERHEAD)
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(request_body_limit(&ctx.config.uploads)).unwrap_or(usize::MAX);

    let upload_routes = Router::new()
        .route("/images", post(routes::uploads::upload_images))
        .route("/avatar", post(routes::uploads::upload_avatar))
        .route("/video", post(routes::uploads::upload_video))
        .route(
            "/video-progress/{id}",
            get(routes::progress::video_progress),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let api = Router::new()
        .nest("/uploads", upload_routes)
        .route("/admin/tools", get(routes::admin::tools))
        .route("/admin/jobs", get(routes::admin::jobs));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api);

    // Only finished artifacts are public; the staging area is not.
    let layout = ctx.orchestrator.layout();
    for (name, dir) in [
        ("images", &layout.images),
        ("avatars", &layout.avatars),
        ("videos", &layout.videos),
        ("covers", &layout.covers),
        ("thumbnails", &layout.thumbnails),
    ] {
        app = app.nest_service(&format!("/uploads/{name}"), ServeDir::new(dir));
    }

    app.layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
