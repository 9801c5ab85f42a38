//! Defines the HTTP surface.
//!
//! ## Structure
//! - `POST /upload`  — multipart upload, field `file`
//! - `GET  /healthz` — liveness
//! - `GET  /readyz`  — readiness (storage probe)
//! - anything else   — static files from the public directory
//!
//! Any method a path does not support answers 404, not 405.

use crate::{
    AppState,
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::upload_file,
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{MethodRouter, get, get_service, post},
};
use std::path::Path;
use tower_http::services::ServeDir;

/// Build the router carrying `AppState`.
///
/// The upload route has no body limit. Unmatched GET/HEAD requests fall
/// through to `ServeDir`, which answers 404 for missing files.
pub fn routes(public_dir: impl AsRef<Path>) -> Router<AppState> {
    let static_files: MethodRouter =
        get_service(ServeDir::new(public_dir)).fallback(not_found);

    Router::new()
        .route("/healthz", get(healthz).fallback(not_found))
        .route("/readyz", get(readyz).fallback(not_found))
        .route(
            "/upload",
            post(upload_file)
                .fallback(not_found)
                .layer(DefaultBodyLimit::disable()),
        )
        .fallback_service(static_files)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
