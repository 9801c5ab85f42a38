//! Single-file upload server.
//!
//! `POST /upload` accepts a multipart form with a `file` field and writes the
//! bytes to the uploads directory as `<epoch-millis>-<original name>`.
//! Everything else is served from a static public directory.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;
use services::storage_service::UploadStore;
use std::{path::Path, sync::Arc};
use tower_http::trace::TraceLayer;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UploadStore>,
}

impl AppState {
    pub fn new(store: impl UploadStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Assemble the full application router.
pub fn build_app(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    routes::routes::routes(public_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
