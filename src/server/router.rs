use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::api::api_router;
use crate::storage::FileStorage;
use crate::store::Store;

/// Room for multipart boundaries and the text fields next to the PDF.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub storage: FileStorage,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, data_dir: &Path, max_upload_bytes: usize) -> Self {
        Self {
            store,
            storage: FileStorage::new(data_dir),
            max_upload_bytes,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health))
        .nest("/api/admin", admin_router())
        .nest("/api", api_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
