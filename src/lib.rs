pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::ReceiverConfig;
use crate::services::receiver::BackupReceiver;
use axum::{
    Json, Router,
    body::Body,
    http::{Request, Response},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};
use utoipa::OpenApi;

/// Extra room on top of `max_file_size` for multipart framing and text fields
pub const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024; // 10 MB

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::receive::receive_backup,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::receive::ReceiveBackupForm,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "backup", description = "Backup ingestion"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub receiver: Arc<BackupReceiver>,
    pub config: Arc<ReceiverConfig>,
}

impl AppState {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            receiver: Arc::new(BackupReceiver::new(&config)),
            config: Arc::new(config),
        }
    }
}

/// Span for one HTTP request, tagged with the id the request-id middleware
/// assigned so every log line of an upload carries it.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(api::middleware::request_id::X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/receive_backup",
            post(api::handlers::receive::receive_backup)
                .layer(axum::extract::DefaultBodyLimit::max(body_limit)),
        )
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(|response: &Response<Body>, latency: Duration, _span: &Span| {
                    info!("Finished in {:?} with status {}", latency, response.status());
                }),
        )
        // outermost, so the trace span already sees the id
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
