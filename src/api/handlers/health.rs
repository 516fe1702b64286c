use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub upload_folder: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let folder_status = match tokio::fs::metadata(state.receiver.upload_folder()).await {
        Ok(meta) if meta.is_dir() => "present",
        _ => "missing",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        upload_folder: folder_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
