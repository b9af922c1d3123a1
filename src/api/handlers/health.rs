use crate::AppState;
use crate::models::StorageUsage;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub scanner: String,
    pub storage: Option<StorageUsage>,
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
    let scanner_status = if !state.config.enable_virus_scan {
        "disabled"
    } else if state.scan_gate.health_check().await {
        "connected"
    } else {
        "unreachable"
    };

    let storage = match state.quota.usage().await {
        Ok(usage) => Some(usage),
        Err(e) => {
            tracing::error!("Failed to read storage usage: {}", e);
            None
        }
    };

    let status = if storage.is_some() && scanner_status != "unreachable" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        scanner: scanner_status.to_string(),
        storage,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
