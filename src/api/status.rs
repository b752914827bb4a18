//! Cleanup status endpoint for monitoring

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    /// Current server time, RFC 3339
    pub timestamp: String,
    /// Number of files awaiting expiry
    pub registered_files: usize,
    /// Paths awaiting expiry
    pub files: Vec<String>,
    /// Sweep cadence ("5 minutes" at defaults)
    pub cleanup_interval: String,
    /// File lifetime ("1 hour" at defaults)
    pub file_lifetime: String,
}

/// Report the registered files alongside the lifecycle settings
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let files: Vec<String> = state
        .cleanup
        .list()
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    Json(StatusResponse {
        status: "running",
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        registered_files: state.cleanup.count(),
        files,
        cleanup_interval: state.config.cleanup_interval_label(),
        file_lifetime: state.config.file_lifetime_label(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}
