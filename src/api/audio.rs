//! Audio extraction endpoint

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    /// Video URL to download and extract audio from
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    /// Public URL the produced file is served from
    pub audio_url: String,
    /// Sanitized video title
    pub video_title: String,
    /// File name under the output directory
    pub filename: String,
    /// How long the file stays available
    pub expires_in: String,
}

/// Download a video, extract its audio track, and register the result for
/// automatic deletion
async fn extract_audio(
    State(state): State<AppState>,
    Json(body): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, (StatusCode, String)> {
    if body.url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing 'url' field".to_string()));
    }

    info!(url = %body.url, "Extract request received");

    let scraped = state.audio.scrape(&body.url).await.map_err(|e| {
        error!(url = %body.url, error = %e, "Audio extraction failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to process audio: {e}"),
        )
    })?;

    state.cleanup.register(&scraped.path);

    Ok(Json(ExtractResponse {
        audio_url: format!("/audio/{}", scraped.filename),
        video_title: scraped.title,
        filename: scraped.filename,
        expires_in: state.config.file_lifetime_label(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/extract-audio", post(extract_audio))
}
