//! Application state and HTTP router construction.
//!
//! Used by main to build the Axum app: API endpoints, static serving of
//! produced audio files, CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::services::{AudioService, CleanupService};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub audio: Arc<AudioService>,
    pub cleanup: Arc<CleanupService>,
}

/// Build the full Axum router. Returns Router<()> (state fully applied)
/// for use with axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    let audio_dir = state.config.output_path.clone();

    Router::new()
        .merge(api::health::router())
        .merge(api::status::router())
        .merge(api::audio::router())
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
