//! Audio scraper backend - turns video URLs into downloadable audio files
//!
//! Accepts a video URL over HTTP, shells out to yt-dlp and ffmpeg to
//! produce an MP3, serves it under /audio/ for a limited time, and deletes
//! it once its lifetime elapses.

mod api;
mod app;
mod config;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::services::{AudioService, CleanupConfig, CleanupService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audioscraper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting audioscraper backend");

    tokio::fs::create_dir_all(&config.output_path)
        .await
        .with_context(|| format!("Failed to create output directory '{}'", config.output_path))?;

    let audio = Arc::new(AudioService::new(&config));
    if !audio.is_available().await {
        tracing::warn!("yt-dlp or ffmpeg not found - extraction requests will fail");
    }

    let cleanup = Arc::new(CleanupService::new(CleanupConfig {
        file_ttl: config.file_ttl,
        sweep_interval: config.cleanup_interval,
    }));
    cleanup.start();

    let state = AppState {
        config: config.clone(),
        audio,
        cleanup: cleanup.clone(),
    };
    let app = app::build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "Audio files are deleted {} after creation; see /status",
        config.file_lifetime_label()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully");
    cleanup.stop();

    Ok(())
}

/// Resolves when SIGINT or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
