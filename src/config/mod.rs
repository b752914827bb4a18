//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,

    /// Directory produced audio files are written to and served from
    pub output_path: String,

    /// yt-dlp executable (name on PATH or absolute path)
    pub ytdlp_path: String,

    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg_path: String,

    /// How long a produced file lives before the cleanup sweep deletes it
    pub file_ttl: Duration,

    /// How often the cleanup sweep runs
    pub cleanup_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            output_path: env::var("OUTPUT_PATH").unwrap_or_else(|_| "./output".to_string()),

            ytdlp_path: env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),

            file_ttl: Duration::from_secs(
                env::var("FILE_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("Invalid FILE_TTL_SECS")?,
            ),

            cleanup_interval: Duration::from_secs(
                env::var("CLEANUP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("Invalid CLEANUP_INTERVAL_SECS")?,
            ),
        })
    }

    /// File lifetime as reported by /status and /extract-audio ("1 hour"
    /// at defaults)
    pub fn file_lifetime_label(&self) -> String {
        format_duration(self.file_ttl)
    }

    /// Sweep cadence as reported by /status ("5 minutes" at defaults)
    pub fn cleanup_interval_label(&self) -> String {
        format_duration(self.cleanup_interval)
    }
}

/// Render a duration the way the status payload advertises it.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        let hours = secs / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{secs} seconds")
    }
}
