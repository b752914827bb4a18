//! Video download and audio extraction pipeline
//!
//! Shells out to yt-dlp (title lookup, download) and ffmpeg (audio
//! extraction) via the command line. This is more reliable than library
//! bindings: both tools are stable, ubiquitous, and easy to swap for
//! patched builds through configuration.
//!
//! The pipeline is opaque to the rest of the system: it either produces an
//! MP3 in the output directory or fails with the tool's own diagnostics.
//! It never retries.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;

/// Longest filename stem derived from a video title.
const MAX_TITLE_CHARS: usize = 100;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Failure of an external tool invocation.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed (exit code {code}): {stderr}")]
    Tool {
        tool: &'static str,
        code: String,
        stderr: String,
    },
}

/// A successfully produced audio file.
#[derive(Debug, Clone)]
pub struct ScrapedAudio {
    /// Where the file was written.
    pub path: PathBuf,
    /// File name under the output directory (`<title>.mp3`).
    pub filename: String,
    /// Sanitized video title the name was derived from.
    pub title: String,
}

/// Downloads videos and extracts their audio tracks into the output
/// directory.
pub struct AudioService {
    ytdlp_path: String,
    ffmpeg_path: String,
    output_dir: PathBuf,
}

impl AudioService {
    pub fn new(config: &Config) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            output_dir: PathBuf::from(&config.output_path),
        }
    }

    /// Check that both external tools can be executed.
    pub async fn is_available(&self) -> bool {
        let probe = |program: &str, flag: &'static str| {
            let mut cmd = Command::new(program);
            cmd.arg(flag).stdout(Stdio::null()).stderr(Stdio::null());
            cmd
        };

        let ytdlp = probe(&self.ytdlp_path, "--version")
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);
        let ffmpeg = probe(&self.ffmpeg_path, "-version")
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);

        ytdlp && ffmpeg
    }

    /// Download the video behind `url` and extract its audio track.
    ///
    /// The produced file is named after the sanitized video title. The
    /// intermediate video download lives in the output directory under a
    /// per-request name and is removed whether extraction succeeds or not.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedAudio, AudioError> {
        let mut title = self.video_title(url).await?;
        if title.is_empty() {
            title = format!("audio-{}", Uuid::new_v4());
        }

        let temp_video = self.output_dir.join(format!("dl-{}.mp4", Uuid::new_v4()));
        self.download_video(url, &temp_video).await?;

        let filename = format!("{title}.mp3");
        let audio_path = self.output_dir.join(&filename);
        let extracted = self.extract_audio(&temp_video, &audio_path).await;

        if let Err(e) = tokio::fs::remove_file(&temp_video).await {
            debug!(path = %temp_video.display(), error = %e, "Failed to remove temporary video");
        }
        extracted?;

        info!(url, path = %audio_path.display(), "Audio extraction complete");
        Ok(ScrapedAudio {
            path: audio_path,
            filename,
            title,
        })
    }

    /// Resolve the video title, sanitized for use as a filename stem.
    async fn video_title(&self, url: &str) -> Result<String, AudioError> {
        let mut cmd = Command::new(&self.ytdlp_path);
        cmd.args(["--get-title", "--no-playlist"]).arg(url);
        let output = run_tool("yt-dlp", &mut cmd).await?;

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(sanitize_title(raw.trim()))
    }

    async fn download_video(&self, url: &str, output: &Path) -> Result<(), AudioError> {
        debug!(url, output = %output.display(), "Downloading video");
        let mut cmd = Command::new(&self.ytdlp_path);
        cmd.arg("-o")
            .arg(output)
            .args(["-f", "bestaudio+bestvideo"])
            .arg(url);
        run_tool("yt-dlp", &mut cmd).await?;
        Ok(())
    }

    async fn extract_audio(&self, video: &Path, audio: &Path) -> Result<(), AudioError> {
        debug!(video = %video.display(), audio = %audio.display(), "Extracting audio track");
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-vn", "-acodec", "libmp3lame", "-ab", "192k"])
            .arg(audio);
        run_tool("ffmpeg", &mut cmd).await?;
        Ok(())
    }
}

/// Run a tool to completion, capturing output; non-zero exit becomes an
/// [AudioError::Tool] carrying the exit code and trimmed stderr.
async fn run_tool(
    tool: &'static str,
    cmd: &mut Command,
) -> Result<std::process::Output, AudioError> {
    let output = cmd
        .output()
        .await
        .map_err(|source| AudioError::Spawn { tool, source })?;

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(AudioError::Tool {
            tool,
            code,
            stderr: if stderr.is_empty() {
                "no error output".to_string()
            } else {
                stderr
            },
        });
    }

    Ok(output)
}

/// Make a video title safe for use as a filename stem: unsafe characters
/// become `_`, whitespace runs collapse to `_`, and the result is trimmed
/// and capped.
pub fn sanitize_title(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw.trim(), "_");
    let safe = sanitize_filename::sanitize_with_options(
        collapsed.as_ref(),
        sanitize_filename::Options {
            windows: true,
            truncate: true,
            replacement: "_",
        },
    );
    safe.trim_matches('_').chars().take(MAX_TITLE_CHARS).collect()
}
