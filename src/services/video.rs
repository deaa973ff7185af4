//! Video download adapter: drives an external `yt-dlp` process.
//!
//! A URL is downloaded as-is; anything else is treated as search text and
//! resolved through `ytsearch1:`. The downloader prints the final title after
//! the file is moved into place, which becomes the confirmation text.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::DownloadConfig;

use super::{DummyMode, Outcome, ServiceError, unknown_provider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub title: String,
}

pub enum VideoDownloader {
    YtDlp { program: String, output_dir: PathBuf },
    Dummy(DummyMode),
}

impl VideoDownloader {
    pub fn build(config: &DownloadConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "yt-dlp" => Ok(VideoDownloader::YtDlp {
                program: config.program.clone(),
                output_dir: config.output_dir.clone(),
            }),
            "dummy" => Ok(VideoDownloader::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("download", other)),
        }
    }

    pub async fn download(&self, query: &str) -> Outcome<Downloaded> {
        let query = query.trim();
        if query.is_empty() {
            return Outcome::Failed(ServiceError::Unavailable(
                "no video URL or search text given".into(),
            ));
        }
        match self {
            VideoDownloader::YtDlp { program, output_dir } => {
                run_yt_dlp(program, output_dir, query).await.into()
            }
            VideoDownloader::Dummy(mode) => mode.outcome(|| Downloaded {
                title: format!("Dummy video for {query}"),
            }),
        }
    }
}

/// `yt-dlp` target for a user argument.
pub(crate) fn download_target(query: &str) -> String {
    if looks_like_url(query) {
        query.to_string()
    } else {
        format!("ytsearch1:{query}")
    }
}

fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("www.")
        || s.starts_with("youtube.com/")
        || s.starts_with("youtu.be/")
}

async fn run_yt_dlp(
    program: &str,
    output_dir: &Path,
    query: &str,
) -> Result<Option<Downloaded>, ServiceError> {
    let target = download_target(query);
    debug!(%program, %target, dir = %output_dir.display(), "download: spawning downloader");

    let output = Command::new(program)
        .arg("--no-playlist")
        .arg("--no-progress")
        .arg("--no-simulate")
        .args(["--print", "after_move:title"])
        .arg("--paths")
        .arg(output_dir)
        .args(["--output", "%(title)s.%(ext)s"])
        .arg(&target)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ServiceError::Unavailable(format!(
                "'{program}' is not installed or not on PATH"
            )),
            _ => ServiceError::Transport(format!("failed to start '{program}': {e}")),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServiceError::Transport(format!(
            "{program} exited with {}: {}",
            output.status,
            last_line(&stderr).unwrap_or("no error output")
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let title = last_line(&stdout).map(str::to_string);
    if let Some(title) = &title {
        info!(%title, "download: finished");
    }
    Ok(title.map(|title| Downloaded { title }))
}

fn last_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
