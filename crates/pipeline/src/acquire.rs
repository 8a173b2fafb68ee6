//! Video acquisition
//!
//! Resolves an uploaded video to its local path or fetches a remote video
//! through the download capability into the scratch download directory.
//! Downloaded files are registered for mandatory cleanup after the run.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use videoseek_common::{ProcessingError, Result, VideoRecord, VideoSource};

use crate::scratch::ScratchGuard;

/// Result of resolving a video to a local file
#[derive(Debug)]
pub struct AcquiredVideo {
    pub path: PathBuf,
    /// Description supplied by the remote source, if any
    pub remote_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteInfo {
    id: String,
    #[serde(default)]
    description: Option<String>,
}

/// Resolve the video to a local file, downloading when remotely sourced.
///
/// # Errors
/// Returns a not-found error for an absent uploaded file, a
/// missing-capability error when the downloader is unavailable, and a
/// download error when fetching fails.
pub fn acquire_video(
    video: &VideoRecord,
    media_root: &Path,
    download_root: &Path,
    scratch: &mut ScratchGuard,
) -> Result<AcquiredVideo> {
    match &video.source {
        VideoSource::Upload { path } => {
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                media_root.join(path)
            };
            if !resolved.is_file() {
                return Err(ProcessingError::path_not_found(&resolved));
            }
            debug!("Resolved uploaded video at {}", resolved.display());
            Ok(AcquiredVideo {
                path: resolved,
                remote_description: None,
            })
        }
        VideoSource::RemoteUrl { url } => {
            if url.is_empty() {
                return Err(ProcessingError::Validation(
                    "remote video has no source URL".to_string(),
                ));
            }
            let ytdlp = videoseek_capability::ytdlp()?;
            std::fs::create_dir_all(download_root)?;

            let info = fetch_remote_info(&ytdlp, url)?;
            let target = download_root.join(format!("video_{}_{}.mp4", video.id, info.id));
            download_remote(&ytdlp, url, &target)?;
            scratch.register_file(target.clone());

            info!("Downloaded remote video to {}", target.display());
            Ok(AcquiredVideo {
                path: target,
                remote_description: info.description.filter(|d| !d.is_empty()),
            })
        }
    }
}

/// Fetch remote metadata without downloading.
fn fetch_remote_info(ytdlp: &Path, url: &str) -> Result<RemoteInfo> {
    let output = Command::new(ytdlp)
        .arg("--dump-json")
        .arg("--no-warnings")
        .arg("--no-playlist")
        .arg(url)
        .output()
        .map_err(|e| ProcessingError::Download(format!("failed to execute yt-dlp: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::Download(format!(
            "metadata fetch failed for {url}: {}",
            stderr.trim()
        )));
    }
    parse_remote_info(&String::from_utf8_lossy(&output.stdout))
}

fn parse_remote_info(raw: &str) -> Result<RemoteInfo> {
    serde_json::from_str(raw.trim())
        .map_err(|e| ProcessingError::Download(format!("unparseable yt-dlp metadata: {e}")))
}

fn download_remote(ytdlp: &Path, url: &str, target: &Path) -> Result<()> {
    let output = Command::new(ytdlp)
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--no-playlist")
        .arg("-f")
        .arg("bv*+ba/b")
        .arg("--merge-output-format")
        .arg("mp4")
        .arg("-o")
        .arg(target)
        .arg(url)
        .output()
        .map_err(|e| ProcessingError::Download(format!("failed to execute yt-dlp: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::Download(format!(
            "download failed for {url}: {}",
            stderr.trim()
        )));
    }
    if !target.is_file() {
        return Err(ProcessingError::Download(format!(
            "downloader reported success but {} is missing",
            target.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use videoseek_common::VideoStatus;

    fn upload_record(path: &Path) -> VideoRecord {
        VideoRecord {
            id: 1,
            title: "Upload".into(),
            description: String::new(),
            keywords: Vec::new(),
            category: None,
            source: VideoSource::Upload {
                path: path.to_path_buf(),
            },
            status: VideoStatus::Pending,
            intervals: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_upload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let record = upload_record(Path::new("videos/1/missing.mp4"));
        let mut scratch = ScratchGuard::new();
        let err =
            acquire_video(&record, dir.path(), dir.path(), &mut scratch).unwrap_err();
        assert!(matches!(err, ProcessingError::NotFound(_)));
    }

    #[test]
    fn test_relative_upload_resolves_against_media_root() {
        let dir = tempfile::tempdir().unwrap();
        let stored = dir.path().join("videos/1/file.mp4");
        std::fs::create_dir_all(stored.parent().unwrap()).unwrap();
        std::fs::write(&stored, "mp4").unwrap();

        let record = upload_record(Path::new("videos/1/file.mp4"));
        let mut scratch = ScratchGuard::new();
        let acquired =
            acquire_video(&record, dir.path(), dir.path(), &mut scratch).unwrap();
        assert_eq!(acquired.path, stored);
        assert!(acquired.remote_description.is_none());
    }

    #[test]
    fn test_parse_remote_info() {
        let info = parse_remote_info(
            r#"{"id": "abc123", "title": "Clip", "description": "A short clip."}"#,
        )
        .unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.description.as_deref(), Some("A short clip."));
    }

    #[test]
    fn test_parse_remote_info_without_description() {
        let info = parse_remote_info(r#"{"id": "abc123"}"#).unwrap();
        assert!(info.description.is_none());
    }

    #[test]
    fn test_parse_remote_info_garbage() {
        assert!(parse_remote_info("not json").is_err());
    }
}
