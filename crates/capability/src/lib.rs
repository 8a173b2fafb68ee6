//! Optional runtime capability resolution
//!
//! Each capability (video decoding, media probing, remote download,
//! speech-to-text) may or may not be present in a given deployment.
//! Resolution happens at first use and is cached per process; absence is a
//! typed [`ProcessingError::MissingCapability`], never a crash.

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::debug;
use videoseek_common::{ProcessingError, Result};

static FFMPEG: OnceCell<Option<PathBuf>> = OnceCell::new();
static FFPROBE: OnceCell<Option<PathBuf>> = OnceCell::new();
static YTDLP: OnceCell<Option<PathBuf>> = OnceCell::new();
static WHISPER_MODEL: OnceCell<Option<PathBuf>> = OnceCell::new();

/// Resolve the `ffmpeg` binary (decoding, audio extraction, silence detection).
///
/// # Errors
/// Returns a missing-capability error when the binary cannot be located.
pub fn ffmpeg() -> Result<PathBuf> {
    resolve_binary(
        &FFMPEG,
        "ffmpeg",
        "VIDEOSEEK_FFMPEG",
        "Install FFmpeg to decode video and extract audio.",
    )
}

/// Resolve the `ffprobe` binary (media metadata probing).
///
/// # Errors
/// Returns a missing-capability error when the binary cannot be located.
pub fn ffprobe() -> Result<PathBuf> {
    resolve_binary(
        &FFPROBE,
        "ffprobe",
        "VIDEOSEEK_FFPROBE",
        "Install FFmpeg (ffprobe) to probe video metadata.",
    )
}

/// Resolve the `yt-dlp` binary (remote video download).
///
/// # Errors
/// Returns a missing-capability error when the binary cannot be located.
pub fn ytdlp() -> Result<PathBuf> {
    resolve_binary(
        &YTDLP,
        "yt-dlp",
        "VIDEOSEEK_YTDLP",
        "Install yt-dlp to download videos from remote sources.",
    )
}

/// Resolve the Whisper model file (speech-to-text).
///
/// The model size is selected via `WHISPER_MODEL` (default `small`) and
/// looked up under `WHISPER_MODEL_DIR` (default `models/`) using the
/// `ggml-<size>.bin` naming convention.
///
/// # Errors
/// Returns a missing-capability error when the model file is absent.
pub fn whisper_model() -> Result<PathBuf> {
    let resolved = WHISPER_MODEL.get_or_init(|| {
        let size = std::env::var("WHISPER_MODEL").unwrap_or_else(|_| "small".to_string());
        let dir = std::env::var("WHISPER_MODEL_DIR").unwrap_or_else(|_| "models".to_string());
        let path = PathBuf::from(dir).join(format!("ggml-{size}.bin"));
        if path.is_file() {
            debug!("Resolved whisper model: {}", path.display());
            Some(path)
        } else {
            None
        }
    });
    resolved.clone().ok_or_else(|| {
        ProcessingError::missing_capability(
            "whisper",
            "Download a ggml Whisper model into WHISPER_MODEL_DIR to enable transcription.",
        )
    })
}

fn resolve_binary(
    cache: &OnceCell<Option<PathBuf>>,
    binary: &str,
    env_override: &str,
    hint: &str,
) -> Result<PathBuf> {
    let resolved = cache.get_or_init(|| locate_binary(binary, env_override));
    resolved
        .clone()
        .ok_or_else(|| ProcessingError::missing_capability(binary, hint))
}

fn locate_binary(binary: &str, env_override: &str) -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(env_override) {
        let path = PathBuf::from(explicit);
        if path.is_file() {
            debug!("Resolved {} from {}: {}", binary, env_override, path.display());
            return Some(path);
        }
        debug!(
            "{} points at {} which does not exist, falling back to PATH",
            env_override,
            path.display()
        );
    }
    let path_var = std::env::var_os("PATH")?;
    let found = search_dirs(binary, std::env::split_paths(&path_var));
    if let Some(ref path) = found {
        debug!("Resolved {} on PATH: {}", binary, path.display());
    }
    found
}

/// Search a sequence of directories for an executable file with the given name.
fn search_dirs(binary: &str, dirs: impl Iterator<Item = PathBuf>) -> Option<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(binary);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_search_dirs_finds_executable() {
        let dir = tempfile::tempdir().unwrap();
        let expected = make_executable(dir.path(), "fake-tool");
        let found = search_dirs("fake-tool", std::iter::once(dir.path().to_path_buf()));
        assert_eq!(found, Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_dirs_skips_non_executable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain-file"), "data").unwrap();
        let found = search_dirs("plain-file", std::iter::once(dir.path().to_path_buf()));
        assert_eq!(found, None);
    }

    #[test]
    fn test_search_dirs_empty_path() {
        assert_eq!(search_dirs("anything", std::iter::empty()), None);
    }
}
