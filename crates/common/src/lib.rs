//! Common types and utilities for the video indexing pipeline
//!
//! Shared between the keyframe extractor, segmenter, transcription stage,
//! document builders and the search layer.

pub mod paths;
pub mod prompts;
pub mod text;
pub mod types;

use std::path::PathBuf;
use thiserror::Error;

/// Processing errors shared across pipeline stages
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Required capability '{name}' is not available. {hint}")]
    MissingCapability { name: String, hint: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ProcessingError {
    /// Build a missing-capability error with the standard install hint wording.
    #[must_use]
    pub fn missing_capability(name: &str, hint: &str) -> Self {
        Self::MissingCapability {
            name: name.to_string(),
            hint: hint.to_string(),
        }
    }

    /// Build a not-found error for a filesystem path.
    #[must_use]
    pub fn path_not_found(path: &std::path::Path) -> Self {
        Self::NotFound(path.display().to_string())
    }

    /// True when the error is a missing optional runtime capability.
    #[must_use]
    pub fn is_missing_capability(&self) -> bool {
        matches!(self, Self::MissingCapability { .. })
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Remove a file if it exists, swallowing the error.
pub fn safe_unlink(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Remove a directory tree if it exists, swallowing the error.
pub fn safe_rmtree(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Create the directory if it does not exist and return the path.
///
/// # Errors
/// Returns an IO error when the directory cannot be created.
pub fn ensure_directory(path: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

pub use prompts::{default_prompt, PromptLibrary, PromptPurpose};
pub use text::chunk_text;
pub use types::{
    CategoryId, CategoryRef, Keyframe, TimeInterval, VideoId, VideoRecord, VideoSegment,
    VideoSource, VideoStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_capability_message() {
        let err = ProcessingError::missing_capability("ffmpeg", "Install FFmpeg to decode video.");
        assert_eq!(
            err.to_string(),
            "Required capability 'ffmpeg' is not available. Install FFmpeg to decode video."
        );
        assert!(err.is_missing_capability());
    }

    #[test]
    fn test_safe_unlink_missing_file_is_noop() {
        safe_unlink(std::path::Path::new("/nonexistent/definitely-not-here.wav"));
    }
}
