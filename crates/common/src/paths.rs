//! Filename and media-path helpers

use std::path::{Path, PathBuf};

use crate::types::VideoId;

/// Convert a timestamp in seconds into a lexically sortable filename.
///
/// Millisecond precision, zero-padded so lexical order matches time order.
#[must_use]
pub fn timestamp_to_filename(timestamp: f64) -> String {
    let ms = (timestamp * 1000.0).floor().max(0.0) as u64;
    format!("frame_{ms:08}.jpg")
}

/// Simplified slugify suitable for directory names.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_dash = true;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "uncategorised".to_string()
    } else {
        slug
    }
}

/// Directory for storing keyframe images of one video.
#[must_use]
pub fn keyframe_directory(media_root: &Path, video_id: VideoId, category_name: &str) -> PathBuf {
    media_root
        .join("keyframes")
        .join(slugify(category_name))
        .join(video_id.to_string())
}

/// Express a path relative to the media root using forward slashes.
///
/// Paths outside the media root fall back to the full path.
#[must_use]
pub fn relative_media_path(path: &Path, media_root: &Path) -> String {
    match path.strip_prefix(media_root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string().replace('\\', "/"),
    }
}
