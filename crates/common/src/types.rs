//! Core data model for the indexing pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ProcessingError;

/// Identifier of a video in the upstream store
pub type VideoId = i64;

/// Identifier of a category in the upstream store
pub type CategoryId = i64;

/// Lifecycle status of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    /// Database/wire representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse the database representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Where the video content comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoSource {
    /// An uploaded file resolved against the media root
    Upload { path: PathBuf },
    /// A remotely hosted video fetched through the download capability
    RemoteUrl { url: String },
}

/// Reference to the category a video belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// A manually authored time range for transcription
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TimeInterval {
    /// Reject malformed interval definitions before processing begins.
    ///
    /// # Errors
    /// Returns a validation error when the start is negative or the end does
    /// not come after the start.
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if self.start_seconds < 0.0 {
            return Err(ProcessingError::Validation(format!(
                "interval start must be non-negative, got {}",
                self.start_seconds
            )));
        }
        if self.end_seconds <= self.start_seconds {
            return Err(ProcessingError::Validation(format!(
                "interval end {} must be greater than start {}",
                self.end_seconds, self.start_seconds
            )));
        }
        Ok(())
    }
}

/// The upstream Video entity as read by the pipeline
///
/// The pipeline writes back only `status`, `description` and `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category: Option<CategoryRef>,
    pub source: VideoSource,
    pub status: VideoStatus,
    #[serde(default)]
    pub intervals: Vec<TimeInterval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Category name used for prompts and keyframe paths
    #[must_use]
    pub fn category_name(&self) -> &str {
        self.category.as_ref().map_or("general", |c| c.name.as_str())
    }

    #[must_use]
    pub fn category_id(&self) -> Option<CategoryId> {
        self.category.as_ref().map(|c| c.id)
    }
}

/// An analysed time range of the video, ephemeral per processing run
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSegment {
    pub start: f64,
    pub end: f64,
    pub raw_transcription: Option<String>,
    pub corrected_transcription: Option<String>,
}

impl VideoSegment {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            raw_transcription: None,
            corrected_transcription: None,
        }
    }

    /// Segment length in seconds, never negative
    #[must_use]
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// A keyframe extracted from the video, ephemeral per processing run
///
/// The image file itself persists on media storage after the run.
#[derive(Debug, Clone)]
pub struct Keyframe {
    pub timestamp: f64,
    pub path: PathBuf,
    pub description: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

impl Keyframe {
    #[must_use]
    pub fn new(timestamp: f64, path: PathBuf) -> Self {
        Self {
            timestamp,
            path,
            description: None,
            embedding: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            VideoStatus::Pending,
            VideoStatus::Processing,
            VideoStatus::Completed,
            VideoStatus::Failed,
        ] {
            assert_eq!(VideoStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VideoStatus::parse("UNKNOWN"), None);
    }

    #[test]
    fn test_interval_validation() {
        assert!(TimeInterval {
            start_seconds: 0.0,
            end_seconds: 10.0
        }
        .validate()
        .is_ok());
        assert!(TimeInterval {
            start_seconds: -1.0,
            end_seconds: 10.0
        }
        .validate()
        .is_err());
        assert!(TimeInterval {
            start_seconds: 10.0,
            end_seconds: 10.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_segment_duration_never_negative() {
        let segment = VideoSegment::new(5.0, 3.0);
        assert_eq!(segment.duration(), 0.0);
        let segment = VideoSegment::new(3.0, 5.5);
        assert!((segment.duration() - 2.5).abs() < f64::EPSILON);
    }
}
