//! Segmenter
//!
//! Determines the time ranges used as transcription units. Manually authored
//! intervals win outright; otherwise boundaries are assembled from the video
//! duration, keyframe timestamps and detected silence, then walked under the
//! min/max segment-duration policy. Silence detection is best effort and its
//! absence never aborts the pipeline.

use regex::Regex;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};
use videoseek_common::{ProcessingError, Result, TimeInterval, VideoSegment};

/// Segmentation policy and silence-detection tuning
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Segments shorter than this merge forward (seconds)
    pub min_segment: f64,
    /// Segments longer than this are split (seconds)
    pub max_segment: f64,
    /// Noise floor passed to silencedetect (e.g. `-35dB`)
    pub silence_noise: String,
    /// Minimum silence duration considered a boundary (seconds)
    pub silence_duration: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_segment: env_f64("VIDEO_INDEX_MIN_SEGMENT", 8.0),
            max_segment: env_f64("VIDEO_INDEX_MAX_SEGMENT", 75.0),
            silence_noise: std::env::var("VIDEO_INDEX_SILENCE_NOISE")
                .unwrap_or_else(|_| "-35dB".to_string()),
            silence_duration: env_f64("VIDEO_INDEX_SILENCE_DURATION", 1.5),
        }
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Plan the transcription segments for a video.
///
/// Manual intervals are used verbatim; automatic planning walks the sorted
/// boundary set merging short spans forward and splitting overlong ones.
///
/// # Errors
/// Returns a validation error when a manual interval is malformed.
pub fn plan_segments(
    manual_intervals: &[TimeInterval],
    duration: f64,
    keyframe_timestamps: &[f64],
    silence_boundaries: &[f64],
    config: &SegmenterConfig,
) -> Result<Vec<VideoSegment>> {
    if !manual_intervals.is_empty() {
        for interval in manual_intervals {
            interval.validate()?;
        }
        let segments = manual_intervals
            .iter()
            .map(|interval| VideoSegment::new(interval.start_seconds, interval.end_seconds))
            .collect::<Vec<_>>();
        debug!("Using {} manually authored segments", segments.len());
        return Ok(segments);
    }

    let mut boundaries: Vec<f64> = vec![0.0];
    if duration > 0.0 {
        boundaries.push(duration);
    }
    boundaries.extend(keyframe_timestamps.iter().map(|ts| ts.max(0.0)));
    boundaries.extend_from_slice(silence_boundaries);
    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    boundaries.dedup();

    let mut segments = Vec::new();
    if boundaries.is_empty() {
        return Ok(segments);
    }

    let last_index = boundaries.len() - 1;
    let mut start = boundaries[0];
    for (index, &boundary) in boundaries.iter().enumerate().skip(1) {
        let end = if duration > 0.0 {
            boundary.min(duration)
        } else {
            boundary
        };
        if end <= start {
            continue;
        }

        // Split overly long spans to respect the configured maximum.
        while config.max_segment > 0.0 && end - start > config.max_segment {
            let split_end = start + config.max_segment;
            segments.push(VideoSegment::new(start, split_end));
            start = split_end;
        }

        if end - start >= config.min_segment || index == last_index {
            segments.push(VideoSegment::new(start, end));
            start = end;
        }
    }

    if segments.is_empty() && duration > 0.0 {
        segments.push(VideoSegment::new(0.0, duration));
    }

    debug!("Planned {} segments over {:.2}s", segments.len(), duration);
    Ok(segments)
}

/// Detect silence boundaries in the video's audio track, best effort.
///
/// Any failure (missing ffmpeg, no audio stream, execution error) degrades
/// to an empty boundary list.
#[must_use]
pub fn detect_silence(video_path: &Path, config: &SegmenterConfig) -> Vec<f64> {
    let ffmpeg = match videoseek_capability::ffmpeg() {
        Ok(path) => path,
        Err(e) => {
            warn!("Silence detection unavailable: {}", e);
            return Vec::new();
        }
    };

    let filter = format!(
        "silencedetect=noise={}:d={}",
        config.silence_noise, config.silence_duration
    );
    let output = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-i")
        .arg(video_path)
        .arg("-af")
        .arg(filter)
        .arg("-f")
        .arg("null")
        .arg("-")
        .output();

    match output {
        Ok(output) => {
            // silencedetect reports on stderr regardless of exit status.
            let stderr = String::from_utf8_lossy(&output.stderr);
            let boundaries = parse_silence_boundaries(&stderr);
            debug!(
                "Detected {} silence boundaries in {}",
                boundaries.len(),
                video_path.display()
            );
            boundaries
        }
        Err(e) => {
            warn!(
                "Silence detection failed for {}: {}",
                video_path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Harvest `silence_start` / `silence_end` timestamps from ffmpeg output.
fn parse_silence_boundaries(stderr: &str) -> Vec<f64> {
    let Ok(pattern) = Regex::new(r"silence_(?:start|end):\s*([0-9.]+)") else {
        return Vec::new();
    };
    pattern
        .captures_iter(stderr)
        .filter_map(|captures| captures.get(1))
        .filter_map(|value| value.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            min_segment: 8.0,
            max_segment: 75.0,
            silence_noise: "-35dB".to_string(),
            silence_duration: 1.5,
        }
    }

    #[test]
    fn test_boundary_scenario_from_keyframes() {
        // duration 100, keyframes at 0/10/50, no silence:
        // boundaries {0,10,50,100} -> segments of 10s, 40s and 50s.
        let segments = plan_segments(&[], 100.0, &[0.0, 10.0, 50.0], &[], &config()).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!((segments[0].start, segments[0].end), (0.0, 10.0));
        assert_eq!((segments[1].start, segments[1].end), (10.0, 50.0));
        assert_eq!((segments[2].start, segments[2].end), (50.0, 100.0));
    }

    #[test]
    fn test_union_reconstructs_duration_without_gaps() {
        let keyframes = [3.0, 9.5, 22.0, 40.0, 41.0, 90.0, 130.0];
        let silence = [55.5, 57.0, 119.0];
        let segments = plan_segments(&[], 180.0, &keyframes, &silence, &config()).unwrap();
        assert!(!segments.is_empty());
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments.last().unwrap().end, 180.0);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap at {:?}", pair);
        }
    }

    #[test]
    fn test_no_segment_exceeds_max() {
        let segments = plan_segments(&[], 300.0, &[], &[], &config()).unwrap();
        for segment in &segments {
            assert!(
                segment.duration() <= config().max_segment + 1e-9,
                "segment too long: {:?}",
                segment
            );
        }
        // 300s with MAX 75 splits into exactly four pieces.
        assert_eq!(segments.len(), 4);
    }

    #[test]
    fn test_short_spans_merge_forward() {
        // Boundaries 2s apart stay below MIN and merge until the span is
        // at least 8s long.
        let segments =
            plan_segments(&[], 20.0, &[2.0, 4.0, 6.0, 8.0, 10.0], &[], &config()).unwrap();
        for segment in &segments[..segments.len() - 1] {
            assert!(segment.duration() >= config().min_segment);
        }
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments.last().unwrap().end, 20.0);
    }

    #[test]
    fn test_manual_intervals_bypass_policy() {
        let manual = [
            TimeInterval {
                start_seconds: 0.0,
                end_seconds: 200.0,
            },
            TimeInterval {
                start_seconds: 200.0,
                end_seconds: 201.0,
            },
        ];
        let segments = plan_segments(&manual, 300.0, &[10.0], &[20.0], &config()).unwrap();
        // Used verbatim even though 200s > MAX and 1s < MIN.
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start, segments[0].end), (0.0, 200.0));
        assert_eq!((segments[1].start, segments[1].end), (200.0, 201.0));
    }

    #[test]
    fn test_malformed_manual_interval_rejected() {
        let manual = [TimeInterval {
            start_seconds: 30.0,
            end_seconds: 10.0,
        }];
        let err = plan_segments(&manual, 100.0, &[], &[], &config()).unwrap_err();
        assert!(matches!(err, ProcessingError::Validation(_)));
    }

    #[test]
    fn test_no_boundaries_with_known_duration_yields_whole_video() {
        let segments = plan_segments(&[], 42.0, &[], &[], &config()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end), (0.0, 42.0));
    }

    #[test]
    fn test_unknown_duration_and_no_boundaries_yields_nothing() {
        let segments = plan_segments(&[], 0.0, &[], &[], &config()).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_boundaries_beyond_duration_are_clamped() {
        let segments = plan_segments(&[], 60.0, &[30.0, 95.0], &[], &config()).unwrap();
        assert_eq!(segments.last().unwrap().end, 60.0);
    }

    #[test]
    fn test_parse_silence_boundaries() {
        let stderr = "\
[silencedetect @ 0x55] silence_start: 12.458\n\
[silencedetect @ 0x55] silence_end: 14.02 | silence_duration: 1.562\n\
frame= 1000 fps=0.0 q=-0.0 size=N/A\n\
[silencedetect @ 0x55] silence_start: 80\n";
        let boundaries = parse_silence_boundaries(stderr);
        assert_eq!(boundaries, vec![12.458, 14.02, 80.0]);
    }

    #[test]
    fn test_parse_silence_ignores_garbage() {
        assert!(parse_silence_boundaries("no matches here").is_empty());
    }
}
