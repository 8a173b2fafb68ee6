//! Keyframe extractor
//!
//! Decodes a video at a sampled frame rate via the ffmpeg capability and
//! selects perceptually distinct frames: a frame is accepted when the
//! minimum-interval cursor has passed and its structural similarity against
//! the previous accepted frame falls below the configured threshold.
//! Accepted frames persist as zero-padded millisecond-named JPEGs so lexical
//! order matches time order.

pub mod ssim;

use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use videoseek_common::paths::timestamp_to_filename;
use videoseek_common::{Keyframe, ProcessingError, Result};

pub use ssim::ssim;

/// Keyframe extraction configuration
#[derive(Debug, Clone)]
pub struct KeyframeConfig {
    /// Minimum interval between accepted keyframes (seconds)
    pub interval: f64,
    /// Structural-similarity score at or above which a frame is a duplicate
    pub ssim_threshold: f64,
    /// Frame sampling rate for decoding (frames per second)
    pub sample_fps: f64,
}

impl Default for KeyframeConfig {
    fn default() -> Self {
        Self {
            interval: env_f64("VIDEO_INDEX_KEYFRAME_INTERVAL", 4.0),
            ssim_threshold: env_f64("VIDEO_INDEX_SSIM_THRESHOLD", 0.90),
            sample_fps: env_f64("VIDEO_INDEX_SAMPLE_FPS", 2.0),
        }
    }
}

impl KeyframeConfig {
    /// Interval clamped to a sane floor
    #[must_use]
    pub fn effective_interval(&self) -> f64 {
        self.interval.max(0.5)
    }

    /// Threshold clamped into [0, 1]
    #[must_use]
    pub fn effective_threshold(&self) -> f64 {
        self.ssim_threshold.clamp(0.0, 1.0)
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Stateful keyframe acceptance over a stream of decoded frames
///
/// Mirrors a sequential decode loop: the first frame is always accepted;
/// later frames must pass the interval cursor and score below the SSIM
/// threshold against the previous accepted frame.
pub struct FrameSelector {
    interval: f64,
    threshold: f64,
    previous: Option<GrayImage>,
    next_capture: f64,
    accepted: usize,
}

impl FrameSelector {
    #[must_use]
    pub fn new(config: &KeyframeConfig) -> Self {
        Self {
            interval: config.effective_interval(),
            threshold: config.effective_threshold(),
            previous: None,
            next_capture: 0.0,
            accepted: 0,
        }
    }

    /// Whether a frame at this timestamp is worth decoding at all.
    ///
    /// The cursor check needs no pixel data, so callers can skip image
    /// loading for frames inside the minimum interval.
    #[must_use]
    pub fn due(&self, timestamp: f64) -> bool {
        self.accepted == 0 || timestamp >= self.next_capture
    }

    /// Observe a decoded frame; returns true when it is accepted.
    pub fn observe(&mut self, timestamp: f64, gray: &GrayImage) -> bool {
        if !self.due(timestamp) {
            return false;
        }
        if let Some(previous) = &self.previous {
            let score = ssim(previous, gray);
            if score >= self.threshold {
                return false;
            }
        }
        self.previous = Some(gray.clone());
        self.next_capture = timestamp + self.interval;
        self.accepted += 1;
        true
    }

    #[must_use]
    pub fn accepted(&self) -> usize {
        self.accepted
    }
}

/// A frame decoded to disk with its source timestamp
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub timestamp: f64,
    pub path: PathBuf,
}

/// Extract keyframes from a video into `keyframe_dir`.
///
/// Returns the accepted keyframes in timestamp order together with the
/// measured duration (maximum observed frame timestamp, falling back to a
/// metadata probe when decoding yields nothing).
///
/// # Errors
/// Returns a missing-capability error when ffmpeg is unavailable and an
/// ffmpeg error when decoding fails outright.
pub fn extract_keyframes(
    video_path: &Path,
    keyframe_dir: &Path,
    config: &KeyframeConfig,
) -> Result<(Vec<Keyframe>, f64)> {
    let ffmpeg = videoseek_capability::ffmpeg()?;
    std::fs::create_dir_all(keyframe_dir)?;

    let scratch = tempfile::tempdir()?;
    let frames = decode_sampled_frames(&ffmpeg, video_path, scratch.path(), config.sample_fps)?;

    let mut selector = FrameSelector::new(config);
    let mut keyframes = Vec::new();
    let mut duration = 0.0f64;

    for frame in &frames {
        duration = duration.max(frame.timestamp);
        if !selector.due(frame.timestamp) {
            continue;
        }
        let gray = match load_grayscale(&frame.path) {
            Ok(gray) => gray,
            Err(e) => {
                warn!(
                    "Skipping undecodable frame {}: {}",
                    frame.path.display(),
                    e
                );
                continue;
            }
        };
        if selector.observe(frame.timestamp, &gray) {
            let target = keyframe_dir.join(timestamp_to_filename(frame.timestamp));
            std::fs::copy(&frame.path, &target)?;
            keyframes.push(Keyframe::new(frame.timestamp, target));
        }
    }

    if keyframes.is_empty() {
        // Near-static or undecodable stream: force-capture the first frame.
        if let Some(path) = grab_first_frame(&ffmpeg, video_path, keyframe_dir)? {
            keyframes.push(Keyframe::new(0.0, path));
        }
    }

    if duration <= 0.0 {
        duration = probe_duration(video_path);
    }

    info!(
        "Extracted {} keyframes from {} (duration {:.2}s)",
        keyframes.len(),
        video_path.display(),
        duration
    );
    Ok((keyframes, duration))
}

/// Decode the video at `sample_fps` into numbered JPEG frames.
fn decode_sampled_frames(
    ffmpeg: &Path,
    video_path: &Path,
    scratch_dir: &Path,
    sample_fps: f64,
) -> Result<Vec<DecodedFrame>> {
    let sample_fps = sample_fps.max(0.1);
    let pattern = scratch_dir.join("sample_%08d.jpg");
    let output = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(video_path)
        .arg("-vf")
        .arg(format!("fps={sample_fps}"))
        .arg("-q:v")
        .arg("2")
        .arg(&pattern)
        .output()
        .map_err(|e| ProcessingError::Ffmpeg(format!("failed to execute ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::Ffmpeg(format!(
            "frame sampling failed for {}: {}",
            video_path.display(),
            stderr.trim()
        )));
    }

    let mut frames: Vec<(u64, PathBuf)> = std::fs::read_dir(scratch_dir)?
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("jpg") {
                return None;
            }
            path.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.split('_').next_back())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|ordinal| (ordinal, path))
        })
        .collect();
    frames.sort_by_key(|(ordinal, _)| *ordinal);

    debug!(
        "Sampled {} frames at {} fps from {}",
        frames.len(),
        sample_fps,
        video_path.display()
    );

    // ffmpeg numbers output frames from 1; frame n sits at (n-1)/fps.
    Ok(frames
        .into_iter()
        .map(|(ordinal, path)| DecodedFrame {
            timestamp: (ordinal.saturating_sub(1)) as f64 / sample_fps,
            path,
        })
        .collect())
}

/// Grab the very first frame of the video, if one can be decoded.
fn grab_first_frame(
    ffmpeg: &Path,
    video_path: &Path,
    keyframe_dir: &Path,
) -> Result<Option<PathBuf>> {
    let target = keyframe_dir.join(timestamp_to_filename(0.0));
    let output = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(video_path)
        .arg("-frames:v")
        .arg("1")
        .arg("-q:v")
        .arg("2")
        .arg("-y")
        .arg(&target)
        .output()
        .map_err(|e| ProcessingError::Ffmpeg(format!("failed to execute ffmpeg: {e}")))?;

    if output.status.success() && target.is_file() {
        Ok(Some(target))
    } else {
        warn!(
            "First-frame fallback produced nothing for {}",
            video_path.display()
        );
        Ok(None)
    }
}

/// Probe the container duration, best effort.
///
/// Absence of the probing capability or a probe failure degrades to 0.0.
#[must_use]
pub fn probe_duration(video_path: &Path) -> f64 {
    let ffprobe = match videoseek_capability::ffprobe() {
        Ok(path) => path,
        Err(e) => {
            debug!("Duration probe unavailable: {}", e);
            return 0.0;
        }
    };
    let output = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(video_path)
        .output();
    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap_or(0.0),
        Ok(output) => {
            debug!(
                "ffprobe failed for {}: {}",
                video_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            0.0
        }
        Err(e) => {
            debug!("ffprobe execution failed for {}: {}", video_path.display(), e);
            0.0
        }
    }
}

fn load_grayscale(path: &Path) -> Result<GrayImage> {
    let image = image::open(path)
        .map_err(|e| ProcessingError::Other(format!("image decode failed: {e}")))?;
    Ok(image.to_luma8())
}
