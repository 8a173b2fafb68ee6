//! Transcription and refinement stage
//!
//! For each planned segment: extract a mono 16 kHz audio sub-clip,
//! transcribe it, refine the raw transcript through the model gateway, chunk
//! the refined text at sentence boundaries and embed each chunk. Failures
//! are contained per segment (or per chunk) and logged with their cause; the
//! scratch WAV is always deleted.

use std::path::Path;
use std::process::Command;
use tracing::{info, warn};
use videoseek_common::{
    chunk_text, safe_unlink, PromptLibrary, PromptPurpose, ProcessingError, Result, VideoRecord,
    VideoSegment,
};
use videoseek_model_gateway::ModelGateway;
use videoseek_search_index::{ChunkDocument, SearchDocument};

use crate::scratch::ScratchGuard;
use crate::transcribe::SpeechToText;

/// Build text-chunk documents for every transcribable segment.
///
/// # Errors
/// Returns a missing-capability error when ffmpeg is unavailable; all other
/// failures degrade to skipped segments or chunks.
pub async fn process_segments(
    video: &VideoRecord,
    segments: &mut [VideoSegment],
    video_path: &Path,
    gateway: &ModelGateway,
    prompts: &PromptLibrary,
    scratch_root: &Path,
    chunk_chars: usize,
) -> Result<Vec<SearchDocument>> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let ffmpeg = videoseek_capability::ffmpeg()?;
    let audio_root = scratch_root.join(format!("video_{}", video.id));
    std::fs::create_dir_all(&audio_root)?;
    let mut scratch = ScratchGuard::new();
    scratch.register_directory(audio_root.clone());

    let cleanup_prompt = prompts.fetch(PromptPurpose::TranscriptCleanup, video.category_name());

    let speech = match SpeechToText::shared() {
        Ok(engine) => Some(engine),
        Err(e) => {
            warn!("Transcription unavailable, skipping all segments: {}", e);
            None
        }
    };

    let mut documents = Vec::new();
    for (index, segment) in segments.iter_mut().enumerate() {
        let audio_path = audio_root.join(format!(
            "segment_{}_{}.wav",
            (segment.start * 1000.0) as i64,
            (segment.end * 1000.0) as i64
        ));

        if let Err(e) = extract_audio_clip(&ffmpeg, video_path, segment, &audio_path) {
            warn!("Failed to extract audio for segment {}: {}", index, e);
            continue;
        }

        let Some(speech) = speech else {
            safe_unlink(&audio_path);
            continue;
        };
        let raw = match speech.transcribe_wav(&audio_path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Transcription failed for segment {}: {}", index, e);
                safe_unlink(&audio_path);
                continue;
            }
        };
        safe_unlink(&audio_path);

        if raw.is_empty() {
            continue;
        }
        segment.raw_transcription = Some(raw.clone());

        let refined = match gateway.refine_text(&raw, &cleanup_prompt).await {
            Ok(refined) if !refined.is_empty() => refined,
            Ok(_) => raw.clone(),
            Err(e) => {
                warn!("Text refinement failed for segment {}: {}", index, e);
                raw.clone()
            }
        };
        segment.corrected_transcription = Some(refined.clone());

        // Each refined chunk becomes an independently searchable document.
        for (chunk_index, chunk) in chunk_text(&refined, chunk_chars).into_iter().enumerate() {
            match gateway.embed_text(&chunk).await {
                Ok(embedding) => documents.push(SearchDocument::Chunk(
                    ChunkDocument::text_segment(
                        video.id,
                        segment,
                        index,
                        chunk_index,
                        chunk,
                        embedding,
                    ),
                )),
                Err(e) => {
                    warn!(
                        "Text embedding failed for segment {} chunk {}: {}",
                        index, chunk_index, e
                    );
                }
            }
        }
    }

    info!(
        "Processed {} segments into {} chunk documents",
        segments.len(),
        documents.len()
    );
    Ok(documents)
}

/// Extract a segment's audio as mono 16 kHz WAV.
fn extract_audio_clip(
    ffmpeg: &Path,
    video_path: &Path,
    segment: &VideoSegment,
    destination: &Path,
) -> Result<()> {
    let output = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-ss")
        .arg(format!("{}", segment.start.max(0.0)))
        .arg("-t")
        .arg(format!("{}", segment.duration().max(0.5)))
        .arg("-i")
        .arg(video_path)
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg("16000")
        .arg("-f")
        .arg("wav")
        .arg("-y")
        .arg(destination)
        .output()
        .map_err(|e| ProcessingError::Ffmpeg(format!("failed to execute ffmpeg: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::Ffmpeg(format!(
            "audio extraction failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}
