//! Pipeline orchestrator
//!
//! Drives the end-to-end indexing sequence for one video: acquisition,
//! keyframe extraction, segmentation, transcription and refinement, document
//! assembly and a single bulk index submission. Owns the status state
//! machine and guarantees cleanup of temporary artifacts on every exit path.

pub mod acquire;
pub mod documents;
pub mod queue;
pub mod scratch;
pub mod segments;
pub mod transcribe;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use videoseek_common::paths::keyframe_directory;
use videoseek_common::{
    ensure_directory, ProcessingError, PromptLibrary, VideoId, VideoRecord, VideoStatus,
};
use videoseek_keyframe::{extract_keyframes, KeyframeConfig};
use videoseek_model_gateway::{GatewayConfig, GatewayError, ModelGateway};
use videoseek_search_index::{SearchIndexClient, SearchIndexConfig, SearchIndexError};
use videoseek_segmenter::{detect_silence, plan_segments, SegmenterConfig};
use videoseek_video_store::{ProcessingClaim, StoreError, VideoStore};

pub use queue::{CancelOutcome, JobQueue, JobStatus, QueueError};

/// Errors that abort a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    SearchIndex(#[from] SearchIndexError),
}

impl PipelineError {
    #[must_use]
    pub fn is_missing_capability(&self) -> bool {
        matches!(
            self,
            Self::Processing(ProcessingError::MissingCapability { .. })
        )
    }
}

/// Pipeline-wide configuration
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Root of durable media storage (uploads, keyframe images)
    pub media_root: PathBuf,
    /// Root of per-run temporary space
    pub scratch_root: PathBuf,
    pub keyframes: KeyframeConfig,
    pub segmenter: SegmenterConfig,
    /// Maximum characters per transcript chunk
    pub chunk_chars: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from(
                std::env::var("VIDEOSEEK_MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
            ),
            scratch_root: PathBuf::from(
                std::env::var("VIDEOSEEK_SCRATCH_DIR").unwrap_or_else(|_| "tmp".to_string()),
            ),
            keyframes: KeyframeConfig::default(),
            segmenter: SegmenterConfig::default(),
            chunk_chars: videoseek_common::text::DEFAULT_CHUNK_CHARS,
        }
    }
}

impl IndexerConfig {
    /// Scratch directory for downloaded remote videos
    #[must_use]
    pub fn download_root(&self) -> PathBuf {
        self.scratch_root.join("downloads")
    }

    /// Scratch directory for per-video audio extraction
    #[must_use]
    pub fn processing_root(&self) -> PathBuf {
        self.scratch_root.join("processing")
    }
}

/// Outcome of a `process_video` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Failed,
    /// Another run already holds the video; this call was a no-op
    AlreadyProcessing,
    NotFound,
}

/// Counters describing one successful run
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub duration: f64,
    pub keyframes: usize,
    pub segments: usize,
    pub documents: usize,
}

/// The indexing pipeline
pub struct Pipeline {
    store: Arc<dyn VideoStore>,
    gateway: GatewayConfig,
    search: SearchIndexConfig,
    prompts: PromptLibrary,
    config: IndexerConfig,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn VideoStore>,
        gateway: GatewayConfig,
        search: SearchIndexConfig,
        prompts: PromptLibrary,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            search,
            prompts,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VideoStore> {
        &self.store
    }

    /// Run the full indexing pipeline for one video.
    ///
    /// Idempotent-guarded: a video already PROCESSING is left untouched.
    /// Every failure transitions the video to FAILED with the cause logged;
    /// nothing is silently swallowed.
    pub async fn process_video(&self, video_id: VideoId) -> ProcessOutcome {
        let span = info_span!("process_video", video.id = video_id);
        self.process_video_inner(video_id).instrument(span).await
    }

    async fn process_video_inner(&self, video_id: VideoId) -> ProcessOutcome {
        let video = match self.store.fetch_video(video_id).await {
            Ok(video) => video,
            Err(StoreError::NotFound(_)) => {
                warn!("Video {} not found when processing", video_id);
                return ProcessOutcome::NotFound;
            }
            Err(e) => {
                error!("Failed to load video {}: {}", video_id, e);
                return ProcessOutcome::Failed;
            }
        };

        match self.store.claim_processing(video_id).await {
            Ok(ProcessingClaim::AlreadyProcessing) => {
                info!("Video {} is already being processed", video_id);
                return ProcessOutcome::AlreadyProcessing;
            }
            Ok(ProcessingClaim::Started { previous }) => {
                info!(
                    "Video {} status {} -> {}",
                    video_id,
                    previous.as_str(),
                    VideoStatus::Processing.as_str()
                );
            }
            Err(e) => {
                error!("Failed to claim video {} for processing: {}", video_id, e);
                return ProcessOutcome::Failed;
            }
        }

        match self.execute(&video).await {
            Ok(report) => {
                self.finish(video_id, VideoStatus::Completed).await;
                info!(
                    "Video {} indexed: {} documents ({} keyframes, {} segments, {:.2}s)",
                    video_id, report.documents, report.keyframes, report.segments, report.duration
                );
                ProcessOutcome::Completed
            }
            Err(e) => {
                if e.is_missing_capability() {
                    error!("Missing capability while processing video {}: {}", video_id, e);
                } else {
                    error!("Processing failed for video {}: {}", video_id, e);
                }
                self.finish(video_id, VideoStatus::Failed).await;
                ProcessOutcome::Failed
            }
        }
    }

    async fn finish(&self, video_id: VideoId, status: VideoStatus) {
        if let Err(e) = self.store.mark_status(video_id, status).await {
            error!(
                "Failed to record status {} for video {}: {}",
                status.as_str(),
                video_id,
                e
            );
        } else {
            info!(
                "Video {} status {} -> {}",
                video_id,
                VideoStatus::Processing.as_str(),
                status.as_str()
            );
        }
    }

    /// The multi-stage sequence, with scratch cleanup tied to this scope.
    async fn execute(&self, video: &VideoRecord) -> Result<RunReport, PipelineError> {
        let mut run_scratch = scratch::ScratchGuard::new();

        let keyframe_dir = ensure_directory(keyframe_directory(
            &self.config.media_root,
            video.id,
            video.category_name(),
        ))?;

        let acquired = acquire::acquire_video(
            video,
            &self.config.media_root,
            &self.config.download_root(),
            &mut run_scratch,
        )?;
        if let Some(description) = &acquired.remote_description {
            if video.description.is_empty() {
                self.store
                    .backfill_description(video.id, description)
                    .await?;
                info!("Backfilled description for video {} from remote source", video.id);
            }
        }

        let gateway = ModelGateway::new(self.gateway.clone())?;

        let (mut keyframes, duration) =
            extract_keyframes(&acquired.path, &keyframe_dir, &self.config.keyframes)?;
        let keyframe_timestamps: Vec<f64> = keyframes.iter().map(|k| k.timestamp).collect();

        let silence = detect_silence(&acquired.path, &self.config.segmenter);
        let mut segments = plan_segments(
            &video.intervals,
            duration,
            &keyframe_timestamps,
            &silence,
            &self.config.segmenter,
        )?;

        let keyframe_documents = documents::build_keyframe_documents(
            video,
            &mut keyframes,
            &gateway,
            &self.prompts,
            &self.config.media_root,
        )
        .await;
        let text_documents = segments::process_segments(
            video,
            &mut segments,
            &acquired.path,
            &gateway,
            &self.prompts,
            &self.config.processing_root(),
            self.config.chunk_chars,
        )
        .await?;

        let mut all_documents =
            vec![documents::parent_document(video, duration, &self.config.media_root)];
        all_documents.extend(keyframe_documents);
        all_documents.extend(text_documents);

        let client = SearchIndexClient::connect(self.search.clone()).await?;
        let indexed = client.bulk(&all_documents).await?;

        Ok(RunReport {
            duration,
            keyframes: keyframes.len(),
            segments: segments.len(),
            documents: indexed,
        })
    }
}
