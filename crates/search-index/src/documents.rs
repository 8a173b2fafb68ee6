//! Search document shapes
//!
//! Three document shapes share one schema: the parent video document and two
//! chunk kinds (keyframe, text segment). Identity is derived
//! deterministically from the video id and the unit's position so repeated
//! indexing runs overwrite rather than duplicate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use videoseek_common::{VideoId, VideoSegment};

use crate::SearchIndexError;

/// Declared text-embedding dimension
pub const TEXT_EMBEDDING_DIMS: usize = 1024;

/// Declared image-embedding dimension
pub const IMAGE_EMBEDDING_DIMS: usize = 512;

/// Kind discriminant for chunk documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Keyframe,
    TextSegment,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyframe => "keyframe",
            Self::TextSegment => "text_segment",
        }
    }
}

/// Join-relation tag linking a chunk to its parent video document
#[derive(Debug, Clone, Serialize)]
pub struct JoinRelation {
    pub name: &'static str,
    pub parent: String,
}

/// Video-level parent document
#[derive(Debug, Clone, Serialize)]
pub struct ParentDocument {
    #[serde(skip)]
    doc_id: String,
    pub video_id: VideoId,
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub category_id: Option<i64>,
    pub category_name: String,
    pub upload_timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub video_relation: &'static str,
}

impl ParentDocument {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        video_id: VideoId,
        title: String,
        description: String,
        source_url: String,
        category_id: Option<i64>,
        category_name: String,
        upload_timestamp: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            doc_id: video_id.to_string(),
            video_id,
            title,
            description,
            source_url,
            category_id,
            category_name,
            upload_timestamp,
            duration_seconds,
            video_relation: "video",
        }
    }
}

/// Child document: one keyframe or one transcript chunk
#[derive(Debug, Clone, Serialize)]
pub struct ChunkDocument {
    #[serde(skip)]
    doc_id: String,
    pub video_id: VideoId,
    pub chunk_type: ChunkKind,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_embedding: Option<Vec<f32>>,
    pub keyframe_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_embedding: Option<Vec<f32>>,
    pub video_relation: JoinRelation,
}

impl ChunkDocument {
    /// Document for a keyframe; identity keyed by the millisecond timestamp.
    #[must_use]
    pub fn keyframe(
        video_id: VideoId,
        timestamp: f64,
        description: String,
        text_embedding: Option<Vec<f32>>,
        keyframe_path: String,
        image_embedding: Option<Vec<f32>>,
    ) -> Self {
        let ms = (timestamp * 1000.0).floor().max(0.0) as u64;
        Self {
            doc_id: format!("{video_id}-keyframe-{ms}"),
            video_id,
            chunk_type: ChunkKind::Keyframe,
            start_seconds: timestamp,
            end_seconds: timestamp,
            text_content: description,
            text_embedding,
            keyframe_path,
            image_embedding,
            video_relation: join_relation(video_id),
        }
    }

    /// Document for one transcript chunk; identity keyed by segment and
    /// chunk ordinals.
    #[must_use]
    pub fn text_segment(
        video_id: VideoId,
        segment: &VideoSegment,
        segment_index: usize,
        chunk_index: usize,
        text_content: String,
        text_embedding: Vec<f32>,
    ) -> Self {
        Self {
            doc_id: format!("{video_id}-segment-{segment_index}-{chunk_index}"),
            video_id,
            chunk_type: ChunkKind::TextSegment,
            start_seconds: segment.start,
            end_seconds: segment.end,
            text_content,
            text_embedding: Some(text_embedding),
            keyframe_path: String::new(),
            image_embedding: None,
            video_relation: join_relation(video_id),
        }
    }
}

fn join_relation(video_id: VideoId) -> JoinRelation {
    JoinRelation {
        name: "content_chunk",
        parent: video_id.to_string(),
    }
}

/// A document ready for bulk submission
#[derive(Debug, Clone)]
pub enum SearchDocument {
    Parent(ParentDocument),
    Chunk(ChunkDocument),
}

impl SearchDocument {
    /// Deterministic document id
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Parent(doc) => &doc.doc_id,
            Self::Chunk(doc) => &doc.doc_id,
        }
    }

    /// Routing key co-locating a video's documents on one shard
    #[must_use]
    pub fn routing(&self) -> String {
        match self {
            Self::Parent(doc) => doc.video_id.to_string(),
            Self::Chunk(doc) => doc.video_id.to_string(),
        }
    }

    /// Serialized document body.
    ///
    /// # Errors
    /// Returns a document error when serialization fails.
    pub fn body(&self) -> Result<Value, SearchIndexError> {
        let value = match self {
            Self::Parent(doc) => serde_json::to_value(doc),
            Self::Chunk(doc) => serde_json::to_value(doc),
        };
        value.map_err(|e| SearchIndexError::Document(e.to_string()))
    }

    /// Validate shape invariants before submission.
    ///
    /// # Errors
    /// Returns a document error on an embedding-dimension mismatch or a
    /// malformed time range.
    pub fn validate(&self, text_dims: usize, image_dims: usize) -> Result<(), SearchIndexError> {
        let Self::Chunk(chunk) = self else {
            return Ok(());
        };
        if chunk.start_seconds < 0.0 {
            return Err(SearchIndexError::Document(format!(
                "{}: start_seconds must be non-negative",
                chunk.doc_id
            )));
        }
        if chunk.end_seconds < chunk.start_seconds {
            return Err(SearchIndexError::Document(format!(
                "{}: end_seconds precedes start_seconds",
                chunk.doc_id
            )));
        }
        if let Some(embedding) = &chunk.text_embedding {
            if embedding.len() != text_dims {
                return Err(SearchIndexError::Document(format!(
                    "{}: text embedding has {} dimensions, index declares {}",
                    chunk.doc_id,
                    embedding.len(),
                    text_dims
                )));
            }
        }
        if let Some(embedding) = &chunk.image_embedding {
            if embedding.len() != image_dims {
                return Err(SearchIndexError::Document(format!(
                    "{}: image embedding has {} dimensions, index declares {}",
                    chunk.doc_id,
                    embedding.len(),
                    image_dims
                )));
            }
        }
        Ok(())
    }
}
