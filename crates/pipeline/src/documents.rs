//! Document assembly
//!
//! Builds the parent video document and the keyframe chunk documents.
//! Each keyframe takes three independent gateway calls (describe, image
//! embedding, description text embedding); any of them may fail without
//! aborting the keyframe or the run.

use std::path::Path;
use tracing::{info, warn};
use videoseek_common::paths::relative_media_path;
use videoseek_common::{Keyframe, PromptLibrary, PromptPurpose, VideoRecord, VideoSource};
use videoseek_model_gateway::ModelGateway;
use videoseek_search_index::{ChunkDocument, ParentDocument, SearchDocument};

/// Build one chunk document per keyframe.
pub async fn build_keyframe_documents(
    video: &VideoRecord,
    keyframes: &mut [Keyframe],
    gateway: &ModelGateway,
    prompts: &PromptLibrary,
    media_root: &Path,
) -> Vec<SearchDocument> {
    if keyframes.is_empty() {
        return Vec::new();
    }

    let description_prompt =
        prompts.fetch(PromptPurpose::KeyframeDescription, video.category_name());
    let mut documents = Vec::with_capacity(keyframes.len());

    for keyframe in keyframes.iter_mut() {
        match gateway
            .describe_image(&keyframe.path, &description_prompt)
            .await
        {
            Ok(description) => keyframe.description = Some(description),
            Err(e) => {
                warn!("Failed to describe keyframe {}: {}", keyframe.path.display(), e);
                keyframe.description = None;
            }
        }

        match gateway.embed_image(&keyframe.path).await {
            Ok(embedding) => keyframe.embedding = Some(embedding),
            Err(e) => {
                warn!(
                    "Image embedding failed for {}: {}",
                    keyframe.path.display(),
                    e
                );
                keyframe.embedding = None;
            }
        }

        // A described keyframe also gets a text embedding so visual content
        // is reachable through lexical-adjacent retrieval.
        let mut text_embedding = None;
        if let Some(description) = keyframe.description.as_deref().filter(|d| !d.is_empty()) {
            match gateway.embed_text(description).await {
                Ok(embedding) => text_embedding = Some(embedding),
                Err(e) => {
                    warn!("Text embedding for keyframe description failed: {}", e);
                }
            }
        }

        documents.push(SearchDocument::Chunk(ChunkDocument::keyframe(
            video.id,
            keyframe.timestamp,
            keyframe.description.clone().unwrap_or_default(),
            text_embedding,
            relative_media_path(&keyframe.path, media_root),
            keyframe.embedding.clone(),
        )));
    }

    info!("Prepared {} keyframe documents", documents.len());
    documents
}

/// Build the video-level parent document.
#[must_use]
pub fn parent_document(
    video: &VideoRecord,
    duration: f64,
    media_root: &Path,
) -> SearchDocument {
    let source_url = match &video.source {
        VideoSource::Upload { path } => relative_media_path(path, media_root),
        VideoSource::RemoteUrl { url } => url.clone(),
    };
    SearchDocument::Parent(ParentDocument::new(
        video.id,
        video.title.clone(),
        video.description.clone(),
        source_url,
        video.category_id(),
        video
            .category
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_default(),
        video.created_at,
        duration,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use videoseek_common::{CategoryRef, VideoStatus};

    fn video() -> VideoRecord {
        VideoRecord {
            id: 11,
            title: "Lecture".into(),
            description: "Intro lecture".into(),
            keywords: Vec::new(),
            category: Some(CategoryRef {
                id: 4,
                name: "education".into(),
            }),
            source: VideoSource::Upload {
                path: PathBuf::from("videos/11/lecture.mp4"),
            },
            status: VideoStatus::Processing,
            intervals: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parent_document_for_upload() {
        let document = parent_document(&video(), 300.0, Path::new("/media"));
        assert_eq!(document.id(), "11");
        assert_eq!(document.routing(), "11");
        let body = document.body().unwrap();
        assert_eq!(body["source_url"], "videos/11/lecture.mp4");
        assert_eq!(body["category_name"], "education");
        assert_eq!(body["duration_seconds"], 300.0);
    }

    #[test]
    fn test_parent_document_for_remote() {
        let mut record = video();
        record.source = VideoSource::RemoteUrl {
            url: "https://example.com/watch?v=abc".into(),
        };
        record.category = None;
        let document = parent_document(&record, 10.0, Path::new("/media"));
        let body = document.body().unwrap();
        assert_eq!(body["source_url"], "https://example.com/watch?v=abc");
        assert_eq!(body["category_name"], "");
        assert_eq!(body["category_id"], serde_json::Value::Null);
    }
}
