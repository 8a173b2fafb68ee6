//! Hybrid search service
//!
//! Validates a search request, enforces category access, computes query-time
//! embeddings through the model gateway, compiles the hybrid query, executes
//! it and ranks the hits. A degraded gateway or engine yields a
//! distinguishable error, never an empty-success response.

pub mod access;
pub mod query;
pub mod rank;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};
use videoseek_common::{CategoryId, PromptLibrary, PromptPurpose};
use videoseek_model_gateway::{GatewayConfig, ModelGateway};
use videoseek_search_index::{SearchIndexClient, SearchIndexConfig, SearchIndexError};
use videoseek_video_store::VideoStore;

pub use access::CategoryAccess;
pub use query::{build_hybrid_query, QueryInputs};
pub use rank::{rank, RankConfig, SearchResult};

/// Errors surfaced to the search caller
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error("You are not allowed to search category {0}")]
    Forbidden(CategoryId),

    #[error("Embedding service unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Search engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Search engine query failed: {0}")]
    Engine(String),
}

/// One hybrid search request
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub search_text: String,
    /// Raw bytes of a query image, if any
    pub search_image: Option<Vec<u8>>,
    /// Describe the query image and fold the description into the text query
    pub analyze_image: bool,
    pub requested_category: Option<CategoryId>,
}

/// Search service wiring the gateway, the engine and video metadata
pub struct SearchService {
    gateway: GatewayConfig,
    search: SearchIndexConfig,
    store: Arc<dyn VideoStore>,
    prompts: PromptLibrary,
    rank: RankConfig,
}

impl SearchService {
    #[must_use]
    pub fn new(
        gateway: GatewayConfig,
        search: SearchIndexConfig,
        store: Arc<dyn VideoStore>,
        prompts: PromptLibrary,
        rank: RankConfig,
    ) -> Self {
        Self {
            gateway,
            search,
            store,
            prompts,
            rank,
        }
    }

    /// Execute a hybrid search under the requester's category access.
    ///
    /// # Errors
    /// Returns an invalid-request error for empty input, a forbidden error
    /// for a category outside the permitted set, and gateway/engine errors
    /// when the backing services are degraded.
    pub async fn search(
        &self,
        request: SearchRequest,
        permitted: &CategoryAccess,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let mut search_text = request.search_text.trim().to_string();
        if search_text.is_empty() && request.search_image.is_none() {
            return Err(SearchError::InvalidRequest(
                "provide search text or a search image".to_string(),
            ));
        }

        if let Some(requested) = request.requested_category {
            if permitted.rejects(requested) {
                return Err(SearchError::Forbidden(requested));
            }
        }

        // Zero access short-circuits without touching the engine.
        if permitted.denies_everything() {
            info!("Requester has no permitted categories, returning empty result");
            return Ok(Vec::new());
        }

        let gateway = ModelGateway::new(self.gateway.clone())
            .map_err(|e| SearchError::GatewayUnavailable(e.to_string()))?;

        let mut image_embedding: Option<Vec<f32>> = None;
        if let Some(image_bytes) = &request.search_image {
            let image_file = persist_query_image(image_bytes)?;

            if request.analyze_image {
                let prompt = self
                    .prompts
                    .fetch(PromptPurpose::KeyframeDescription, "general");
                match gateway.describe_image(image_file.path(), &prompt).await {
                    Ok(description) if !description.is_empty() => {
                        debug!("Query image described ({} chars)", description.len());
                        if search_text.is_empty() {
                            search_text = description;
                        } else {
                            search_text = format!("{search_text} {description}");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Query image description failed: {}", e),
                }
            }

            match gateway.embed_image(image_file.path()).await {
                Ok(embedding) => {
                    debug!("Query image embedded ({} dims)", embedding.len());
                    image_embedding = Some(embedding);
                }
                Err(e) => warn!("Query image embedding failed: {}", e),
            }
            // The temp file is deleted when `image_file` drops.
        }

        let mut text_embedding: Option<Vec<f32>> = None;
        if !search_text.is_empty() {
            match gateway.embed_text(&search_text).await {
                Ok(embedding) => {
                    debug!("Query text embedded ({} dims)", embedding.len());
                    text_embedding = Some(embedding);
                }
                Err(e) => warn!("Query text embedding failed: {}", e),
            }
        }

        let body = build_hybrid_query(&QueryInputs {
            access: permitted,
            requested_category: request.requested_category,
            search_text: &search_text,
            text_embedding: text_embedding.as_deref(),
            image_embedding: image_embedding.as_deref(),
            result_cap: self.rank.max_total,
        });

        let client = SearchIndexClient::connect(self.search.clone())
            .await
            .map_err(|e| SearchError::EngineUnavailable(e.to_string()))?;
        let response = client.search(&body).await.map_err(|e| match e {
            SearchIndexError::Http(_) => SearchError::EngineUnavailable(e.to_string()),
            other => SearchError::Engine(other.to_string()),
        })?;

        let candidates = rank::collect_candidates(&response);
        let video_ids = rank::candidate_video_ids(&candidates);
        let video_meta = match self.store.fetch_metadata(&video_ids).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Video metadata resolution failed: {}", e);
                HashMap::new()
            }
        };

        let results = rank(candidates, &video_meta, &self.rank);
        info!("Hybrid search returned {} results", results.len());
        Ok(results)
    }
}

/// Persist query-image bytes to a scratch file removed on drop.
fn persist_query_image(bytes: &[u8]) -> Result<tempfile::NamedTempFile, SearchError> {
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| SearchError::InvalidRequest(format!("cannot persist query image: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| SearchError::InvalidRequest(format!("cannot persist query image: {e}")))?;
    file.flush()
        .map_err(|e| SearchError::InvalidRequest(format!("cannot persist query image: {e}")))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use videoseek_video_store::MemoryVideoStore;

    fn service() -> SearchService {
        SearchService::new(
            GatewayConfig::default(),
            SearchIndexConfig::default(),
            Arc::new(MemoryVideoStore::new()),
            PromptLibrary::default(),
            RankConfig {
                max_per_video: 10,
                max_total: 50,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_text_and_no_image_is_invalid() {
        let result = service()
            .search(SearchRequest::default(), &CategoryAccess::Unrestricted)
            .await;
        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_whitespace_text_is_invalid() {
        let request = SearchRequest {
            search_text: "   ".into(),
            ..SearchRequest::default()
        };
        let result = service()
            .search(request, &CategoryAccess::Unrestricted)
            .await;
        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_forbidden_category_is_rejected_before_querying() {
        let request = SearchRequest {
            search_text: "solar".into(),
            requested_category: Some(3),
            ..SearchRequest::default()
        };
        let result = service()
            .search(request, &CategoryAccess::Restricted(vec![1, 2]))
            .await;
        assert!(matches!(result, Err(SearchError::Forbidden(3))));
    }

    #[tokio::test]
    async fn test_zero_access_short_circuits_to_empty() {
        let request = SearchRequest {
            search_text: "solar".into(),
            ..SearchRequest::default()
        };
        // No engine is running in tests; an empty result proves the engine
        // was never contacted.
        let results = service()
            .search(request, &CategoryAccess::Restricted(vec![]))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_persist_query_image_roundtrip() {
        let file = persist_query_image(&[1, 2, 3]).unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), vec![1, 2, 3]);
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }
}
