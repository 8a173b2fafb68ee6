//! Search index gateway
//!
//! Manages the connection to the OpenSearch-compatible engine: declarative
//! index schema, idempotent index creation, bulk document submission with
//! per-item error surfacing, and raw query execution.

pub mod documents;
pub mod mapping;

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

pub use documents::{
    ChunkDocument, ChunkKind, JoinRelation, ParentDocument, SearchDocument,
    IMAGE_EMBEDDING_DIMS, TEXT_EMBEDDING_DIMS,
};

/// Errors from the search index gateway
#[derive(Debug, thiserror::Error)]
pub enum SearchIndexError {
    #[error("Search engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search engine returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Bulk indexing reported {} item failure(s): {}", failures.len(), failures.join("; "))]
    Bulk { failures: Vec<String> },

    #[error("Invalid document: {0}")]
    Document(String),
}

pub type Result<T> = std::result::Result<T, SearchIndexError>;

/// Search engine connection and index configuration
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Logical index holding parent and child documents
    pub index: String,

    /// Connect/read timeout
    pub timeout: Duration,

    /// Declared text-embedding dimension; must match the embedding model
    pub text_dims: usize,

    /// Declared image-embedding dimension; must match the embedding model
    pub image_dims: usize,

    /// Ask the engine to make writes visible before returning
    pub refresh_on_write: bool,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("OPENSEARCH_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("OPENSEARCH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9200),
            scheme: std::env::var("OPENSEARCH_SCHEME").unwrap_or_else(|_| "http".to_string()),
            username: std::env::var("OPENSEARCH_USER").ok(),
            password: std::env::var("OPENSEARCH_PASSWORD").ok(),
            index: std::env::var("OPENSEARCH_INDEX").unwrap_or_else(|_| "videos".to_string()),
            timeout: Duration::from_secs(
                std::env::var("OPENSEARCH_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            text_dims: TEXT_EMBEDDING_DIMS,
            image_dims: IMAGE_EMBEDDING_DIMS,
            refresh_on_write: false,
        }
    }
}

impl SearchIndexConfig {
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Envelope of hits in a search response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Nested inner-hit group
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InnerHits {
    #[serde(default)]
    pub hits: HitsEnvelope,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
    #[serde(default)]
    pub inner_hits: HashMap<String, InnerHits>,
}

/// Search response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    error: Option<Value>,
}

/// Client for the search engine REST interface
#[derive(Debug, Clone)]
pub struct SearchIndexClient {
    http: reqwest::Client,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    /// Create a client without touching the engine.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: SearchIndexConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Create a client and ensure the configured index exists.
    ///
    /// # Errors
    /// Returns an error when the engine is unreachable or index creation fails.
    pub async fn connect(config: SearchIndexConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.ensure_index().await?;
        Ok(client)
    }

    #[must_use]
    pub fn index(&self) -> &str {
        &self.config.index
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(password)) => request.basic_auth(user, Some(password)),
            _ => request,
        }
    }

    /// Check whether the configured index exists.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unexpected status.
    pub async fn index_exists(&self) -> Result<bool> {
        let url = self.url(&format!("/{}", self.config.index));
        let response = self.authorize(self.http.head(&url)).send().await?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SearchIndexError::Api {
                status,
                body: format!("unexpected status for HEAD {url}"),
            }),
        }
    }

    /// Create the configured index with its mapping.
    ///
    /// # Errors
    /// Returns an error when the engine rejects the mapping.
    pub async fn create_index(&self) -> Result<()> {
        let url = self.url(&format!("/{}", self.config.index));
        let body = mapping::index_body(self.config.text_dims, self.config.image_dims);
        let response = self
            .authorize(self.http.put(&url))
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        info!("Created search index '{}'", self.config.index);
        Ok(())
    }

    /// Create the index if it does not already exist.
    ///
    /// # Errors
    /// Returns an error when the existence check or creation fails.
    pub async fn ensure_index(&self) -> Result<()> {
        if self.index_exists().await? {
            debug!("Search index '{}' already exists", self.config.index);
            return Ok(());
        }
        self.create_index().await
    }

    /// Submit documents in one bulk call.
    ///
    /// Repeated submissions overwrite documents with the same deterministic
    /// id instead of duplicating them. Either all documents are accepted or
    /// the call fails with the per-item failures surfaced.
    ///
    /// # Errors
    /// Returns a document error on validation failure, an API error on a
    /// rejected request, and a bulk error when individual items fail.
    pub async fn bulk(&self, documents: &[SearchDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        for document in documents {
            document.validate(self.config.text_dims, self.config.image_dims)?;
        }

        let mut payload = String::new();
        for document in documents {
            let action = serde_json::json!({
                "index": {
                    "_index": self.config.index,
                    "_id": document.id(),
                    "routing": document.routing(),
                }
            });
            payload.push_str(&action.to_string());
            payload.push('\n');
            payload.push_str(&document.body()?.to_string());
            payload.push('\n');
        }

        let mut url = self.url("/_bulk");
        if self.config.refresh_on_write {
            url.push_str("?refresh=wait_for");
        }
        let response = self
            .authorize(self.http.post(&url))
            .header("content-type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: BulkResponse = response.json().await?;

        if body.errors {
            let failures: Vec<String> = body
                .items
                .iter()
                .flat_map(|item| item.values())
                .filter_map(|item| {
                    item.error
                        .as_ref()
                        .map(|error| format!("{}: {}", item.id, error))
                })
                .collect();
            return Err(SearchIndexError::Bulk { failures });
        }

        info!("Indexed {} documents", documents.len());
        Ok(documents.len())
    }

    /// Execute a raw query body against the configured index.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn search(&self, body: &Value) -> Result<SearchResponse> {
        let url = self.url(&format!("/{}/_search", self.config.index));
        let response = self
            .authorize(self.http.post(&url))
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SearchIndexError::Api {
        status: status.as_u16(),
        body,
    })
}
