//! HTTP client for the model-serving gateway
//!
//! A thin façade over the Ollama-style REST interface exposing four
//! operations: refine text, embed text, describe image, embed image.
//! Constructed once per run from an explicit config and passed by
//! reference into the pipeline stages.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Errors from the model gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Model gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from model gateway: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Model gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL (e.g. `http://localhost:11434`)
    pub base_url: String,

    /// Model used for text refinement
    pub text_model: String,

    /// Model used for text and image embeddings
    pub embedding_model: String,

    /// Model used for image description
    pub vision_model: String,

    /// Per-call timeout
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let text_model =
            std::env::var("OLLAMA_TEXT_MODEL").unwrap_or_else(|_| "gemma3:4b".to_string());
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            embedding_model: std::env::var("OLLAMA_EMBED_MODEL")
                .unwrap_or_else(|_| "snowflake-arctic-embed2".to_string()),
            vision_model: std::env::var("OLLAMA_VISION_MODEL")
                .unwrap_or_else(|_| text_model.clone()),
            text_model,
            timeout: Duration::from_secs(
                std::env::var("OLLAMA_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Option<Vec<f32>>,
}

/// Client for the model gateway REST interface
#[derive(Debug, Clone)]
pub struct ModelGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl ModelGateway {
    /// Create a gateway client with the per-call timeout applied.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String> {
        let url = self.endpoint("/api/generate");
        debug!("POST {} model={}", url, request.model);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let body: GenerateResponse = response.json().await?;
        Ok(body.response.trim().to_string())
    }

    async fn embeddings(&self, request: &EmbeddingsRequest<'_>) -> Result<Vec<f32>> {
        let url = self.endpoint("/api/embeddings");
        debug!("POST {} model={}", url, request.model);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let body: EmbeddingsResponse = response.json().await?;
        body.embedding.ok_or_else(|| {
            GatewayError::UnexpectedResponse("embeddings payload missing 'embedding'".to_string())
        })
    }

    /// Send text through the refinement model (grammar cleanup, summaries).
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn refine_text(&self, text: &str, prompt: &str) -> Result<String> {
        self.generate(&GenerateRequest {
            model: &self.config.text_model,
            prompt: compose_refine_prompt(prompt, text),
            images: None,
            stream: false,
        })
        .await
    }

    /// Generate an embedding for the provided text.
    ///
    /// # Errors
    /// Returns an error on transport failure or a malformed payload.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embeddings(&EmbeddingsRequest {
            model: &self.config.embedding_model,
            prompt: text,
            images: None,
        })
        .await
    }

    /// Generate a textual description of an image.
    ///
    /// # Errors
    /// Returns an error when the image cannot be read or the call fails.
    pub async fn describe_image(&self, image_path: &Path, prompt: &str) -> Result<String> {
        let data = encode_image(image_path)?;
        self.generate(&GenerateRequest {
            model: &self.config.vision_model,
            prompt: prompt.to_string(),
            images: Some(vec![data]),
            stream: false,
        })
        .await
    }

    /// Generate an embedding for an image.
    ///
    /// # Errors
    /// Returns an error when the image cannot be read or the call fails.
    pub async fn embed_image(&self, image_path: &Path) -> Result<Vec<f32>> {
        let data = encode_image(image_path)?;
        self.embeddings(&EmbeddingsRequest {
            model: &self.config.embedding_model,
            prompt: "",
            images: Some(vec![data]),
        })
        .await
    }
}

fn compose_refine_prompt(prompt: &str, text: &str) -> String {
    format!("{prompt}\n\n{}\n", text.trim())
}

fn encode_image(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| GatewayError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join_strips_trailing_slash() {
        let gateway = ModelGateway::new(GatewayConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..GatewayConfig::default()
        })
        .unwrap();
        assert_eq!(
            gateway.endpoint("/api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_compose_refine_prompt() {
        assert_eq!(
            compose_refine_prompt("Clean this up.", "  hello world  "),
            "Clean this up.\n\nhello world\n"
        );
    }

    #[test]
    fn test_encode_image_missing_file() {
        let err = encode_image(Path::new("/nonexistent/image.jpg")).unwrap_err();
        assert!(matches!(err, GatewayError::Image { .. }));
    }

    #[test]
    fn test_encode_image_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.jpg");
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF, 0xD9]).unwrap();
        let encoded = encode_image(&path).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(decoded, vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn test_generate_request_serialization_omits_absent_images() {
        let request = GenerateRequest {
            model: "gemma3:4b",
            prompt: "hi".to_string(),
            images: None,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("images").is_none());
        assert_eq!(value["stream"], serde_json::json!(false));
    }
}
