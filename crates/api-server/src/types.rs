//! Request and response bodies

use serde::{Deserialize, Serialize};
use videoseek_common::CategoryId;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: videoseek_pipeline::JobStatus,
}

/// Hybrid search request body
///
/// The query image, when present, travels base64-encoded; upload transport
/// mechanics are out of scope for this service.
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequestBody {
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub search_image: Option<String>,
    #[serde(default)]
    pub analyze_image: bool,
    #[serde(default)]
    pub video_category_id: Option<CategoryId>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let body: SearchRequestBody = serde_json::from_str(r#"{"search_text": "hi"}"#).unwrap();
        assert_eq!(body.search_text, "hi");
        assert!(body.search_image.is_none());
        assert!(!body.analyze_image);
        assert!(body.video_category_id.is_none());
    }

    #[test]
    fn test_search_request_full() {
        let body: SearchRequestBody = serde_json::from_str(
            r#"{"search_text": "", "search_image": "AAEC", "analyze_image": true, "video_category_id": 4}"#,
        )
        .unwrap();
        assert_eq!(body.search_image.as_deref(), Some("AAEC"));
        assert!(body.analyze_image);
        assert_eq!(body.video_category_id, Some(4));
    }
}
