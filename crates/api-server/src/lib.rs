//! REST API for video indexing and hybrid search
//!
//! Thin HTTP surface over the pipeline queue and the search service.
//! Authentication and permission models live upstream; the requester's
//! category scope arrives pre-resolved in a header.

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use videoseek_hybrid_search::SearchService;
use videoseek_pipeline::JobQueue;
use videoseek_video_store::VideoStore;

pub use handlers::*;
pub use types::*;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub queue: Arc<JobQueue>,
    pub store: Arc<dyn VideoStore>,
    pub search: Arc<SearchService>,
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Indexing pipeline
        .route("/api/v1/videos/{video_id}/index", post(enqueue_video))
        .route("/api/v1/jobs/{job_id}", get(job_status).delete(cancel_job))
        // Hybrid search
        .route("/api/v1/search", post(hybrid_search))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
///
/// # Errors
/// Returns an IO error when the listener cannot bind or the server fails.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
