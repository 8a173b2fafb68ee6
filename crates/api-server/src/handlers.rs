//! HTTP request handlers

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::Engine;
use tracing::{info, warn};
use uuid::Uuid;
use videoseek_common::VideoId;
use videoseek_hybrid_search::{CategoryAccess, SearchError, SearchRequest};
use videoseek_pipeline::CancelOutcome;
use videoseek_video_store::StoreError;

use crate::types::{
    EnqueueResponse, ErrorResponse, HealthResponse, JobStatusResponse, SearchRequestBody,
};
use crate::ApiState;

/// Header carrying the requester's pre-resolved category scope.
///
/// Absent means unrestricted; present it holds a comma-separated id list,
/// with the empty string meaning zero access.
const CATEGORY_SCOPE_HEADER: &str = "x-permitted-categories";

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn error_body(status: StatusCode, detail: String) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { detail }))
}

/// Submit a video for asynchronous indexing
pub async fn enqueue_video(
    State(state): State<ApiState>,
    Path(video_id): Path<VideoId>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    // Reject unknown videos up front so the caller gets a 404 instead of a
    // job that dies later.
    match state.store.fetch_video(video_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(error_body(
                StatusCode::NOT_FOUND,
                format!("Video {video_id} not found"),
            ));
        }
        Err(e) => {
            return Err(error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    let job_id = state.queue.enqueue(video_id).await.map_err(|e| {
        error_body(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;
    info!("Accepted indexing request for video {}", video_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

/// Report the status of a job
pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let id = parse_job_id(&job_id)?;
    match state.queue.status(id).await {
        Some(status) => Ok(Json(JobStatusResponse { job_id, status })),
        None => Err(error_body(
            StatusCode::NOT_FOUND,
            format!("Job {job_id} not found"),
        )),
    }
}

/// Cancel a job that has not started yet
pub async fn cancel_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let id = parse_job_id(&job_id)?;
    match state.queue.cancel(id).await {
        CancelOutcome::Cancelled => Ok(StatusCode::NO_CONTENT),
        CancelOutcome::AlreadyStarted => Err(error_body(
            StatusCode::CONFLICT,
            format!("Job {job_id} already started and will run to completion"),
        )),
        CancelOutcome::Unknown => Err(error_body(
            StatusCode::NOT_FOUND,
            format!("Job {job_id} not found"),
        )),
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, (StatusCode, Json<ErrorResponse>)> {
    Uuid::parse_str(raw).map_err(|_| {
        error_body(
            StatusCode::BAD_REQUEST,
            format!("'{raw}' is not a valid job id"),
        )
    })
}

/// Hybrid text and image search over indexed video content
pub async fn hybrid_search(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SearchRequestBody>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let access = category_scope(&headers).map_err(|detail| {
        error_body(StatusCode::BAD_REQUEST, detail)
    })?;

    let search_image = match &body.search_image {
        Some(encoded) => Some(
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|_| {
                    error_body(
                        StatusCode::BAD_REQUEST,
                        "search_image is not valid base64".to_string(),
                    )
                })?,
        ),
        None => None,
    };

    let request = SearchRequest {
        search_text: body.search_text,
        search_image,
        analyze_image: body.analyze_image,
        requested_category: body.video_category_id,
    };

    match state.search.search(request, &access).await {
        Ok(results) => Ok(Json(results)),
        Err(e) => {
            warn!("Search request failed: {}", e);
            let status = match &e {
                SearchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                SearchError::Forbidden(_) => StatusCode::FORBIDDEN,
                SearchError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                SearchError::EngineUnavailable(_) | SearchError::Engine(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            Err(error_body(status, e.to_string()))
        }
    }
}

/// Parse the category scope header into a [`CategoryAccess`].
fn category_scope(headers: &HeaderMap) -> Result<CategoryAccess, String> {
    let Some(value) = headers.get(CATEGORY_SCOPE_HEADER) else {
        return Ok(CategoryAccess::Unrestricted);
    };
    let raw = value
        .to_str()
        .map_err(|_| format!("{CATEGORY_SCOPE_HEADER} header is not valid text"))?
        .trim();
    if raw.is_empty() {
        return Ok(CategoryAccess::Restricted(Vec::new()));
    }
    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = part
            .parse()
            .map_err(|_| format!("'{part}' is not a valid category id"))?;
        ids.push(id);
    }
    Ok(CategoryAccess::Restricted(ids))
}
