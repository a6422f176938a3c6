use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::{
    error::ApiError,
    models::{ExecuteRequest, HealthResponse, LegacyQuery},
    state::AppState,
    utils::read_json,
    validation::{job_from_execute, job_from_legacy},
};
use crate::executor::{Job, MediaKind};
use crate::storage::stream_and_remove;

/// Execute endpoint (POST /execute)
///
/// The connection stays open for the whole download and transcode; there is
/// no job ticket to poll.
///
/// ## Flow:
/// 1. Check the cluster secret (403 before any other work)
/// 2. Read and validate the `{type, url, quality?}` body
/// 3. Run the job through the shared executor
/// 4. Stream the artifact back as an attachment; the file is deleted when
///    the stream ends or the client disconnects
pub async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    if let Err(e) = state.auth.authorize(&headers) {
        state.metrics.request_rejected();
        tracing::warn!("Rejected execute call with bad cluster secret");
        return Err(e);
    }

    let max_body = state.config.server.max_request_bytes.as_usize();
    let request: ExecuteRequest = read_json(&headers, body, max_body).await?;
    let job = job_from_execute(&request)?;

    run_job(&state, job).await
}

/// Legacy standalone endpoint (GET /video?url=&quality=)
pub async fn legacy_video(
    State(state): State<AppState>,
    Query(query): Query<LegacyQuery>,
) -> Result<Response, ApiError> {
    let job = job_from_legacy(MediaKind::Video, &query)?;
    run_job(&state, job).await
}

/// Legacy standalone endpoint (GET /audio?url=)
pub async fn legacy_audio(
    State(state): State<AppState>,
    Query(query): Query<LegacyQuery>,
) -> Result<Response, ApiError> {
    let job = job_from_legacy(MediaKind::Audio, &query)?;
    run_job(&state, job).await
}

/// Shared by every execute-style endpoint
async fn run_job(state: &AppState, job: Job) -> Result<Response, ApiError> {
    state.metrics.job_started();

    let artifact = match state.executor.execute(&job).await {
        Ok(artifact) => artifact,
        Err(e) => {
            state.metrics.job_failed();
            return Err(e.into());
        }
    };
    state.metrics.job_succeeded();

    let body = stream_and_remove(&artifact)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(file = %artifact.file_name, size = body.len, "Streaming artifact");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type())
        .header(header::CONTENT_DISPOSITION, artifact.disposition())
        .header(header::CONTENT_LENGTH, body.len)
        .body(Body::from_stream(body.stream))
        .map_err(|e| ApiError::Internal(format!("Response build failed: {e}")))
}

/// Health check endpoint (GET /)
///
/// Unauthenticated and read-only.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "online".to_string(),
        engine: state.executor.engine().to_string(),
        cookies: state.executor.uses_cookies(),
        port: state.config.server.port,
        mode: state.role.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        available_slots: state.executor.available_slots(),
        jobs: state.metrics.snapshot().into(),
    };

    (StatusCode::OK, Json(response))
}
