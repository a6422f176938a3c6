//! Master node: worker registry plus a streaming proxy to `/execute`.
//!
//! ## Routes
//! - `POST /cluster/ping` worker announcements `{url, secret}`
//! - `GET /cluster/workers` live workers (requires `X-Cluster-Secret`)
//! - `POST /download` forwards an execute body to the next live worker
//! - `GET /` health

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{decompression::RequestDecompressionLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::registry::WorkerRegistry;
use crate::api::models::{Announcement, ExecuteRequest, MasterHealthResponse, WorkerView};
use crate::api::utils::read_json;
use crate::api::validation::job_from_execute;
use crate::api::{ApiError, AuthPolicy, ClusterSecret, SECRET_HEADER};
use crate::config::{NodeRole, is_http_url};

/// Headers copied from the worker's response to the client
const FORWARDED_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_TYPE,
    header::CONTENT_DISPOSITION,
    header::CONTENT_LENGTH,
];

#[derive(Clone)]
pub struct MasterState {
    pub registry: Arc<WorkerRegistry>,
    secret: ClusterSecret,
    client: reqwest::Client,
    max_request_bytes: usize,
}

impl MasterState {
    /// `connect_timeout` bounds reaching a worker; the download itself is not
    /// time limited here since the worker enforces its own deadline.
    pub fn new(
        registry: Arc<WorkerRegistry>,
        secret: ClusterSecret,
        connect_timeout: Duration,
        max_request_bytes: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            registry,
            secret,
            client,
            max_request_bytes,
        })
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        AuthPolicy::SharedSecret(self.secret.clone()).authorize(headers)
    }
}

pub fn router(state: MasterState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/cluster/ping", post(ping))
        .route("/cluster/workers", get(workers))
        .route("/download", post(download))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestDecompressionLayer::new()),
        )
}

async fn ping(
    State(state): State<MasterState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let announcement: Announcement = read_json(&headers, body, state.max_request_bytes).await?;

    if !state.secret.matches(&announcement.secret) {
        warn!(worker = %announcement.url, "Rejected announcement with bad cluster secret");
        return Err(ApiError::Unauthorized);
    }
    if !is_http_url(&announcement.url) {
        return Err(ApiError::BadRequest(format!(
            "worker url must be an absolute http(s) URL, got: {}",
            announcement.url
        )));
    }

    state.registry.record(&announcement.url).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn workers(
    State(state): State<MasterState>,
    headers: HeaderMap,
) -> Result<Json<Vec<WorkerView>>, ApiError> {
    state.authorize(&headers)?;

    let live = state
        .registry
        .live_workers()
        .await
        .into_iter()
        .map(|(url, age)| WorkerView {
            url,
            last_seen_secs: age.as_secs(),
        })
        .collect();

    Ok(Json(live))
}

/// Proxy (POST /download)
///
/// The body is validated here so malformed requests never reach a worker.
/// Worker status, content headers and body are streamed back unchanged,
/// including worker-side errors.
async fn download(
    State(state): State<MasterState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let request: ExecuteRequest = read_json(&headers, body, state.max_request_bytes).await?;
    job_from_execute(&request)?;

    let worker = state.registry.pick().await.ok_or(ApiError::NoWorkers)?;
    info!(%worker, kind = %request.kind, url = %request.url, "Forwarding download");

    let upstream = state
        .client
        .post(format!("{worker}/execute"))
        .header(SECRET_HEADER, state.secret.expose())
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            warn!(%worker, error = %e, "Worker unreachable");
            ApiError::Upstream(worker.clone())
        })?;

    let mut response = Response::builder().status(upstream.status());
    for name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            response = response.header(name, value.clone());
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::Internal(format!("Response build failed: {e}")))
}

async fn health(State(state): State<MasterState>) -> impl IntoResponse {
    let response = MasterHealthResponse {
        status: "online".to_string(),
        role: NodeRole::Master.to_string(),
        workers: state.registry.live_workers().await.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn state() -> MasterState {
        MasterState::new(
            Arc::new(WorkerRegistry::new(Duration::from_secs(60))),
            ClusterSecret::new("s3cret"),
            Duration::from_secs(1),
            16 * 1024,
        )
        .unwrap()
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping_with_bad_secret_is_forbidden() {
        let state = state();
        let app = router(state.clone());

        let response = app
            .oneshot(json_post(
                "/cluster/ping",
                serde_json::json!({"url": "http://w1:4001", "secret": "nope"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(state.registry.live_workers().await.is_empty());
    }

    #[tokio::test]
    async fn test_ping_rejects_non_http_url() {
        let app = router(state());
        let response = app
            .oneshot(json_post(
                "/cluster/ping",
                serde_json::json!({"url": "ftp://w1", "secret": "s3cret"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ping_then_list_workers() {
        let state = state();
        let response = router(state.clone())
            .oneshot(json_post(
                "/cluster/ping",
                serde_json::json!({"url": "http://w1:4001", "secret": "s3cret"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/cluster/workers")
                    .header(SECRET_HEADER, "s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let workers: Vec<WorkerView> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].url, "http://w1:4001");
    }

    #[tokio::test]
    async fn test_workers_requires_secret() {
        let response = router(state())
            .oneshot(Request::builder().uri("/cluster/workers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_download_without_workers_is_503() {
        let response = router(state())
            .oneshot(json_post(
                "/download",
                serde_json::json!({"type": "audio", "url": "https://example.com/v"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NO_WORKERS");
    }

    #[tokio::test]
    async fn test_download_validates_before_routing() {
        let state = state();
        state.registry.record("http://w1:4001").await;

        let response = router(state)
            .oneshot(json_post("/download", serde_json::json!({"type": "video"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_to_dead_worker_is_502() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let state = state();
        state.registry.record(&format!("http://{addr}")).await;

        let response = router(state)
            .oneshot(json_post(
                "/download",
                serde_json::json!({"type": "audio", "url": "https://example.com/v"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
