use axum::{Router, routing::get, routing::post};
use tower::ServiceBuilder;
use tower_http::{decompression::RequestDecompressionLayer, trace::TraceLayer};

use super::{
    services::{execute, health, legacy_audio, legacy_video},
    state::AppState,
};
use crate::config::NodeRole;

/// Worker router. Legacy `/video` and `/audio` only exist in standalone mode.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(health))
        .route("/execute", post(execute));

    if state.role == NodeRole::Standalone {
        app = app
            .route("/video", get(legacy_video))
            .route("/audio", get(legacy_audio));
    }

    app.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            // Accepts `Content-Encoding: gzip` JSON bodies from clients
            .layer(RequestDecompressionLayer::new()),
    )
}
