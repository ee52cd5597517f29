//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{
    health_check, needs_transcoding_check, start_transcode, stop_transcode, transcode_status,
    version_check,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Transcoded playlists and segments, one directory per session
    let output = ServeDir::new(state.transcoder.output_root());

    let router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Transcode RPC
        .route("/api/transcode", post(start_transcode).get(transcode_status))
        .route("/api/transcode/stop", post(stop_transcode))
        .route("/api/needs-transcoding", get(needs_transcoding_check))
        .nest_service("/transcode", output)
        .layer(TraceLayer::new_for_http());

    let router = if state.config.cors_enabled {
        // Players load segments cross-origin and seek with Range requests.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
            .allow_headers([
                header::ACCEPT,
                header::RANGE,
                header::CONTENT_TYPE,
                header::ORIGIN,
            ])
            .allow_private_network(true)
            .max_age(Duration::from_secs(3600));
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}
