//! HTTP surface of the live listener.
//!
//! # Responsibilities
//! - Create the Axum Router served by the panel listener
//! - Wire up middleware (tracing, request timeout)
//! - Answer the status probe used to confirm a listener is reachable

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    started: Instant,
    tls: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tls: bool,
    pub uptime_secs: u64,
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(request_timeout: Duration, tls: bool) -> Router {
    let state = Arc::new(AppState {
        started: Instant::now(),
        tls,
    });

    Router::new()
        .route("/api/status", get(status_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tls: state.tls,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn status_reports_ok() {
        let app = build_router(Duration::from_secs(5), false);
        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tls"], false);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let app = build_router(Duration::from_secs(5), false);
        let response = app
            .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
