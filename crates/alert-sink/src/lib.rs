//! Alert sink: the HTTP/WebSocket collaborator the vision pipeline posts
//! violation alerts to. Scope is deliberately narrow — ingest and live
//! broadcast only; listing, filtering, and stats endpoints are a dashboard
//! concern this crate doesn't implement.

mod handlers;
mod types;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::*;
pub use types::*;

const BROADCAST_CAPACITY: usize = 256;

/// Shared server state: an id counter and a broadcast channel fanning
/// every accepted alert out to connected dashboards.
#[derive(Clone)]
pub struct AlertSinkState {
    next_id: Arc<AtomicU64>,
    alerts: tokio::sync::broadcast::Sender<AlertResponse>,
}

impl AlertSinkState {
    #[must_use]
    pub fn new() -> Self {
        let (alerts, _) = tokio::sync::broadcast::channel(BROADCAST_CAPACITY);
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            alerts,
        }
    }
}

impl Default for AlertSinkState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_router(state: AlertSinkState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/alerts", post(create_alert))
        .route("/api/ws/alerts", get(ws_alerts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(addr: &str, state: AlertSinkState) -> Result<(), std::io::Error> {
    tracing::info!("starting alert sink on {addr}");
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn accepted_alert_gets_an_id_and_timestamp() {
        let state = AlertSinkState::new();
        let app = build_router(state);

        let body = serde_json::json!({
            "violation_type": "ILLEGAL_PARKING",
            "confidence": 0.91,
            "object_id": 7,
            "zone_id": "zone_1"
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/alerts")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: AlertResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.id, 1);
        assert_eq!(parsed.object_id, 7);
    }

    #[tokio::test]
    async fn health_check_reports_ok() {
        let state = AlertSinkState::new();
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
