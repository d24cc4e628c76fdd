//! HTTP and WebSocket handlers for the alert-ingest surface.

use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, warn};

use crate::{AlertCreate, AlertResponse, AlertSinkState, HealthResponse};

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// `POST /api/alerts` — accept a violation alert from the vision pipeline,
/// assign it an id and timestamp, and fan it out to any connected
/// dashboards over the WebSocket broadcast channel.
pub async fn create_alert(
    State(state): State<AlertSinkState>,
    Json(alert): Json<AlertCreate>,
) -> impl IntoResponse {
    let id = state.next_id.fetch_add(1, Ordering::Relaxed);
    let response = AlertResponse {
        id,
        violation_type: alert.violation_type,
        confidence: alert.confidence,
        object_id: alert.object_id,
        snapshot_path: alert.snapshot_path,
        zone_id: alert.zone_id,
        metadata: alert.metadata,
        timestamp: chrono::Utc::now(),
    };

    info!(
        id,
        violation_type = %response.violation_type,
        object_id = response.object_id,
        "alert received"
    );

    // A send error just means no dashboard is currently listening; the
    // alert is still accepted and acknowledged.
    let _ = state.alerts.send(response.clone());

    (StatusCode::CREATED, Json(response))
}

/// `GET /api/ws/alerts` — upgrade to a WebSocket and stream every alert
/// received from the moment of connection onward.
pub async fn ws_alerts(
    ws: WebSocketUpgrade,
    State(state): State<AlertSinkState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AlertSinkState) {
    let mut receiver = state.alerts.subscribe();
    info!("dashboard connected");

    loop {
        tokio::select! {
            alert = receiver.recv() => {
                let alert = match alert {
                    Ok(alert) => alert,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("dashboard lagged, skipped {skipped} alerts");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let payload = match serde_json::to_string(&alert) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("failed to serialize alert for websocket: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                // Dashboards don't send anything meaningful; a closed or
                // errored recv means the client hung up.
                if incoming.is_none() {
                    break;
                }
            }
        }
    }

    info!("dashboard disconnected");
}
