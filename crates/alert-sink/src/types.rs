//! Wire types for the alert-ingest contract.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/alerts`, as posted by the vision pipeline's alert
/// dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertCreate {
    pub violation_type: String,
    pub confidence: f32,
    pub object_id: u32,
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// The stored/broadcast shape of an alert: the posted fields plus the
/// assigned id and ingest timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub id: u64,
    pub violation_type: String,
    pub confidence: f32,
    pub object_id: u32,
    pub snapshot_path: Option<String>,
    pub zone_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
