//! Violation state machines: illegal parking via zone dwell time, and
//! wrong-way driving via sustained motion against a lane direction.
//!
//! Both detectors take the caller's own monotonic clock reading (`now`,
//! seconds) rather than reading the system clock themselves, so cooldown
//! and dwell behavior can be driven deterministically in tests.

pub mod direction;
pub mod zone;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tv_common::ViolationType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub violation_type: ViolationType,
    pub object_id: u32,
    pub confidence: f32,
    pub timestamp: f64,
    pub zone_id: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ViolationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ViolationError>;

pub use direction::DirectionDetector;
pub use zone::ZoneDetector;
