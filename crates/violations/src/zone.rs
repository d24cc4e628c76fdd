//! Illegal-parking detection via zone dwell time.
//!
//! A vehicle triggers `ILLEGAL_PARKING` once its centroid has stayed
//! inside the configured polygon for `dwell_threshold` consecutive
//! updates, subject to a per-object cooldown so a single stay doesn't
//! fire repeatedly.

use std::collections::HashMap;

use serde_json::json;
use tracing::info;

use tv_common::{point_in_polygon, ViolationType};
use tv_tracker::TrackedObject;

use crate::{Result, ViolationError, ViolationEvent};

#[derive(Debug, Clone)]
pub struct ZoneConfig {
    pub polygon: Vec<(i32, i32)>,
    pub dwell_threshold: u32,
    pub cooldown_seconds: f64,
    pub zone_id: String,
}

pub struct ZoneDetector {
    config: ZoneConfig,
    dwell_counts: HashMap<u32, u32>,
    last_alert_time: HashMap<u32, f64>,
}

impl ZoneDetector {
    pub fn new(config: ZoneConfig) -> Result<Self> {
        if config.polygon.len() < 3 {
            return Err(ViolationError::InvalidConfig(
                "zone polygon must have at least 3 vertices".into(),
            ));
        }
        Ok(Self {
            config,
            dwell_counts: HashMap::new(),
            last_alert_time: HashMap::new(),
        })
    }

    pub fn polygon(&self) -> &[(i32, i32)] {
        &self.config.polygon
    }

    pub fn is_inside_zone(&self, point: (i32, i32)) -> bool {
        point_in_polygon(point, &self.config.polygon)
    }

    /// Check all currently tracked objects for zone violations at time
    /// `now` (monotonic seconds). Returns newly fired violations only.
    pub fn check(&mut self, tracked_objects: &[TrackedObject], now: f64) -> Vec<ViolationEvent> {
        let mut violations = Vec::new();
        let active_ids: std::collections::HashSet<u32> =
            tracked_objects.iter().map(|o| o.object_id).collect();

        for obj in tracked_objects {
            if self.is_inside_zone(obj.centroid) {
                let count = self.dwell_counts.entry(obj.object_id).or_insert(0);
                *count += 1;
                let count = *count;

                if count >= self.config.dwell_threshold {
                    let last_alert = self.last_alert_time.get(&obj.object_id).copied().unwrap_or(0.0);
                    if now - last_alert > self.config.cooldown_seconds {
                        let violation = ViolationEvent {
                            violation_type: ViolationType::IllegalParking,
                            object_id: obj.object_id,
                            confidence: obj.confidence,
                            timestamp: now,
                            zone_id: Some(self.config.zone_id.clone()),
                            metadata: json!({
                                "dwell_frames": count,
                                "class": obj.class_name,
                                "bbox": obj.bbox.as_tuple(),
                            }),
                        };
                        info!(
                            object_id = obj.object_id,
                            dwell = count,
                            zone = %self.config.zone_id,
                            "ILLEGAL_PARKING"
                        );
                        violations.push(violation);
                        self.last_alert_time.insert(obj.object_id, now);
                    }
                }
            } else {
                self.dwell_counts.remove(&obj.object_id);
            }
        }

        self.dwell_counts.retain(|id, _| active_ids.contains(id));
        self.last_alert_time.retain(|id, _| active_ids.contains(id));

        violations
    }
}
