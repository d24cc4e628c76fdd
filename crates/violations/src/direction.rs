//! Wrong-way driving detection via sustained motion against a lane
//! direction vector.
//!
//! A vehicle's movement vector is computed from the oldest and newest
//! centroid in its tracked history. When that vector points against the
//! configured lane direction for `direction_threshold` consecutive
//! updates, a `WRONG_WAY` violation fires, subject to cooldown.
//!
//! If `direction_zone_polygon` is configured it gates the whole check: a
//! track outside that polygon is treated as having no violation data this
//! update (its counter resets), matching the zone detector's outside-zone
//! behavior.

use std::collections::HashMap;

use serde_json::json;
use tracing::info;

use tv_common::{point_in_polygon, ViolationType};
use tv_tracker::TrackedObject;

use crate::{Result, ViolationError, ViolationEvent};

#[derive(Debug, Clone)]
pub struct DirectionConfig {
    pub lane_direction: (f64, f64),
    pub direction_threshold: u32,
    pub min_displacement: f64,
    pub cooldown_seconds: f64,
    pub direction_zone_polygon: Option<Vec<(i32, i32)>>,
}

pub struct DirectionDetector {
    lane_direction: (f64, f64),
    config: DirectionConfig,
    wrong_way_counts: HashMap<u32, u32>,
    last_alert_time: HashMap<u32, f64>,
}

impl DirectionDetector {
    pub fn new(config: DirectionConfig) -> Result<Self> {
        let (dx, dy) = config.lane_direction;
        let norm = (dx * dx + dy * dy).sqrt();
        if norm == 0.0 {
            return Err(ViolationError::InvalidConfig(
                "lane direction vector cannot be zero".into(),
            ));
        }
        Ok(Self {
            lane_direction: (dx / norm, dy / norm),
            config,
            wrong_way_counts: HashMap::new(),
            last_alert_time: HashMap::new(),
        })
    }

    fn movement_vector(&self, obj: &TrackedObject) -> Option<(f64, f64)> {
        if obj.centroid_history.len() < 2 {
            return None;
        }
        let oldest = *obj.centroid_history.front().unwrap();
        let newest = *obj.centroid_history.back().unwrap();
        let movement = (
            f64::from(newest.0 - oldest.0),
            f64::from(newest.1 - oldest.1),
        );
        let displacement = (movement.0 * movement.0 + movement.1 * movement.1).sqrt();
        if displacement < self.config.min_displacement {
            return None;
        }
        Some(movement)
    }

    /// Check all currently tracked objects for wrong-way violations at
    /// time `now` (monotonic seconds). Returns newly fired violations only.
    pub fn check(&mut self, tracked_objects: &[TrackedObject], now: f64) -> Vec<ViolationEvent> {
        let mut violations = Vec::new();
        let active_ids: std::collections::HashSet<u32> =
            tracked_objects.iter().map(|o| o.object_id).collect();

        for obj in tracked_objects {
            if let Some(polygon) = &self.config.direction_zone_polygon {
                if !point_in_polygon(obj.centroid, polygon) {
                    self.wrong_way_counts.remove(&obj.object_id);
                    continue;
                }
            }

            // Stationary/jitter: neither increment nor reset the streak,
            // just skip the object this frame.
            let Some(movement) = self.movement_vector(obj) else {
                continue;
            };

            let speed_px = (movement.0 * movement.0 + movement.1 * movement.1).sqrt();
            let dot_product = movement.0 * self.lane_direction.0 + movement.1 * self.lane_direction.1;

            if dot_product < 0.0 {
                let count = self.wrong_way_counts.entry(obj.object_id).or_insert(0);
                *count += 1;
                let count = *count;

                if count >= self.config.direction_threshold {
                    let last_alert = self.last_alert_time.get(&obj.object_id).copied().unwrap_or(0.0);
                    if now - last_alert > self.config.cooldown_seconds {
                        let violation = ViolationEvent {
                            violation_type: ViolationType::WrongWay,
                            object_id: obj.object_id,
                            confidence: obj.confidence,
                            timestamp: now,
                            zone_id: None,
                            metadata: json!({
                                "dot_product": dot_product,
                                "movement_vector": [movement.0, movement.1],
                                "speed_px": speed_px,
                                "consecutive_frames": count,
                                "class": obj.class_name,
                                "bbox": obj.bbox.as_tuple(),
                            }),
                        };
                        info!(object_id = obj.object_id, consecutive = count, "WRONG_WAY");
                        violations.push(violation);
                        self.last_alert_time.insert(obj.object_id, now);
                    }
                }
            } else {
                self.wrong_way_counts.remove(&obj.object_id);
            }
        }

        self.wrong_way_counts.retain(|id, _| active_ids.contains(id));
        self.last_alert_time.retain(|id, _| active_ids.contains(id));

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_common::BBox;
    use std::collections::VecDeque;

    fn tracked_with_history(object_id: u32, history: &[(i32, i32)]) -> TrackedObject {
        let (cx, cy) = *history.last().unwrap();
        TrackedObject {
            object_id,
            centroid: (cx, cy),
            bbox: BBox::new(cx - 20, cy - 20, cx + 20, cy + 20),
            class_id: 2,
            class_name: "car".to_string(),
            confidence: 0.9,
            disappeared: 0,
            frame_count: history.len() as u32,
            centroid_history: VecDeque::from(history.to_vec()),
        }
    }

    fn detector(lane_direction: (f64, f64)) -> DirectionDetector {
        DirectionDetector::new(DirectionConfig {
            lane_direction,
            direction_threshold: 3,
            min_displacement: 5.0,
            cooldown_seconds: 0.1,
            direction_zone_polygon: None,
        })
        .unwrap()
    }

    #[test]
    fn zero_lane_direction_is_rejected() {
        let result = DirectionDetector::new(DirectionConfig {
            lane_direction: (0.0, 0.0),
            direction_threshold: 3,
            min_displacement: 5.0,
            cooldown_seconds: 0.1,
            direction_zone_polygon: None,
        });
        assert!(matches!(result, Err(ViolationError::InvalidConfig(_))));
    }

    #[test]
    fn fires_on_sustained_motion_against_lane_direction() {
        // Lane flows "down" (+y); vehicle moves "up" (-y) — wrong way.
        let mut det = detector((0.0, 1.0));
        let mut fired = Vec::new();
        for t in 0..3 {
            let y = 300 - t * 20;
            let obj = tracked_with_history(1, &[(100, y + 20), (100, y)]);
            fired = det.check(&[obj], t as f64);
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].violation_type.to_string(), "WRONG_WAY");
    }

    #[test]
    fn interrupting_wrong_way_motion_resets_counter() {
        let mut det = detector((0.0, 1.0));
        for t in 0..2 {
            let y = 300 - t * 20;
            let obj = tracked_with_history(1, &[(100, y + 20), (100, y)]);
            det.check(&[obj], t as f64);
        }
        // One frame of correct-direction motion resets the streak.
        let correct = tracked_with_history(1, &[(100, 260), (100, 280)]);
        det.check(&[correct], 2.0);

        let wrong = tracked_with_history(1, &[(100, 280), (100, 260)]);
        let fired = det.check(&[wrong], 3.0);
        assert!(fired.is_empty());
    }

    #[test]
    fn stationary_frame_mid_streak_preserves_the_counter() {
        let mut det = detector((0.0, 1.0));
        for t in 0..2 {
            let y = 300 - t * 20;
            let obj = tracked_with_history(1, &[(100, y + 20), (100, y)]);
            det.check(&[obj], t as f64);
        }
        // A jittery/stationary frame (displacement below min_displacement)
        // must be skipped, not treated as a counter reset.
        let stationary = tracked_with_history(1, &[(100, 260), (101, 261)]);
        let fired_stationary = det.check(&[stationary], 2.0);
        assert!(fired_stationary.is_empty());

        // The streak resumes and still reaches threshold on the very next
        // wrong-way frame, proving the counter was preserved.
        let wrong = tracked_with_history(1, &[(100, 260), (100, 240)]);
        let fired = det.check(&[wrong], 3.0);
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn perpendicular_motion_never_fires() {
        let mut det = detector((0.0, 1.0));
        let mut fired = Vec::new();
        for t in 0..5 {
            let x = 100 + t * 20;
            let obj = tracked_with_history(1, &[(x, 300), (x + 20, 300)]);
            fired = det.check(&[obj], t as f64);
        }
        assert!(fired.is_empty());
    }

    #[test]
    fn direction_zone_polygon_gates_tracks_outside_roi() {
        let mut det = DirectionDetector::new(DirectionConfig {
            lane_direction: (0.0, 1.0),
            direction_threshold: 2,
            min_displacement: 5.0,
            cooldown_seconds: 0.1,
            direction_zone_polygon: Some(vec![(0, 0), (50, 0), (50, 50), (0, 50)]),
        })
        .unwrap();

        // Outside the ROI (x=300) — should never accumulate a streak.
        let mut fired = Vec::new();
        for t in 0..5 {
            let y = 300 - t * 20;
            let obj = tracked_with_history(1, &[(300, y + 20), (300, y)]);
            fired = det.check(&[obj], t as f64);
        }
        assert!(fired.is_empty());
    }
}
