//! Multi-object tracker built on greedy centroid-distance association —
//! no Kalman filter, no IoU, no appearance model. Each tracked object
//! carries a bounded history of past centroids for downstream direction
//! analysis.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tv_common::BBox;
use tv_detector::Detection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedObject {
    pub object_id: u32,
    pub centroid: (i32, i32),
    pub bbox: BBox,
    pub class_id: u8,
    pub class_name: String,
    pub confidence: f32,
    pub disappeared: u32,
    pub frame_count: u32,
    pub centroid_history: VecDeque<(i32, i32)>,
}

impl TrackedObject {
    fn new(object_id: u32, detection: &Detection, history_len: usize) -> Self {
        let centroid = detection.bbox.centroid();
        let mut centroid_history = VecDeque::with_capacity(history_len);
        centroid_history.push_back(centroid);
        Self {
            object_id,
            centroid,
            bbox: detection.bbox,
            class_id: detection.class_id,
            class_name: detection.class_name.to_string(),
            confidence: detection.confidence,
            disappeared: 0,
            frame_count: 0,
            centroid_history,
        }
    }

    fn apply_match(&mut self, detection: &Detection, history_len: usize) {
        self.centroid = detection.bbox.centroid();
        self.bbox = detection.bbox;
        self.confidence = detection.confidence;
        self.disappeared = 0;
        self.frame_count += 1;
        if self.centroid_history.len() >= history_len {
            self.centroid_history.pop_front();
        }
        self.centroid_history.push_back(self.centroid);
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub max_disappeared: u32,
    pub max_distance: f64,
    pub history_len: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_disappeared: 30,
            max_distance: 80.0,
            history_len: 30,
        }
    }
}

/// Centroid-association tracker. Registers a new id for every detection
/// that can't be matched to an existing track, and deregisters tracks that
/// go unmatched for more than `max_disappeared` consecutive updates.
pub struct CentroidTracker {
    config: TrackerConfig,
    tracks: Vec<TrackedObject>,
    next_id: u32,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Number of tracks currently active (not yet deregistered).
    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn active_ids(&self) -> Vec<u32> {
        self.tracks.iter().map(|t| t.object_id).collect()
    }

    /// Discard all tracks and reset the id counter.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 0;
    }

    fn register(&mut self, detection: &Detection) {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks
            .push(TrackedObject::new(id, detection, self.config.history_len));
    }

    /// Advance the tracker by one frame's worth of detections, returning a
    /// snapshot of every track still active after this update.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedObject> {
        if detections.is_empty() {
            for track in &mut self.tracks {
                track.disappeared += 1;
            }
            self.tracks
                .retain(|t| t.disappeared <= self.config.max_disappeared);
            return self.tracks.clone();
        }

        if self.tracks.is_empty() {
            for detection in detections {
                self.register(detection);
            }
            return self.tracks.clone();
        }

        let n_tracks = self.tracks.len();
        let n_dets = detections.len();
        let mut distances = vec![vec![0.0_f64; n_dets]; n_tracks];
        for (i, track) in self.tracks.iter().enumerate() {
            for (j, detection) in detections.iter().enumerate() {
                distances[i][j] = euclidean(track.centroid, detection.bbox.centroid());
            }
        }

        let mut row_order: Vec<usize> = (0..n_tracks).collect();
        row_order.sort_by(|&a, &b| {
            let min_a = distances[a].iter().cloned().fold(f64::INFINITY, f64::min);
            let min_b = distances[b].iter().cloned().fold(f64::INFINITY, f64::min);
            min_a.partial_cmp(&min_b).unwrap_or(std::cmp::Ordering::Equal)
        });

        let cols: Vec<usize> = row_order
            .iter()
            .map(|&row| {
                let mut best_col = 0;
                let mut best_dist = f64::INFINITY;
                for (col, &d) in distances[row].iter().enumerate() {
                    if d < best_dist {
                        best_dist = d;
                        best_col = col;
                    }
                }
                best_col
            })
            .collect();

        let mut used_rows = vec![false; n_tracks];
        let mut used_cols = vec![false; n_dets];

        for (&row, &col) in row_order.iter().zip(cols.iter()) {
            if used_rows[row] || used_cols[col] {
                continue;
            }
            if distances[row][col] > self.config.max_distance {
                continue;
            }
            self.tracks[row].apply_match(&detections[col], self.config.history_len);
            used_rows[row] = true;
            used_cols[col] = true;
        }

        for row in 0..n_tracks {
            if !used_rows[row] {
                self.tracks[row].disappeared += 1;
            }
        }
        self.tracks
            .retain(|t| t.disappeared <= self.config.max_disappeared);

        for col in 0..n_dets {
            if !used_cols[col] {
                self.register(&detections[col]);
            }
        }

        debug!("tracker active={}", self.tracks.len());
        self.tracks.clone()
    }
}

fn euclidean(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(a.0 - b.0);
    let dy = f64::from(a.1 - b.1);
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_common::BBox;

    fn det(cx: i32, cy: i32, class_id: u8, class_name: &'static str) -> Detection {
        Detection {
            bbox: BBox::new(cx - 10, cy - 10, cx + 10, cy + 10),
            class_id,
            class_name,
            confidence: 0.9,
        }
    }

    #[test]
    fn registers_new_objects_on_first_update() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        let tracks = tracker.update(&[det(10, 10, 2, "car"), det(200, 200, 7, "truck")]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracker.active_count(), 2);
    }

    #[test]
    fn persists_id_across_small_drift() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        tracker.update(&[det(100, 100, 2, "car")]);
        let tracks = tracker.update(&[det(105, 103, 2, "car")]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].object_id, 0);
        assert_eq!(tracks[0].frame_count, 1);
    }

    #[test]
    fn deregisters_after_max_disappeared_frames() {
        let mut tracker = CentroidTracker::new(TrackerConfig {
            max_disappeared: 2,
            ..TrackerConfig::default()
        });
        tracker.update(&[det(50, 50, 2, "car")]);
        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.active_count(), 1);
        tracker.update(&[]);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn distinct_far_apart_detections_get_distinct_ids() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        tracker.update(&[det(10, 10, 2, "car")]);
        let tracks = tracker.update(&[det(10, 10, 2, "car"), det(500, 500, 2, "car")]);
        assert_eq!(tracks.len(), 2);
        let ids: Vec<u32> = tracks.iter().map(|t| t.object_id).collect();
        assert!(ids.contains(&0));
        assert!(ids.contains(&1));
    }

    #[test]
    fn centroid_history_bounded_by_history_len() {
        let mut tracker = CentroidTracker::new(TrackerConfig {
            history_len: 3,
            ..TrackerConfig::default()
        });
        for i in 0..10 {
            tracker.update(&[det(100 + i, 100, 2, "car")]);
        }
        let tracks = tracker.update(&[det(110, 100, 2, "car")]);
        assert!(tracks[0].centroid_history.len() <= 3);
    }

    #[test]
    fn reset_clears_tracks_and_id_counter() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        tracker.update(&[det(10, 10, 2, "car")]);
        tracker.reset();
        assert_eq!(tracker.active_count(), 0);
        let tracks = tracker.update(&[det(10, 10, 2, "car")]);
        assert_eq!(tracks[0].object_id, 0);
    }
}
