//! Integration tests for the centroid tracker's public API, exercising
//! the concrete scenarios from the violation-engine scenario catalogue.

use tv_common::BBox;
use tv_detector::Detection;
use tv_tracker::{CentroidTracker, TrackerConfig};

fn detection(x1: i32, y1: i32, x2: i32, y2: i32, class_id: u8, class_name: &'static str) -> Detection {
    Detection {
        bbox: BBox::new(x1, y1, x2, y2),
        class_id,
        class_name,
        confidence: 0.9,
    }
}

#[test]
fn two_objects_persist_ids_across_slight_drift() {
    let mut tracker = CentroidTracker::new(TrackerConfig::default());

    let frame1 = vec![
        detection(100, 200, 200, 300, 2, "car"),
        detection(400, 300, 500, 400, 7, "truck"),
    ];
    let tracks1 = tracker.update(&frame1);
    assert_eq!(tracks1.len(), 2);
    let ids1: Vec<u32> = {
        let mut v: Vec<u32> = tracks1.iter().map(|t| t.object_id).collect();
        v.sort();
        v
    };
    assert_eq!(ids1, vec![0, 1]);

    let frame2 = vec![
        detection(110, 205, 210, 305, 2, "car"),
        detection(410, 305, 510, 405, 7, "truck"),
    ];
    let tracks2 = tracker.update(&frame2);
    assert_eq!(tracks2.len(), 2);
    let ids2: Vec<u32> = {
        let mut v: Vec<u32> = tracks2.iter().map(|t| t.object_id).collect();
        v.sort();
        v
    };
    assert_eq!(ids1, ids2);
    for track in &tracks2 {
        assert_eq!(track.centroid_history.len(), 2);
    }
}

#[test]
fn deregistration_after_max_disappeared_frames() {
    let mut tracker = CentroidTracker::new(TrackerConfig {
        max_disappeared: 30,
        ..TrackerConfig::default()
    });

    tracker.update(&[detection(100, 200, 200, 300, 2, "car")]);
    for _ in 0..30 {
        tracker.update(&[]);
    }
    assert_eq!(tracker.active_count(), 1);

    tracker.update(&[]);
    assert_eq!(tracker.active_count(), 0);
}

#[test]
fn empty_frame_idempotence_restores_id_at_same_centroid() {
    let mut tracker = CentroidTracker::new(TrackerConfig {
        max_disappeared: 10,
        ..TrackerConfig::default()
    });

    let tracks = tracker.update(&[detection(100, 100, 140, 140, 2, "car")]);
    let original_id = tracks[0].object_id;

    for _ in 0..10 {
        tracker.update(&[]);
    }

    let restored = tracker.update(&[detection(100, 100, 140, 140, 2, "car")]);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].object_id, original_id);
}
