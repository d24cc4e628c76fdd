//! Violation orchestration: runs both violation detectors, captures
//! evidence snapshots, and dispatches alerts to the sink without blocking
//! the frame loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use opencv::core::{Point, Scalar, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use tv_common::Config;
use tv_tracker::TrackedObject;
use tv_violations::direction::{DirectionConfig, DirectionDetector};
use tv_violations::zone::{ZoneConfig, ZoneDetector};
use tv_violations::{ViolationError, ViolationEvent};

#[derive(Debug, Error)]
pub enum AlertsError {
    #[error(transparent)]
    Config(#[from] ViolationError),

    #[error("failed to create snapshot directory: {0}")]
    SnapshotDir(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AlertsError>;

/// The wire payload posted to `POST /api/alerts`.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub violation_type: String,
    pub confidence: f32,
    pub object_id: u32,
    pub snapshot_path: String,
    pub zone_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl AlertRecord {
    fn from_event(event: &ViolationEvent, snapshot_path: String) -> Self {
        Self {
            violation_type: event.violation_type.to_string(),
            confidence: event.confidence,
            object_id: event.object_id,
            snapshot_path,
            zone_id: event.zone_id.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

/// Background alert dispatcher: accepts `AlertRecord`s over a bounded
/// channel and POSTs them from a dedicated worker thread, so a slow or
/// unreachable sink never stalls the frame loop. Best-effort: failures are
/// logged and dropped, never retried.
struct AlertDispatcher {
    sender: crossbeam_channel::Sender<AlertRecord>,
    /// Kept alongside `sender` (crossbeam channels are MPMC) so `dispatch`
    /// can evict the oldest queued record on a full queue instead of
    /// dropping the incoming one.
    eviction_handle: crossbeam_channel::Receiver<AlertRecord>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl AlertDispatcher {
    fn new(api_base_url: String, capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded::<AlertRecord>(capacity);
        let eviction_handle = receiver.clone();

        let worker = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("alert dispatcher could not start its runtime: {e}");
                    return;
                }
            };

            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("reqwest client construction should never fail with default config");

            while let Ok(record) = receiver.recv() {
                let url = format!("{api_base_url}/api/alerts");
                let result = runtime.block_on(client.post(&url).json(&record).send());
                match result {
                    Ok(resp) if resp.status().is_success() => {
                        info!(
                            violation_type = %record.violation_type,
                            object_id = record.object_id,
                            "alert dispatched"
                        );
                    }
                    Ok(resp) => {
                        warn!("alert dispatch failed: HTTP {}", resp.status());
                    }
                    Err(e) => {
                        warn!("alert dispatch failed (sink unreachable): {e}");
                    }
                }
            }
        });

        Self {
            sender,
            eviction_handle,
            worker: Some(worker),
        }
    }

    /// Enqueue `record`, dropping the oldest queued alert (not the incoming
    /// one) if the bounded queue is full.
    fn dispatch(&self, record: AlertRecord) {
        let mut record = record;
        loop {
            match self.sender.try_send(record) {
                Ok(()) => return,
                Err(crossbeam_channel::TrySendError::Full(rejected)) => {
                    if self.eviction_handle.try_recv().is_ok() {
                        warn!("alert queue full — dropping oldest queued alert");
                    }
                    record = rejected;
                }
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                    warn!("alert dispatcher worker gone — dropping alert");
                    return;
                }
            }
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        // Dropping `sender` (implicitly, as the struct is torn down) closes
        // the channel; the worker's `recv()` loop then exits on its own.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Orchestrates violation detection: runs both checkers, captures
/// snapshots, and dispatches alerts.
pub struct ViolationManager {
    zone_detector: ZoneDetector,
    direction_detector: DirectionDetector,
    snapshot_dir: PathBuf,
    dispatcher: AlertDispatcher,
    total_violations: u64,
    violations_by_type: HashMap<String, u64>,
}

impl ViolationManager {
    pub fn new(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.snapshot_dir).map_err(AlertsError::SnapshotDir)?;

        let zone_detector = ZoneDetector::new(ZoneConfig {
            polygon: config.zone_polygon.clone(),
            dwell_threshold: config.dwell_threshold,
            cooldown_seconds: config.zone_cooldown_seconds,
            zone_id: config.zone_id.clone(),
        })?;

        let direction_detector = DirectionDetector::new(DirectionConfig {
            lane_direction: config.lane_direction,
            direction_threshold: config.direction_threshold,
            min_displacement: config.min_displacement,
            cooldown_seconds: config.direction_cooldown_seconds,
            direction_zone_polygon: config.direction_zone_polygon.clone(),
        })?;

        let dispatcher = AlertDispatcher::new(config.api_base_url.clone(), config.alert_queue_capacity);

        Ok(Self {
            zone_detector,
            direction_detector,
            snapshot_dir: PathBuf::from(&config.snapshot_dir),
            dispatcher,
            total_violations: 0,
            violations_by_type: HashMap::new(),
        })
    }

    pub fn total_violations(&self) -> u64 {
        self.total_violations
    }

    pub fn violations_by_type(&self) -> &HashMap<String, u64> {
        &self.violations_by_type
    }

    /// Run all violation checkers against the current tracked objects and
    /// dispatch any new violations. `frame` is used for snapshot capture;
    /// `now` is the caller's monotonic clock reading in seconds.
    pub fn check_violations(
        &mut self,
        tracked_objects: &[TrackedObject],
        frame: &impl MatLike,
        now: f64,
    ) -> Vec<ViolationEvent> {
        let mut all_violations = self.zone_detector.check(tracked_objects, now);
        all_violations.extend(self.direction_detector.check(tracked_objects, now));

        for violation in &all_violations {
            self.total_violations += 1;
            *self
                .violations_by_type
                .entry(violation.violation_type.to_string())
                .or_insert(0) += 1;

            let snapshot_path = self.capture_snapshot(frame, violation);
            let record = AlertRecord::from_event(violation, snapshot_path);
            self.dispatcher.dispatch(record);
        }

        all_violations
    }

    fn capture_snapshot(&self, frame: &impl MatLike, violation: &ViolationEvent) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!(
            "{}_{}_{}.jpg",
            violation.violation_type, violation.object_id, timestamp
        );
        let filepath: &Path = &self.snapshot_dir.join(&filename);

        if let Err(e) = imgcodecs::imwrite(
            &filepath.to_string_lossy(),
            frame.as_mat(),
            &Vector::new(),
        ) {
            warn!("failed to write snapshot {:?}: {e}", filepath);
        }

        filepath.to_string_lossy().to_string()
    }

    /// Draw the zone polygon overlay onto `frame` in place.
    pub fn draw_overlays(&self, frame: &mut opencv::core::Mat) -> opencv::Result<()> {
        self.zone_detector_draw(frame)
    }

    fn zone_detector_draw(&self, frame: &mut opencv::core::Mat) -> opencv::Result<()> {
        let polygon: Vector<Point> = self
            .zone_polygon()
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect();
        if polygon.len() < 3 {
            return Ok(());
        }
        let original = frame.clone();
        let mut overlay = frame.clone();
        let polys: Vector<Vector<Point>> = Vector::from_iter([polygon.clone()]);
        imgproc::fill_poly(
            &mut overlay,
            &polys,
            Scalar::new(0.0, 255.0, 100.0, 0.0),
            imgproc::LINE_8,
            0,
            Point::new(0, 0),
        )?;
        imgproc::polylines(
            frame,
            &polygon,
            true,
            Scalar::new(0.0, 255.0, 100.0, 0.0),
            2,
            imgproc::LINE_8,
            0,
        )?;
        opencv::core::add_weighted(&overlay, 0.25, &original, 0.75, 0.0, frame)?;
        Ok(())
    }

    fn zone_polygon(&self) -> Vec<(i32, i32)> {
        self.zone_detector.polygon().to_vec()
    }
}

/// Thin abstraction over `opencv::core::Mat` so this crate's unit tests can
/// exercise snapshot-path construction without building a real Mat.
pub trait MatLike {
    fn as_mat(&self) -> &opencv::core::Mat;
}

impl MatLike for opencv::core::Mat {
    fn as_mat(&self) -> &opencv::core::Mat {
        self
    }
}
