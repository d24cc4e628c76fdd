//! The per-frame pipeline: opens a video source, then drives
//! detect → track → check-violations → annotate → display for every frame
//! until end-of-stream, a frame cap, or an operator quit.

mod convert;
mod fps;
mod overlay;
mod source;

use std::time::Instant;

use opencv::highgui;
use opencv::prelude::*;
use thiserror::Error;
use tracing::{error, info};

use tv_alerts::{AlertsError, ViolationManager};
use tv_common::Config;
use tv_detector::{Detector, DetectorError};
use tv_tracker::CentroidTracker;

pub use fps::FpsEstimator;
pub use source::FrameSource;

const WINDOW_NAME: &str = "Traffic Violation System";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("failed to open video source: {0}")]
    SourceOpenFailed(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Alerts(#[from] AlertsError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Wires `VideoCapture → Detector → CentroidTracker → ViolationManager →
/// (optional) display` and runs it to completion.
pub struct Pipeline {
    source: FrameSource,
    detector: Detector,
    tracker: CentroidTracker,
    violation_manager: ViolationManager,
    lane_direction: (f64, f64),
    fps: FpsEstimator,
    display: bool,
    max_frames: Option<u64>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        source: FrameSource,
        detector: Detector,
        tracker: CentroidTracker,
        violation_manager: ViolationManager,
        display: bool,
    ) -> Self {
        Self {
            source,
            detector,
            tracker,
            violation_manager,
            lane_direction: config.lane_direction,
            fps: FpsEstimator::new(),
            display,
            max_frames: None,
        }
    }

    /// Cap the number of frames processed before the loop exits on its own;
    /// mainly useful for tests and smoke runs against a file source.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Run the pipeline until end-of-stream, the frame cap, or an operator
    /// quit (`q` or Escape, only polled when `display` is enabled).
    pub fn run(mut self) -> Result<()> {
        let (width, height) = self.source.frame_size()?;
        info!(width, height, "pipeline started");

        let start = Instant::now();
        let mut frame_count: u64 = 0;
        let mut quit_requested = false;

        let result = (|| -> Result<()> {
            loop {
                let Some(mut frame) = self.source.read()? else {
                    info!("end of video stream");
                    break;
                };

                frame_count += 1;
                if let Some(max) = self.max_frames {
                    if frame_count > max {
                        break;
                    }
                }

                let rgb = convert::mat_to_rgb_image(&frame)?;
                let detections = self.detector.detect(&rgb)?;
                let tracked_objects = self.tracker.update(&detections);

                let now = start.elapsed().as_secs_f64();
                let violations = self
                    .violation_manager
                    .check_violations(&tracked_objects, &frame, now);

                if self.display {
                    let current_fps = self.fps.tick(Instant::now());

                    self.violation_manager.draw_overlays(&mut frame)?;
                    overlay::draw_detections(&mut frame, &tracked_objects, &violations)?;
                    overlay::draw_fps(&mut frame, current_fps)?;
                    overlay::draw_lane_direction(&mut frame, self.lane_direction)?;

                    highgui::imshow(WINDOW_NAME, &frame)?;

                    let key = highgui::wait_key(1)? & 0xFF;
                    if key == 'q' as i32 || key == 27 {
                        info!("user quit");
                        quit_requested = true;
                        break;
                    }
                }
            }
            Ok(())
        })();

        self.source.release()?;
        if self.display {
            highgui::destroy_all_windows()?;
        }

        info!(
            frames_processed = frame_count,
            violations = self.violation_manager.total_violations(),
            quit_requested,
            "pipeline stopped"
        );

        if let Err(ref e) = result {
            error!("pipeline loop exited with an error: {e}");
        }
        result
    }
}
