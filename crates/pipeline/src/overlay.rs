//! Frame annotation: bounding boxes, labels, centroid trails, violation
//! banners, FPS readout, and the lane-direction arrow. Colors and geometry
//! match the pipeline this system was distilled from; all of it is a
//! no-op in headless mode since `Pipeline::run` never calls into here
//! unless display is enabled.

use std::collections::HashSet;

use opencv::core::{Point, Scalar};
use opencv::imgproc;

use tv_tracker::TrackedObject;
use tv_violations::ViolationEvent;

// BGR triples, matching OpenCV's channel order.
const COLOR_GREEN: (f64, f64, f64) = (100.0, 255.0, 0.0);
const COLOR_RED: (f64, f64, f64) = (0.0, 0.0, 255.0);
const COLOR_YELLOW: (f64, f64, f64) = (0.0, 220.0, 255.0);
const COLOR_WHITE: (f64, f64, f64) = (255.0, 255.0, 255.0);
const COLOR_VIOLATION_BG: (f64, f64, f64) = (0.0, 0.0, 180.0);

fn scalar_of((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// Draw bounding boxes, class/id/confidence labels, centroid trails, and a
/// banner per new violation onto `frame` in place.
pub fn draw_detections(
    frame: &mut opencv::core::Mat,
    tracked_objects: &[TrackedObject],
    violations: &[ViolationEvent],
) -> opencv::Result<()> {
    let violating_ids: HashSet<u32> = violations.iter().map(|v| v.object_id).collect();

    for obj in tracked_objects {
        let color = if violating_ids.contains(&obj.object_id) {
            COLOR_RED
        } else {
            COLOR_GREEN
        };
        let color_scalar = scalar_of(color);

        imgproc::rectangle(
            frame,
            opencv::core::Rect::new(
                obj.bbox.x1,
                obj.bbox.y1,
                obj.bbox.width(),
                obj.bbox.height(),
            ),
            color_scalar,
            2,
            imgproc::LINE_8,
            0,
        )?;

        let label = format!(
            "{} #{} {:.0}%",
            obj.class_name,
            obj.object_id,
            obj.confidence * 100.0
        );
        imgproc::put_text(
            frame,
            &label,
            Point::new(obj.bbox.x1 + 2, obj.bbox.y1 - 4),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            scalar_of(COLOR_WHITE),
            1,
            imgproc::LINE_AA,
            false,
        )?;

        opencv::imgproc::circle(frame, Point::new(obj.centroid.0, obj.centroid.1), 4, color_scalar, -1, imgproc::LINE_8, 0)?;

        draw_trail(frame, obj, color)?;
    }

    for violation in violations {
        draw_violation_banner(frame, violation)?;
    }

    Ok(())
}

fn draw_trail(
    frame: &mut opencv::core::Mat,
    obj: &TrackedObject,
    color: (f64, f64, f64),
) -> opencv::Result<()> {
    if obj.centroid_history.len() < 2 {
        return Ok(());
    }
    let points: Vec<(i32, i32)> = obj.centroid_history.iter().copied().collect();
    let n = points.len();
    for i in 1..n {
        let alpha = i as f64 / n as f64;
        let faded = scalar_of((color.0 * alpha, color.1 * alpha, color.2 * alpha));
        imgproc::line(
            frame,
            Point::new(points[i - 1].0, points[i - 1].1),
            Point::new(points[i].0, points[i].1),
            faded,
            2,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(())
}

fn draw_violation_banner(
    frame: &mut opencv::core::Mat,
    violation: &ViolationEvent,
) -> opencv::Result<()> {
    use opencv::core::MatTraitConst;

    let text = format!(
        "VIOLATION: {} - Vehicle #{}",
        violation.violation_type, violation.object_id
    );
    let width = frame.cols();

    let original = frame.clone();
    let mut overlay = frame.clone();
    imgproc::rectangle(
        &mut overlay,
        opencv::core::Rect::new(0, 0, width, 40),
        scalar_of(COLOR_VIOLATION_BG),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    opencv::core::add_weighted(&overlay, 0.7, &original, 0.3, 0.0, frame)?;

    imgproc::put_text(
        frame,
        &text,
        Point::new(10, 28),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        scalar_of(COLOR_WHITE),
        2,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(())
}

/// Draw the rolling FPS readout in the bottom-left corner.
pub fn draw_fps(frame: &mut opencv::core::Mat, fps: f64) -> opencv::Result<()> {
    use opencv::core::MatTraitConst;
    let height = frame.rows();
    let text = format!("FPS: {fps:.1}");
    imgproc::put_text(
        frame,
        &text,
        Point::new(10, height - 15),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        scalar_of(COLOR_GREEN),
        2,
        imgproc::LINE_AA,
        false,
    )
}

/// Draw a small arrow in the bottom-right corner showing the configured
/// lane direction.
pub fn draw_lane_direction(frame: &mut opencv::core::Mat, direction: (f64, f64)) -> opencv::Result<()> {
    use opencv::core::MatTraitConst;
    let (w, h) = (frame.cols(), frame.rows());
    let center = Point::new(w - 60, h - 30);
    let endpoint = Point::new(
        center.x + (direction.0 * 30.0) as i32,
        center.y + (direction.1 * 30.0) as i32,
    );

    imgproc::arrowed_line(
        frame,
        center,
        endpoint,
        scalar_of(COLOR_YELLOW),
        2,
        imgproc::LINE_8,
        0,
        0.4,
    )?;
    imgproc::put_text(
        frame,
        "Lane",
        Point::new(w - 90, h - 45),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.4,
        scalar_of(COLOR_YELLOW),
        1,
        imgproc::LINE_AA,
        false,
    )
}
