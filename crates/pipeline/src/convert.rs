//! Conversion between OpenCV's `Mat` (BGR, packed, row-major) and the
//! `image::RgbImage` the detector expects.

use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;

use crate::{PipelineError, Result};

/// Copy a BGR `Mat` into a freshly allocated RGB image for the detector.
pub fn mat_to_rgb_image(frame: &Mat) -> Result<RgbImage> {
    let width = frame.cols();
    let height = frame.rows();
    if width <= 0 || height <= 0 {
        return Err(PipelineError::MalformedFrame(
            "frame has non-positive dimensions".into(),
        ));
    }

    let bytes = frame.data_bytes().map_err(PipelineError::OpenCv)?;
    let channels = frame.channels();
    if channels != 3 {
        return Err(PipelineError::MalformedFrame(format!(
            "expected a 3-channel BGR frame, got {channels} channels"
        )));
    }

    let (width, height) = (width as u32, height as u32);
    let mut rgb = RgbImage::new(width, height);
    for (dst, src) in rgb.pixels_mut().zip(bytes.chunks_exact(3)) {
        // OpenCV stores BGR; swap to RGB.
        *dst = image::Rgb([src[2], src[1], src[0]]);
    }

    Ok(rgb)
}
