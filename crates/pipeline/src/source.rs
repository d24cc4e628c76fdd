//! Frame source: opens a device index, file path, or stream URL via OpenCV's
//! `VideoCapture` and yields BGR frames one at a time.

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use tv_common::VideoSource;

use crate::{PipelineError, Result};

pub struct FrameSource {
    capture: VideoCapture,
}

impl FrameSource {
    /// Open `source`. Fails with `SourceOpenFailed` if the backend cannot
    /// open the device/file/URL at all.
    pub fn open(source: &VideoSource) -> Result<Self> {
        let capture = match source {
            VideoSource::Device(index) => {
                VideoCapture::new(*index, videoio::CAP_ANY).map_err(PipelineError::OpenCv)?
            }
            VideoSource::Path(path) => {
                VideoCapture::from_file(path, videoio::CAP_ANY).map_err(PipelineError::OpenCv)?
            }
        };

        let opened = VideoCapture::is_opened(&capture).map_err(PipelineError::OpenCv)?;
        if !opened {
            return Err(PipelineError::SourceOpenFailed(format!("{source:?}")));
        }

        Ok(Self { capture })
    }

    pub fn frame_size(&self) -> Result<(i32, i32)> {
        let w = self
            .capture
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .map_err(PipelineError::OpenCv)? as i32;
        let h = self
            .capture
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .map_err(PipelineError::OpenCv)? as i32;
        Ok((w, h))
    }

    /// Read the next frame. `Ok(None)` means end-of-stream (treated as a
    /// clean shutdown, not an error); a read error is an `opencv` failure.
    pub fn read(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        self.capture.read(&mut frame).map_err(PipelineError::OpenCv)?;
        if frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    pub fn release(&mut self) -> Result<()> {
        VideoCapture::release(&mut self.capture).map_err(PipelineError::OpenCv)
    }
}
