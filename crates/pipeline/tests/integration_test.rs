//! Integration test for the frame source's failure path — the one piece
//! of `tv-pipeline`'s public surface exercisable without a real camera or
//! video file on the test runner.

use tv_common::VideoSource;
use tv_pipeline::FrameSource;

#[test]
fn opening_a_nonexistent_file_source_fails_cleanly() {
    let source = VideoSource::Path("/nonexistent/path/does-not-exist.mp4".to_string());
    let result = FrameSource::open(&source);
    assert!(result.is_err());
}
