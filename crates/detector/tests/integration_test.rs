//! Integration tests for detector model resolution against a real
//! temporary directory layout (the unit tests in `src/lib.rs` already
//! cover letterbox arithmetic and class filtering in isolation).

use std::fs;

#[test]
fn load_reports_model_not_found_for_an_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let err = tv_detector::Detector::load(dir.path(), 0.45, (640, 640)).unwrap_err();
    assert!(matches!(err, tv_detector::DetectorError::ModelNotFound(_)));
}

#[test]
fn load_reports_model_load_failure_for_a_non_onnx_file() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("model.onnx");
    fs::write(&bogus, b"not a real onnx model").unwrap();

    let err = tv_detector::Detector::load(&bogus, 0.45, (640, 640)).unwrap_err();
    assert!(matches!(err, tv_detector::DetectorError::ModelLoad(_)));
}
