//! Vehicle detector: loads an ONNX-exported detection model and runs
//! letterboxed inference per frame. The model is assumed NMS-free — its
//! own output is already de-duplicated, so no suppression pass runs here.
//!
//! Only four COCO-style classes are ever returned: car, motorcycle, bus,
//! truck. Everything else is discarded during postprocessing.

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::Array;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{Session, SessionOutputs};
use ort::value::TensorRef;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use tv_common::BBox;

/// `(class_id, class_name)` pairs this detector recognizes. Anything else
/// the model predicts is dropped in `postprocess`.
pub const VEHICLE_CLASSES: &[(u8, &str)] = &[(2, "car"), (3, "motorcycle"), (5, "bus"), (7, "truck")];

fn vehicle_class_name(class_id: u8) -> Option<&'static str> {
    VEHICLE_CLASSES
        .iter()
        .find(|(id, _)| *id == class_id)
        .map(|(_, name)| *name)
}

/// A single vehicle found in one frame. Not deserialized anywhere in this
/// workspace — `class_name` is a `&'static str` into `VEHICLE_CLASSES`,
/// which only round-trips through `Serialize`.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub bbox: BBox,
    pub class_id: u8,
    pub class_name: &'static str,
    pub confidence: f32,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no model file (.xml or .onnx) found in {0}")]
    ModelNotFound(PathBuf),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("onnx runtime error: {0}")]
    OnnxRuntime(#[from] ort::Error),
}

pub type Result<T> = std::result::Result<T, DetectorError>;

/// Letterbox-aware vehicle detector wrapping a single ONNX Runtime session.
pub struct Detector {
    session: Session,
    confidence_threshold: f32,
    input_size: (u32, u32),
}

impl Detector {
    /// Resolve `model_path` to a concrete model file and load it.
    ///
    /// If `model_path` is itself a file it is used directly. Otherwise the
    /// directory is searched for a `.xml` file first, then a `.onnx` file.
    /// The `.xml` search exists for interface fidelity with IR-based model
    /// directories; only `.onnx` files actually load through `ort`.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        confidence_threshold: f32,
        input_size: (u32, u32),
    ) -> Result<Self> {
        let resolved = resolve_model_path(model_path.as_ref())?;
        info!("loading detector model from {:?}", resolved);

        // CPU-only: this model is as incompatible with GPU/CoreML
        // acceleration as the teacher's own YOLO session, per
        // `create_cpu_only_session`'s precedent.
        let session = Session::builder()
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .commit_from_file(&resolved)
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;

        info!("detector model loaded");

        Ok(Self {
            session,
            confidence_threshold,
            input_size,
        })
    }

    /// Run detection on a single RGB frame, returning vehicle detections in
    /// the frame's original pixel coordinates.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let (orig_w, orig_h) = (frame.width(), frame.height());
        let (input, scale, pad_x, pad_y) = preprocess(frame, self.input_size);

        let input_tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectorError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let detections = postprocess(
            &outputs,
            scale,
            (pad_x, pad_y),
            (orig_w, orig_h),
            self.confidence_threshold,
        )?;

        debug!("detected {} vehicles", detections.len());
        Ok(detections)
    }
}

fn resolve_model_path(model_path: &Path) -> Result<PathBuf> {
    if model_path.is_file() {
        return Ok(model_path.to_path_buf());
    }

    for ext in ["xml", "onnx"] {
        if let Ok(entries) = std::fs::read_dir(model_path) {
            let mut candidates: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
                .collect();
            candidates.sort();
            if let Some(first) = candidates.into_iter().next() {
                return Ok(first);
            }
        }
    }

    Err(DetectorError::ModelNotFound(model_path.to_path_buf()))
}

/// Letterbox-resize `frame` to `input_size`, returning the CHW/NCHW input
/// tensor plus the scale factor and padding applied so detections can be
/// mapped back to the original frame.
fn preprocess(
    frame: &RgbImage,
    input_size: (u32, u32),
) -> (Array<f32, ndarray::Dim<[usize; 4]>>, f64, i32, i32) {
    let (target_w, target_h) = input_size;
    let (w, h) = (frame.width(), frame.height());

    let scale = (f64::from(target_w) / f64::from(w)).min(f64::from(target_h) / f64::from(h));
    let new_w = (f64::from(w) * scale) as u32;
    let new_h = (f64::from(h) * scale) as u32;

    let resized = image::imageops::resize(frame, new_w, new_h, image::imageops::FilterType::Triangle);

    let pad_x = (target_w - new_w) / 2;
    let pad_y = (target_h - new_h) / 2;

    let mut input = Array::from_elem(
        (1, 3, target_h as usize, target_w as usize),
        114.0_f32 / 255.0,
    );

    for y in 0..new_h {
        for x in 0..new_w {
            let pixel = resized.get_pixel(x, y);
            let (cy, cx) = ((y + pad_y) as usize, (x + pad_x) as usize);
            input[[0, 0, cy, cx]] = f32::from(pixel[0]) / 255.0;
            input[[0, 1, cy, cx]] = f32::from(pixel[1]) / 255.0;
            input[[0, 2, cy, cx]] = f32::from(pixel[2]) / 255.0;
        }
    }

    (input, scale, pad_x as i32, pad_y as i32)
}

fn postprocess(
    outputs: &SessionOutputs,
    scale: f64,
    pad: (i32, i32),
    original_size: (u32, u32),
    confidence_threshold: f32,
) -> Result<Vec<Detection>> {
    let (pad_x, pad_y) = pad;
    let (orig_w, orig_h) = (original_size.0 as i32, original_size.1 as i32);

    let output = &outputs[0];
    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| DetectorError::Inference(format!("failed to extract tensor: {e}")))?;

    let dims = shape.as_ref();
    if dims.len() != 3 {
        return Err(DetectorError::Inference(format!(
            "expected 3D output tensor, got {}D",
            dims.len()
        )));
    }

    // (1, 4+num_classes, num_anchors); some exports emit (1, num_anchors, 4+num_classes)
    // instead — detect by which axis is smaller, mirroring the Python transpose check.
    let (num_features, num_anchors, transposed) = if dims[1] < dims[2] {
        (dims[1] as usize, dims[2] as usize, false)
    } else {
        (dims[2] as usize, dims[1] as usize, true)
    };
    let num_classes = num_features - 4;

    let get_feature = |feature_idx: usize, anchor_idx: usize| -> f32 {
        if transposed {
            data[anchor_idx * num_features + feature_idx]
        } else {
            data[feature_idx * num_anchors + anchor_idx]
        }
    };

    let mut detections = Vec::new();

    for anchor_idx in 0..num_anchors {
        let cx = get_feature(0, anchor_idx);
        let cy = get_feature(1, anchor_idx);
        let bw = get_feature(2, anchor_idx);
        let bh = get_feature(3, anchor_idx);

        let mut class_id = 0usize;
        let mut confidence = f32::MIN;
        for c in 0..num_classes {
            let score = get_feature(4 + c, anchor_idx);
            if score > confidence {
                confidence = score;
                class_id = c;
            }
        }

        if confidence < confidence_threshold {
            continue;
        }
        let Some(class_name) = vehicle_class_name(class_id as u8) else {
            continue;
        };

        let x1 = f64::from(cx - bw / 2.0);
        let y1 = f64::from(cy - bh / 2.0);
        let x2 = f64::from(cx + bw / 2.0);
        let y2 = f64::from(cy + bh / 2.0);

        let x1 = ((x1 - f64::from(pad_x)) / scale) as i32;
        let y1 = ((y1 - f64::from(pad_y)) / scale) as i32;
        let x2 = ((x2 - f64::from(pad_x)) / scale) as i32;
        let y2 = ((y2 - f64::from(pad_y)) / scale) as i32;

        let x1 = x1.clamp(0, orig_w - 1);
        let y1 = y1.clamp(0, orig_h - 1);
        let x2 = x2.clamp(0, orig_w - 1);
        let y2 = y2.clamp(0, orig_h - 1);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        detections.push(Detection {
            bbox: BBox::new(x1, y1, x2, y2),
            class_id: class_id as u8,
            class_name,
            confidence,
        });
    }

    Ok(detections)
}
