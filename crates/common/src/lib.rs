//! Shared geometry, violation taxonomy, and configuration for the traffic
//! violation engine. Every other crate in this workspace depends on this
//! one; it depends on nothing workspace-local.

use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned bounding box in pixel coordinates, top-left/bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer-truncated center point, matching `(x1+x2)//2, (y1+y2)//2`.
    pub fn centroid(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

/// Even-odd ray-casting point-in-polygon test. Boundary counts as inside,
/// matching `cv2.pointPolygonTest(..., measureDist=False) >= 0` semantics
/// used by both violation detectors.
pub fn point_in_polygon(point: (i32, i32), polygon: &[(i32, i32)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (px, py) = (point.0 as f64, point.1 as f64);
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (polygon[i].0 as f64, polygon[i].1 as f64);
        let (xj, yj) = (polygon[j].0 as f64, polygon[j].1 as f64);

        if point_on_segment(px, py, xi, yi, xj, yj) {
            return true;
        }

        let intersects = ((yi > py) != (yj > py))
            && (px < (xj - xi) * (py - yi) / (yj - yi) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn point_on_segment(px: f64, py: f64, xi: f64, yi: f64, xj: f64, yj: f64) -> bool {
    let cross = (xj - xi) * (py - yi) - (yj - yi) * (px - xi);
    if cross.abs() > 1e-6 {
        return false;
    }
    let dot = (px - xi) * (px - xj) + (py - yi) * (py - yj);
    dot <= 0.0
}

/// The kind of traffic violation detected. `Display` renders the exact
/// wire/filename token (`ILLEGAL_PARKING`, `WRONG_WAY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationType {
    IllegalParking,
    WrongWay,
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationType::IllegalParking => "ILLEGAL_PARKING",
            ViolationType::WrongWay => "WRONG_WAY",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Immutable, fully-validated configuration assembled once at startup.
/// Every field is checked here so downstream components can assume their
/// inputs are sane and never need to return a config-shaped error later.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub input_size: (u32, u32),

    pub video_source: VideoSource,

    pub zone_polygon: Vec<(i32, i32)>,
    pub zone_id: String,
    pub dwell_threshold: u32,
    pub zone_cooldown_seconds: f64,

    pub lane_direction: (f64, f64),
    pub direction_threshold: u32,
    pub min_displacement: f64,
    pub direction_cooldown_seconds: f64,
    pub direction_zone_polygon: Option<Vec<(i32, i32)>>,

    pub snapshot_dir: String,
    pub api_base_url: String,
    pub alert_queue_capacity: usize,

    pub max_disappeared: u32,
    pub max_distance: f64,
    pub centroid_history_len: usize,
}

/// Where frames come from: a device index, a file path, or an RTSP/HTTP URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Device(i32),
    Path(String),
}

impl Config {
    /// Build configuration from environment variables, matching the field
    /// names and defaults of the settings module this system was distilled
    /// from. Every field is validated before the struct is returned — no
    /// partially-valid `Config` escapes this function.
    pub fn from_env() -> Result<Self> {
        let model_path = env::var("MODEL_PATH").unwrap_or_else(|_| "models/yolo26n".to_string());

        let confidence_threshold = parse_env_or("CONFIDENCE_THRESHOLD", 0.45_f32)?;
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ConfigError::InvalidConfig(
                "CONFIDENCE_THRESHOLD must be in [0, 1]".into(),
            ));
        }

        let input_w = parse_env_or("INPUT_WIDTH", 640_u32)?;
        let input_h = parse_env_or("INPUT_HEIGHT", 640_u32)?;
        if input_w == 0 || input_h == 0 {
            return Err(ConfigError::InvalidConfig(
                "INPUT_WIDTH/INPUT_HEIGHT must be positive".into(),
            ));
        }

        let video_source =
            parse_video_source(&env::var("VIDEO_SOURCE").unwrap_or_else(|_| "0".to_string()));

        let zone_polygon = parse_polygon_env("ZONE_POLYGON")?.unwrap_or_default();
        let zone_id = env::var("ZONE_ID").unwrap_or_else(|_| "zone_1".to_string());
        let dwell_threshold = parse_env_or("DWELL_THRESHOLD", 150_u32)?;
        let zone_cooldown_seconds = parse_env_or("ZONE_COOLDOWN_SECONDS", 30.0_f64)?;

        let lane_direction = parse_vec2_env("LANE_DIRECTION")?.unwrap_or((0.0, 1.0));
        if lane_direction.0 == 0.0 && lane_direction.1 == 0.0 {
            return Err(ConfigError::InvalidConfig(
                "LANE_DIRECTION vector cannot be zero".into(),
            ));
        }
        let direction_threshold = parse_env_or("DIRECTION_THRESHOLD", 10_u32)?;
        let min_displacement = parse_env_or("MIN_DISPLACEMENT", 5.0_f64)?;
        let direction_cooldown_seconds = parse_env_or("DIRECTION_COOLDOWN_SECONDS", 30.0_f64)?;
        let direction_zone_polygon = parse_polygon_env("DIRECTION_ZONE_POLYGON")?;

        let snapshot_dir = env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "snapshots".to_string());
        let api_port = env::var("API_PORT").unwrap_or_else(|_| "8000".to_string());
        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{api_port}"));
        let alert_queue_capacity = parse_env_or("ALERT_QUEUE_CAPACITY", 256_usize)?;

        let max_disappeared = parse_env_or("MAX_DISAPPEARED", 30_u32)?;
        let max_distance = parse_env_or("MAX_DISTANCE", 80.0_f64)?;
        if max_distance <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "MAX_DISTANCE must be positive".into(),
            ));
        }
        let centroid_history_len = parse_env_or("CENTROID_HISTORY_LEN", 30_usize)?;

        Ok(Config {
            model_path,
            confidence_threshold,
            input_size: (input_w, input_h),
            video_source,
            zone_polygon,
            zone_id,
            dwell_threshold,
            zone_cooldown_seconds,
            lane_direction,
            direction_threshold,
            min_displacement,
            direction_cooldown_seconds,
            direction_zone_polygon,
            snapshot_dir,
            api_base_url,
            alert_queue_capacity,
            max_disappeared,
            max_distance,
            centroid_history_len,
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidConfig(format!("{key} is not valid: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn parse_video_source(raw: &str) -> VideoSource {
    match raw.parse::<i32>() {
        Ok(idx) => VideoSource::Device(idx),
        Err(_) => VideoSource::Path(raw.to_string()),
    }
}

fn parse_polygon_env(key: &str) -> Result<Option<Vec<(i32, i32)>>> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => {
            let points: Vec<[i32; 2]> = serde_json::from_str(&raw)
                .map_err(|e| ConfigError::InvalidConfig(format!("{key} is not valid JSON: {e}")))?;
            Ok(Some(points.into_iter().map(|p| (p[0], p[1])).collect()))
        }
        Err(_) => Ok(None),
    }
}

fn parse_vec2_env(key: &str) -> Result<Option<(f64, f64)>> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => {
            let v: Vec<f64> = serde_json::from_str(&raw)
                .map_err(|e| ConfigError::InvalidConfig(format!("{key} is not valid JSON: {e}")))?;
            if v.len() != 2 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{key} must be a 2-element array"
                )));
            }
            Ok(Some((v[0], v[1])))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_centroid_truncates_like_floor_division() {
        let b = BBox::new(0, 0, 101, 101);
        assert_eq!(b.centroid(), (50, 50));
    }

    #[test]
    fn point_in_polygon_interior() {
        let square = [(0, 0), (100, 0), (100, 100), (0, 100)];
        assert!(point_in_polygon((50, 50), &square));
    }

    #[test]
    fn point_in_polygon_exterior() {
        let square = [(0, 0), (100, 0), (100, 100), (0, 100)];
        assert!(!point_in_polygon((150, 50), &square));
    }

    #[test]
    fn point_in_polygon_boundary_counts_as_inside() {
        let square = [(0, 0), (100, 0), (100, 100), (0, 100)];
        assert!(point_in_polygon((0, 50), &square));
        assert!(point_in_polygon((100, 100), &square));
    }

    #[test]
    fn violation_type_display_matches_wire_tokens() {
        assert_eq!(ViolationType::IllegalParking.to_string(), "ILLEGAL_PARKING");
        assert_eq!(ViolationType::WrongWay.to_string(), "WRONG_WAY");
    }

    #[test]
    fn zero_lane_direction_is_rejected() {
        std::env::set_var("LANE_DIRECTION", "[0.0, 0.0]");
        let result = Config::from_env();
        std::env::remove_var("LANE_DIRECTION");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn video_source_parses_device_index_or_path() {
        assert_eq!(parse_video_source("0"), VideoSource::Device(0));
        assert_eq!(
            parse_video_source("rtsp://example/stream"),
            VideoSource::Path("rtsp://example/stream".to_string())
        );
    }
}
