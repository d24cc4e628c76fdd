//! Binary entry point: loads configuration, constructs the detector,
//! tracker, and violation manager, then hands them to the pipeline loop.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::error;

use tv_alerts::ViolationManager;
use tv_common::{Config, VideoSource};
use tv_detector::Detector;
use tv_pipeline::{FrameSource, Pipeline};
use tv_tracker::{CentroidTracker, TrackerConfig};

#[derive(Parser)]
#[command(
    name = "traffic-violation-engine",
    version,
    about = "Detects illegal parking and wrong-way driving from a video stream"
)]
struct Cli {
    /// Override `VIDEO_SOURCE`: a device index, file path, or stream URL.
    #[arg(long)]
    source: Option<String>,

    /// Run headless: no display window, overlays, or key polling.
    #[arg(long)]
    no_display: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Load `KEY=VALUE` configuration overrides from this file before
    /// reading the environment. Values already set in the environment take
    /// precedence over the file — the file only fills gaps.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    if let Some(path) = &cli.config {
        load_config_file(path).context("failed to read --config file")?;
    }

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(source) = cli.source {
        config.video_source = parse_video_source(&source);
    }

    let source = FrameSource::open(&config.video_source).context("failed to open video source")?;

    let detector = Detector::load(&config.model_path, config.confidence_threshold, config.input_size)
        .context("failed to load detector model")?;

    let tracker = CentroidTracker::new(TrackerConfig {
        max_disappeared: config.max_disappeared,
        max_distance: config.max_distance,
        history_len: config.centroid_history_len,
    });

    let violation_manager = ViolationManager::new(&config).context("failed to start violation manager")?;

    let pipeline = Pipeline::new(
        &config,
        source,
        detector,
        tracker,
        violation_manager,
        !cli.no_display,
    );

    if let Err(e) = pipeline.run() {
        error!("pipeline terminated with an error: {e}");
        return Err(e.into());
    }

    Ok(())
}

/// Mirrors `tv_common::Config::from_env`'s own source parsing: an integer
/// string is a device index, anything else is a file path or stream URL.
fn parse_video_source(raw: &str) -> VideoSource {
    match raw.parse::<i32>() {
        Ok(idx) => VideoSource::Device(idx),
        Err(_) => VideoSource::Path(raw.to_string()),
    }
}

/// Populate the process environment from a `KEY=VALUE` per line file so
/// `Config::from_env` picks the values up. Blank lines and lines starting
/// with `#` are skipped; an existing environment variable is never
/// overwritten, so `--config` only fills in what the operator hasn't
/// already set via the environment.
fn load_config_file(path: &Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;

    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            anyhow::bail!(
                "{}:{}: expected KEY=VALUE, got {:?}",
                path.display(),
                lineno + 1,
                line
            );
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"');
        if std::env::var_os(key).is_none() {
            // SAFETY: single-threaded at this point in `main`, before any
            // worker thread (detector, alert dispatcher, pipeline) starts.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_fills_gaps_but_never_overrides_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tv.env");
        std::fs::write(
            &path,
            "# comment\n\nZONE_ID=\"lot_7\"\nDWELL_THRESHOLD=200\n",
        )
        .unwrap();

        // SAFETY: test runs single-threaded within this process.
        unsafe {
            std::env::remove_var("ZONE_ID");
            std::env::remove_var("DWELL_THRESHOLD");
            std::env::set_var("DWELL_THRESHOLD", "999");
        }

        load_config_file(&path).unwrap();

        assert_eq!(std::env::var("ZONE_ID").unwrap(), "lot_7");
        // Already-set environment variable must win over the file.
        assert_eq!(std::env::var("DWELL_THRESHOLD").unwrap(), "999");

        // SAFETY: test cleanup, still single-threaded.
        unsafe {
            std::env::remove_var("ZONE_ID");
            std::env::remove_var("DWELL_THRESHOLD");
        }
    }

    #[test]
    fn malformed_config_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.env");
        std::fs::write(&path, "NOT_A_KEY_VALUE_LINE\n").unwrap();

        assert!(load_config_file(&path).is_err());
    }
}
