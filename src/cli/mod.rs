//! Command-line interface for the sensor-frame pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{load_frame_json, load_labels_json};
use crate::core::timestamps::{camera_timestamp_pair, Dataset, TimestampPair};
use crate::core::transforms::{transform_data_to_sensor_frame_with_rng, SensorFrame};
use crate::core::writers::{write_boxes_csv, write_points_csv};
use crate::geometry::{ImuExtrinsic, PoseResolver};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "sensor-frames")]
#[command(about = "Express recorded lidar, label and radar data in the sensor frame", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a frame's points and labels into the sensor frame
    Transform {
        /// Frame JSON file with timestamp, pose and points
        frame: PathBuf,
        /// Label JSON file for the same frame
        #[arg(short, long)]
        labels: Option<PathBuf>,
        /// Directory for points.csv and boxes.csv
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Fraction of points to keep (overrides config)
        #[arg(long)]
        keep_prob: Option<f64>,
        /// Seed for point subsampling (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the camera timestamp matching a frame's lidar timestamp
    CameraTimestamp {
        /// Frame JSON file
        frame: PathBuf,
        /// Dataset whose fixed offset applies (boreas, scale)
        #[arg(short, long)]
        dataset: Option<Dataset>,
        /// Use the clock-drift correction instead of a fixed offset
        #[arg(long)]
        clock_drift: bool,
    },

    /// Convert polar radar CSV to a cartesian image CSV
    PolarToCart {
        /// Input radar CSV file or directory
        input_path: PathBuf,
        /// Output CSV file or directory
        output_path: PathBuf,
        /// Cartesian pixel size in meters (overrides config)
        #[arg(short, long)]
        resolution: Option<f64>,
        /// Image width in pixels (overrides config)
        #[arg(short, long)]
        width: Option<usize>,
        /// Process entire directory (batch mode)
        #[arg(long)]
        batch: bool,
        /// Limit number of files to process
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Transform { frame, labels, output_dir, keep_prob, seed } => {
            cmd_transform(&frame, labels.as_deref(), &output_dir, keep_prob, seed, &config);
        }
        Commands::CameraTimestamp { frame, dataset, clock_drift } => {
            cmd_camera_timestamp(&frame, dataset, clock_drift, &config);
        }
        Commands::PolarToCart { input_path, output_path, resolution, width, batch, limit } => {
            cmd_polar_to_cart(&input_path, &output_path, resolution, width, batch, limit, &config);
        }
    }
}

/// Load a frame and its labels, then express both in the sensor frame.
fn transform_frame(
    frame_path: &Path,
    labels_path: Option<&Path>,
    keep_probability: f64,
    seed: Option<u64>,
    config: &PipelineConfig,
) -> Result<SensorFrame> {
    let extrinsic = ImuExtrinsic::from_config(&config.extrinsic)
        .context("Invalid sensor-to-IMU extrinsic in config")?;
    let resolver = PoseResolver::new(extrinsic);

    let frame = load_frame_json(frame_path)
        .with_context(|| format!("Failed to load frame: {}", frame_path.display()))?;

    let labels = labels_path
        .map(|path| {
            load_labels_json(path).with_context(|| format!("Failed to load labels: {}", path.display()))
        })
        .transpose()?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let sensor = transform_data_to_sensor_frame_with_rng(
        &frame,
        labels.as_deref(),
        keep_probability,
        &resolver,
        &mut rng,
    )
    .with_context(|| format!("Failed to transform frame {}", frame.timestamp))?;

    Ok(sensor)
}

fn cmd_transform(
    frame_path: &Path,
    labels_path: Option<&Path>,
    output_dir: &Path,
    keep_prob: Option<f64>,
    seed: Option<u64>,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    let keep_probability = keep_prob.unwrap_or(config.transform.keep_probability);
    let seed = seed.or(config.transform.seed);

    println!("Transforming frame to sensor frame...");
    println!("Frame: {}", frame_path.display());
    if let Some(path) = labels_path {
        println!("Labels: {}", path.display());
    }
    println!("Keep probability: {}", keep_probability);

    let spinner = create_spinner("Resolving pose and transforming points...");

    let result = transform_frame(frame_path, labels_path, keep_probability, seed, config).and_then(|sensor| {
        let points_path = output_dir.join("points.csv");
        let boxes_path = output_dir.join("boxes.csv");
        write_points_csv(&points_path, &sensor.points)
            .with_context(|| format!("Failed to write {}", points_path.display()))?;
        write_boxes_csv(&boxes_path, &sensor.boxes)
            .with_context(|| format!("Failed to write {}", boxes_path.display()))?;
        Ok(sensor)
    });

    spinner.finish_and_clear();

    match result {
        Ok(sensor) => {
            print_summary(
                "Transform Complete",
                &[
                    ("Frame", frame_path.display().to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Points written", sensor.points.len().to_string()),
                    ("Boxes written", sensor.boxes.len().to_string()),
                    ("Keep probability", keep_probability.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Transform failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn camera_timestamp(
    frame_path: &Path,
    dataset: Option<Dataset>,
    clock_drift: bool,
    config: &PipelineConfig,
) -> Result<TimestampPair> {
    let frame = load_frame_json(frame_path)
        .with_context(|| format!("Failed to load frame: {}", frame_path.display()))?;

    let mut timestamps = config.timestamps.clone();
    if let Some(dataset) = dataset {
        timestamps.dataset = dataset;
    }
    timestamps.clock_drift |= clock_drift;

    Ok(camera_timestamp_pair(frame.timestamp, timestamps.policy()))
}

fn cmd_camera_timestamp(
    frame_path: &Path,
    dataset: Option<Dataset>,
    clock_drift: bool,
    config: &PipelineConfig,
) {
    match camera_timestamp(frame_path, dataset, clock_drift, config) {
        Ok(pair) => {
            print_summary(
                "Camera Timestamp",
                &[
                    ("Frame", frame_path.display().to_string()),
                    ("Lidar (ns)", pair.lidar.to_string()),
                    ("Camera (ns)", pair.camera.to_string()),
                    ("Offset (ns)", (pair.camera - pair.lidar).to_string()),
                ],
            );
        }
        Err(e) => {
            error!("Camera timestamp failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_polar_to_cart(
    input_path: &Path,
    output_path: &Path,
    resolution: Option<f64>,
    width: Option<usize>,
    batch: bool,
    limit: Option<usize>,
    config: &PipelineConfig,
) {
    use crate::processors::cartesian;

    let start = Instant::now();

    let mut radar = config.radar.clone();
    if let Some(resolution) = resolution {
        radar.cart_resolution_m = resolution;
    }
    if let Some(width) = width {
        radar.cart_pixel_width = width;
    }

    if batch {
        // Batch processing mode
        println!("Converting radar sweeps in batch mode...");
        println!("Input directory: {}", input_path.display());
        println!("Output directory: {}", output_path.display());

        if let Some(lim) = limit {
            println!("Processing limit: {} files", lim);
        }

        match cartesian::convert_radar_dir(input_path, output_path, limit, &radar) {
            Ok(converted) => {
                print_summary(
                    "Batch Conversion Complete",
                    &[
                        ("Input directory", input_path.display().to_string()),
                        ("Output directory", output_path.display().to_string()),
                        ("Files converted", converted.to_string()),
                        ("Resolution (m)", radar.cart_resolution_m.to_string()),
                        ("Width (px)", radar.cart_pixel_width.to_string()),
                        ("Duration", format!("{:.2?}", start.elapsed())),
                    ],
                );
            }
            Err(e) => {
                error!("Batch conversion failed: {:#}", e);
                std::process::exit(1);
            }
        }
    } else {
        // Single file mode
        println!("Converting single sweep...");
        println!("Input: {}", input_path.display());
        println!("Output: {}", output_path.display());

        let spinner = create_spinner("Resampling to Cartesian grid...");

        match cartesian::convert_radar_csv(input_path, output_path, &radar) {
            Ok(pixels) => {
                spinner.finish_and_clear();

                print_summary(
                    "Conversion Complete",
                    &[
                        ("Input file", input_path.display().to_string()),
                        ("Output file", output_path.display().to_string()),
                        ("Pixels written", pixels.to_string()),
                        ("Resolution (m)", radar.cart_resolution_m.to_string()),
                        ("Duration", format!("{:.2?}", start.elapsed())),
                    ],
                );
            }
            Err(e) => {
                spinner.finish_and_clear();
                error!("Conversion failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    const FRAME: &str = r#"{
        "timestamp": 1000,
        "device_heading": {"a": 1.0, "b": 0.0, "c": 0.0, "d": 0.0},
        "device_position": {"x": 0.0, "y": 0.0, "z": 0.0},
        "points": [
            {"x": 0.0, "y": 0.0, "z": 0.0},
            {"x": 1.0, "y": 0.0, "z": 0.0, "intensity": 3.0}
        ]
    }"#;

    const LABELS: &str = r#"[
        {"position": [1, 2, 3], "dimensions": [4, 2, 1.5], "yaw": 0.0, "label": "Car"}
    ]"#;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transform_args() {
        let cli = Cli::try_parse_from([
            "sensor-frames",
            "-vv",
            "transform",
            "frame.json",
            "--labels",
            "labels.json",
            "--keep-prob",
            "0.5",
            "--seed",
            "7",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Transform { labels, keep_prob, seed, .. } => {
                assert_eq!(labels, Some(PathBuf::from("labels.json")));
                assert_eq!(keep_prob, Some(0.5));
                assert_eq!(seed, Some(7));
            }
            _ => panic!("expected transform subcommand"),
        }
    }

    #[test]
    fn test_parse_dataset_name() {
        let cli = Cli::try_parse_from(["sensor-frames", "camera-timestamp", "f.json", "-d", "scale"]).unwrap();
        match cli.command {
            Commands::CameraTimestamp { dataset, clock_drift, .. } => {
                assert_eq!(dataset, Some(Dataset::Scale));
                assert!(!clock_drift);
            }
            _ => panic!("expected camera-timestamp subcommand"),
        }

        assert!(Cli::try_parse_from(["sensor-frames", "camera-timestamp", "f.json", "-d", "kitti"]).is_err());
    }

    #[test]
    fn test_transform_frame_with_default_extrinsic() {
        let dir = TempDir::new().unwrap();
        let frame_path = dir.path().join("frame.json");
        let labels_path = dir.path().join("labels.json");
        fs::write(&frame_path, FRAME).unwrap();
        fs::write(&labels_path, LABELS).unwrap();

        let config = PipelineConfig::default();
        let sensor = transform_frame(&frame_path, Some(labels_path.as_path()), 1.0, Some(1), &config).unwrap();

        assert_eq!(sensor.points.len(), 2);
        assert_eq!(sensor.boxes.len(), 1);
        assert_eq!(sensor.boxes[0].label, "Car");
        // the odometry origin sits below the sensor
        assert!((sensor.points.z[0] + 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_transform_frame_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let result = transform_frame(&dir.path().join("missing.json"), None, 1.0, None, &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_camera_timestamp_overrides() {
        let dir = TempDir::new().unwrap();
        let frame_path = dir.path().join("frame.json");
        fs::write(&frame_path, FRAME).unwrap();

        let config = PipelineConfig::default();

        let pair = camera_timestamp(&frame_path, None, false, &config).unwrap();
        assert_eq!(pair, TimestampPair { lidar: 1000, camera: 1000 });

        let pair = camera_timestamp(&frame_path, Some(Dataset::Scale), false, &config).unwrap();
        assert_eq!(pair.camera, 1000 + 6_300_000_000);
    }
}
