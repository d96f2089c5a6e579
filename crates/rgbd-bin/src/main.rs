//! CLI entry point for rgbd.
//!
//! - `rgbd capture`: run every configured shot against the mock sensor and
//!   write a session directory
//! - `rgbd show-config`: print the configuration `capture` would use
//! - `rgbd inspect-blkd FILE`: print a BLKD file's header
//!
//! ```bash
//! rgbd capture --config rgbd.toml --frames 60 --workers 8
//! rgbd inspect-blkd captures/session_20240101_120000/DepthMapping/Shot_001_Frame_001.blkd
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rgbd_core::{logging, CaptureConfig};
use rgbd_driver_mock::{mock_calibration, MockSensor};
use rgbd_session::{Session, SessionManager, SessionSettings, ShotReport};
use rgbd_storage::Blkd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Correspondences in the mock calibration record.
const CALIBRATION_POINTS: usize = 24;

#[derive(Parser)]
#[command(name = "rgbd")]
#[command(about = "RGB-D frame capture with bounded buffering", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a session from the mock sensor
    Capture(CaptureArgs),

    /// Print the effective configuration (file, environment and overrides)
    ShowConfig(CaptureArgs),

    /// Print the header of a BLKD file
    InspectBlkd {
        /// Path to the .blkd file
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug, Default)]
struct CaptureArgs {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, default_value = "rgbd.toml")]
    config: PathBuf,

    /// Directory sessions are created under
    #[arg(long)]
    output: Option<PathBuf>,

    /// Serialization worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Frames per shot (0 = until --seconds elapses)
    #[arg(long)]
    frames: Option<u64>,

    /// Buffers per shot
    #[arg(long)]
    buffers: Option<usize>,

    /// Sensor frame rate in Hz
    #[arg(long)]
    rate: Option<f64>,

    /// Time limit for shots without a frame budget
    #[arg(long, default_value = "5")]
    seconds: u64,

    /// Mock sensor seed
    #[arg(long, default_value = "0")]
    seed: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Capture(args) => capture(&args),
        Commands::ShowConfig(args) => {
            let config = load_config(&args)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::InspectBlkd { file } => inspect_blkd(&file),
    }
}

/// Configuration file plus command-line overrides.
fn load_config(args: &CaptureArgs) -> Result<CaptureConfig> {
    let mut config = CaptureConfig::load_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if let Some(output) = &args.output {
        config.storage.output_dir.clone_from(output);
    }
    if let Some(workers) = args.workers {
        config.storage.workers = workers;
    }
    if let Some(rate) = args.rate {
        config.sensor.frame_rate_hz = rate;
    }
    for shot in &mut config.shots {
        if let Some(frames) = args.frames {
            shot.frames_to_capture = frames;
        }
        if let Some(buffers) = args.buffers {
            shot.buffer_count = buffers;
        }
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn capture(args: &CaptureArgs) -> Result<()> {
    let config = load_config(args)?;
    logging::init_from_config(&config).context("initializing logging")?;

    let geometry = config.geometry();
    let root = config
        .storage
        .output_dir
        .join(format!("session_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    info!(root = ?root, shots = config.shots.len(), "Starting capture session");

    let session = Session::new(&root, geometry, config.shots.iter().copied());
    let mut manager = SessionManager::new(session, SessionSettings::from_config(&config))
        .context("allocating buffer pool")?;
    manager.set_calibration(mock_calibration(geometry, CALIBRATION_POINTS));

    let mut sensor = MockSensor::new(geometry, args.seed);
    let time_limit = Duration::from_secs(args.seconds);

    while manager.session().next_incomplete().is_some() {
        let recorder = manager.begin_shot(None).context("starting shot")?;
        let index = recorder.shot_index();
        let frames = recorder.definition().frames_to_capture;

        let stop = AtomicBool::new(false);
        let started = Instant::now();
        sensor.run(config.sensor.frame_rate_hz, frames, Some(&stop), |frame| {
            recorder.on_frame(frame);
            if recorder.is_complete() || (frames == 0 && started.elapsed() >= time_limit) {
                stop.store(true, Ordering::Release);
            }
        });

        let report = manager
            .complete_shot(recorder)
            .with_context(|| format!("finishing shot {}", index + 1))?;
        print_report(index, &report);
    }

    println!("Session written to {}", root.display());
    Ok(())
}

fn print_report(index: usize, report: &ShotReport) {
    println!("Shot {}:", index + 1);
    println!(
        "  frames:  {} arrived, {} accepted, {} dropped, {} rejected",
        report.arrived, report.accepted, report.dropped, report.rejected
    );
    println!(
        "  buffers: {} serialized, {} failed",
        report.serialized, report.failed
    );
    println!(
        "  files:   {} in {:.2}s",
        report.saved_items.len(),
        report.elapsed.as_secs_f64()
    );
    for failure in &report.failures {
        match failure.sequence {
            Some(seq) => println!("  failed frame {}: {}", seq + 1, failure.message),
            None => println!("  failed buffer: {}", failure.message),
        }
    }
}

fn inspect_blkd(path: &Path) -> Result<()> {
    let blkd = Blkd::load_path(path).with_context(|| format!("reading {}", path.display()))?;
    let header = &blkd.header;
    println!("{}", path.display());
    println!("  version:         {}", header.version);
    println!("  dimensions:      {}x{}", header.width, header.height);
    println!("  bytes per pixel: {}", header.bytes_per_pixel);
    println!("  payload:         {} bytes", blkd.data.len());
    Ok(())
}
