//! meterscan - combined recognition pipeline for machine counters
//!
//! Reads a machine-readable code (QR) and a human-readable digital counter
//! value out of camera frames, votes across readings and fuses the result.
//! Capture, UI and persistence are external collaborators; this binary feeds
//! frames from still-image files at the same boundary contract.

mod analysis;
mod cloud;
mod config;
mod decode;
mod frame;
mod region;
mod scan;
mod vision;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cloud::CloudVision;
use crate::config::AppConfig;
use crate::decode::CodeDecoder;
use crate::frame::Frame;
use crate::scan::{ScanOutcome, Scanner};
use crate::vision::{OcrEngine, SegmentRecognizer};

/// meterscan - scan machine counters from camera frames
#[derive(Parser, Debug)]
#[command(name = "meterscan")]
#[command(about = "Recognize QR codes and digital counter displays in frames")]
struct Args {
    /// Image files to scan, fed to the pipeline oldest first
    #[arg(required_unless_present = "dump_config")]
    images: Vec<PathBuf>,

    /// Configuration file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cooldown between cycles in milliseconds (0 disables; still images
    /// are independent triggers, so the default is off)
    #[arg(long, default_value = "0")]
    cooldown_ms: u64,

    /// Override the stability threshold
    #[arg(long)]
    stability: Option<usize>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref());
    config.scan.cooldown_ms = args.cooldown_ms;
    if let Some(threshold) = args.stability {
        config.scan.stability_threshold = threshold;
    }

    if args.dump_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("meterscan starting");

    let cloud = if config.cloud.endpoint.is_empty() {
        None
    } else {
        Some(CloudVision::new(config.cloud.clone()))
    };

    let ocr = OcrEngine::new();
    ocr.initialize(Box::new(SegmentRecognizer::new()), config.ocr.clone())
        .await
        .context("failed to initialize OCR engine")?;

    let scanner = Scanner::new(
        config.scan.clone(),
        config.regions(),
        ocr,
        CodeDecoder::robust(),
        cloud,
    )
    .context("failed to construct scanner")?;

    for path in &args.images {
        let frame = load_frame(path).with_context(|| format!("failed to load {path:?}"))?;
        info!(path = %path.display(), "frame received");

        match scanner.on_frame(frame).await {
            ScanOutcome::Completed(result) => {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            ScanOutcome::NothingRecognized => {
                println!("{{\"outcome\":\"nothing-recognized\"}}");
            }
            ScanOutcome::CooldownActive => {
                println!("{{\"outcome\":\"cooldown-active\"}}");
            }
            ScanOutcome::CycleInFlight => {
                println!("{{\"outcome\":\"cycle-in-flight\"}}");
            }
        }
    }

    let stats = scanner.stats();
    info!(
        cycles = stats.cycles_completed,
        suppressed = stats.cycles_suppressed,
        kept = stats.observations_kept,
        dropped = stats.observations_dropped,
        "scan session summary"
    );

    scanner.shutdown();
    Ok(())
}

/// Load configuration from the given path, the platform config dir, or fall
/// back to defaults.
fn load_or_create_config(path: Option<&std::path::Path>) -> AppConfig {
    let candidate = path
        .map(PathBuf::from)
        .or_else(|| config::default_config_path());

    if let Some(candidate) = candidate {
        if candidate.exists() {
            match config::load_config(&candidate) {
                Ok(config) => {
                    info!(path = %candidate.display(), "loaded configuration");
                    return config;
                }
                Err(e) => warn!(path = %candidate.display(), error = %e, "ignoring bad config"),
            }
        }
    }

    info!("using default configuration");
    AppConfig::default()
}

/// Decode an image file into the pipeline's frame contract (RGBA8,
/// row-major).
fn load_frame(path: &std::path::Path) -> Result<Frame> {
    let img = image::open(path)?.to_rgba8();
    let (width, height) = img.dimensions();
    Frame::new(img.into_raw(), width, height)
        .ok_or_else(|| anyhow::anyhow!("decoded image buffer has unexpected size"))
}
