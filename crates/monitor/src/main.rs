//! Drowsiness Monitor - Main Entry Point

use anyhow::Context;
use clap::Parser;
use dms::Sensitivity;
use monitor::{init_logging, run, EndReason, MonitorSettings};
use std::path::PathBuf;
use tracing::{info, warn};

/// Watch a driver's eyes and sound an alarm on sustained closure
#[derive(Parser, Debug)]
#[command(name = "drowsiness-monitor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to ./drowsiness-monitor.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Threshold preset: standard, strict or lenient
    #[arg(short, long)]
    sensitivity: Option<Sensitivity>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = MonitorSettings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(sensitivity) = cli.sensitivity {
        settings.dms.apply_sensitivity(sensitivity);
    }
    init_logging(&settings.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(sensitivity) = cli.sensitivity {
        info!("Using {:?} sensitivity", sensitivity);
    }

    let summary = run(settings).await?;
    info!(
        "Session finished: {} frames, {} skipped, {} drowsy episodes",
        summary.frames, summary.skipped_frames, summary.drowsy_episodes
    );
    if let EndReason::SourceFailed(reason) = &summary.end {
        warn!("Frame source failed: {}", reason);
    }

    Ok(())
}
