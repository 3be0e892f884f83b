//! Scoreboard scanner CLI
//!
//! Replays a directory of captured frames through the scoreboard scene and
//! prints every event as a JSON line, or rebuilds the reference feature model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};

use scoreboard_scan::config::{default_config_path, ScanConfig};
use scoreboard_scan::geometry::ReferenceModel;
use scoreboard_scan::recognition::Recognizers;
use scoreboard_scan::{create_event_queue, logging, paths, ScanEvent, ScoreboardScene, Tick};

#[derive(Parser)]
#[command(name = "scoreboard-scan")]
#[command(about = "Detect and slice post-match scoreboards in captured frames")]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults to the one next to the executable).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed PNG frames from a directory, in file name order.
    Replay {
        /// Directory containing the frames.
        dir: PathBuf,

        /// Capture rate used to derive tick timestamps.
        #[arg(long, default_value = "10")]
        fps: u32,
    },

    /// Rebuild the reference feature model from the bundled image.
    RebuildModel,
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log::error!("[PANIC]{} {}", location, panic_info);
    }));

    paths::ensure_directories().context("Failed to create output directories")?;
    logging::init(LevelFilter::Info).context("Failed to install logger")?;

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ScanConfig::load(&config_path);
    logging::set_level(config.level_filter());

    match cli.command {
        Commands::Replay { dir, fps } => replay(&config, &dir, fps),
        Commands::RebuildModel => {
            let model = ReferenceModel::rebuild(&config.model_path, &config.reference_image)
                .context("Failed to rebuild reference model")?;
            info!(
                "Reference model written to {} ({} keypoints)",
                config.model_path.display(),
                model.features.keypoints.len()
            );
            Ok(())
        }
    }
}

/// PNG files of a directory sorted by name.
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

fn replay(config: &ScanConfig, dir: &Path, fps: u32) -> Result<()> {
    let frames = list_frames(dir)?;
    info!("Replaying {} frames from {} at {} fps", frames.len(), dir.display(), fps);

    let (events, receiver) = create_event_queue();
    let mut scene = ScoreboardScene::from_config(config, Recognizers::default(), events)
        .context("Failed to set up the scoreboard scene")?;

    let frame_msec = 1000 / i64::from(fps.max(1));
    for (index, path) in frames.iter().enumerate() {
        let frame = match image::open(path) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        };
        scene.tick(&Tick {
            frame: frame.as_ref(),
            msec: index as i64 * frame_msec,
            overlay: false,
        });
        print_events(receiver.try_iter())?;
    }

    // Waits for the weapon worker, then closes the channel
    drop(scene);
    print_events(receiver.iter())?;
    Ok(())
}

fn print_events(events: impl Iterator<Item = ScanEvent>) -> Result<()> {
    for event in events {
        println!("{}", serde_json::to_string(&event)?);
        if let ScanEvent::ResultReady(result) = &event {
            print!("{}", result.summary());
        }
    }
    Ok(())
}
