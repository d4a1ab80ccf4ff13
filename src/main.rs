//! LED matrix clock
//!
//! Runs the scene engine on the Pi: loads the JSON config, builds the scene
//! manager, and drives the panel frame by frame until Ctrl+C.
//!
//! Without the `hardware` feature the same loop runs headless, which is
//! handy for trying a config on a laptop and grabbing a PNG of the result.
//!
//! ## Rust concepts
//! - `fn main() -> Result<(), Box<dyn Error>>` so start-up errors use `?`
//! - `#[cfg(feature = "hardware")]` to pick the display at compile time
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/pixelclock --config pixelclock.json
//! cargo run --no-default-features -- --frames 200 --snapshot frame.png
//! ```

use clap::Parser;
use pixelclock::config::Config;
use pixelclock::manager::SceneManager;
use pixelclock::scenes::SceneRegistry;
use pixelclock::{PanelConfig, setup_signal_handler};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use tracing_subscriber::EnvFilter;

/// LED matrix clock with procedural scenes
#[derive(Parser)]
#[command(name = "pixelclock")]
#[command(about = "Procedural scenes and a clock on an RGB LED matrix")]
#[command(version)]
struct Args {
    /// JSON config file (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of rows on the LED panel
    #[arg(long, default_value = "64", value_parser = clap::value_parser!(u32).range(1..))]
    rows: u32,

    /// Number of columns on the LED panel
    #[arg(long, default_value = "256", value_parser = clap::value_parser!(u32).range(1..))]
    cols: u32,

    /// Path to BDF font directory
    #[arg(long, default_value = "fonts/bdf")]
    fonts_dir: PathBuf,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Write the last frame to this PNG on exit (headless builds)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Seed for scene selection and scene randomness
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();
    let panel = PanelConfig::new(args.rows, args.cols);

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    tracing::info!("pixelclock v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", panel.cols, panel.rows);
    match &args.config {
        Some(path) => tracing::info!("Config: {}", path.display()),
        None => tracing::info!("Config: built-in defaults"),
    }

    let manager = SceneManager::new(&config, panel, SceneRegistry::builtin())?;
    let running = setup_signal_handler()?;

    run(&args, &config, panel, manager, &running)
}

#[cfg(feature = "hardware")]
fn run(
    args: &Args,
    config: &Config,
    panel: PanelConfig,
    manager: SceneManager,
    running: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    use pixelclock::clock::SystemClock;
    use pixelclock::render::{FrameLoop, MatrixDisplay};

    let fonts_dir = args.fonts_dir.canonicalize().unwrap_or_else(|_| {
        eprintln!("Warning: could not canonicalize fonts dir, using as-is");
        args.fonts_dir.clone()
    });
    tracing::info!("Fonts dir: {}", fonts_dir.display());

    if args.snapshot.is_some() {
        tracing::warn!("--snapshot is ignored when driving the matrix");
    }

    let display = MatrixDisplay::new(panel, &fonts_dir, &config.hud)?;
    let mut frame_loop = FrameLoop::new(config, SystemClock::new(), display, manager);
    frame_loop.run(running, args.frames);

    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn run(
    args: &Args,
    config: &Config,
    panel: PanelConfig,
    manager: SceneManager,
    running: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    use pixelclock::clock::SystemClock;
    use pixelclock::render::{FrameLoop, HeadlessDisplay};

    tracing::info!("Built without the 'hardware' feature, running headless");

    let display = HeadlessDisplay::new(panel, &config.hud.font);
    let mut frame_loop = FrameLoop::new(config, SystemClock::new(), display, manager);
    frame_loop.run(running, args.frames);

    if let Some(path) = &args.snapshot {
        frame_loop.display().save_png(path)?;
        tracing::info!("Snapshot written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_reference_panel() {
        let args = Args::try_parse_from(["pixelclock"]).unwrap();
        assert_eq!((args.rows, args.cols), (64, 256));
        assert!(args.config.is_none());
    }

    #[rstest]
    #[case("--rows")]
    #[case("--cols")]
    fn zero_panel_dimension_is_rejected(#[case] flag: &str) {
        assert!(Args::try_parse_from(["pixelclock", flag, "0"]).is_err());
    }
}
