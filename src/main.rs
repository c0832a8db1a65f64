use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};

use img2opc::{Config, Streamer};

#[derive(Parser)]
#[command(name = "img2opc")]
#[command(
    about = "img2opc - image to Open Pixel Control\n\n\
             Streams an image onto a serpentine-wired LED display over OPC.",
    long_about = None
)]
struct Cli {
    /// Path to configuration file (JSON)
    config: String,

    /// Enable debug output (statistics)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps every frame)
    #[arg(long)]
    ddebug: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ddebug implies debug
    let debug = cli.debug || cli.ddebug;
    let level = if cli.ddebug {
        LevelFilter::Trace
    } else if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    info!(
        "Display {}x{}, gamma {}, {} fps",
        config.display.width(),
        config.display.height(),
        config.gamma,
        config.fps
    );

    let mut streamer = Streamer::new(&config, debug).context("Failed to set up streamer")?;

    // Set up Ctrl-C handler with graceful shutdown
    let running = streamer.get_running_flag();
    let result = ctrlc::set_handler(move || {
        info!("Shutting down...");
        running.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // Run until Ctrl-C or the frame limit, then send a black frame to
    // turn off the LEDs, also when streaming failed
    streamer.stream(cli.frames)?;

    Ok(())
}
