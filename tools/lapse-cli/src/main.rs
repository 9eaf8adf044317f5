//! Lapse CLI: timelapse video synthesis from ordered still frames.
//!
//! Usage:
//!   lapse generate <FRAMES>... --duration <SECS>   Render frames to a video
//!   lapse check                                    Check platform capabilities
//!   lapse config [--init]                          Show or create the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lapse_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "lapse",
    about = "Turn an ordered set of images into a timelapse video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames into a video of the given duration
    Generate {
        /// Frame URLs or paths, in playback order
        frames: Vec<String>,

        /// Read additional frame URLs from a file, one per line
        #[arg(long)]
        list: Option<PathBuf>,

        /// Target duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Background music URL or path
        #[arg(long)]
        music: Option<String>,

        /// Music volume [0.0, 1.0]
        #[arg(long)]
        volume: Option<f32>,

        /// Output file path (extension follows the negotiated container)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check which capabilities this platform provides
    Check,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    lapse_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Generate {
            frames,
            list,
            duration,
            music,
            volume,
            output,
        } => commands::generate::run(&config, frames, list, duration, music, volume, output).await,
        Commands::Check => commands::check::run(&config),
        Commands::Config { init } => commands::config::run(&config, init),
    }
}
