//! GeoMosaic CLI - command-line interface
//!
//! This binary wires the geomosaic library into four subcommands
//! covering the pipeline end to end: download, mosaic, blend and
//! timelapse.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use geomosaic::logging::{default_log_dir, default_log_file, init_logging};

#[derive(Parser)]
#[command(name = "geomosaic")]
#[command(version = geomosaic::VERSION)]
#[command(about = "Download, mosaic and blend geostationary satellite imagery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download recent tiles for the selected satellites
    Download(commands::download::DownloadArgs),
    /// Reassemble downloaded tiles into per-timestamp mosaics
    Mosaic(commands::mosaic::MosaicArgs),
    /// Blend mosaics into per-timestamp composites
    Blend(commands::blend::BlendArgs),
    /// Render a time-lapse video from composite frames
    Timelapse(commands::timelapse::TimelapseArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging_guard = match init_logging(default_log_dir(), default_log_file()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match cli.command {
        Command::Download(args) => commands::download::run(args).await,
        Command::Mosaic(args) => commands::mosaic::run(args),
        Command::Blend(args) => commands::blend::run(args),
        Command::Timelapse(args) => commands::timelapse::run(args),
    };

    if let Err(e) = result {
        e.exit();
    }
}
