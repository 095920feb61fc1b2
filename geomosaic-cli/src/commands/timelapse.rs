//! Timelapse command - render composites into an MP4 via ffmpeg.

use crate::error::CliError;
use chrono::Utc;
use clap::Args;
use geomosaic::video::{collect_frames, encode_timelapse};
use std::path::PathBuf;

/// Arguments for the timelapse command.
#[derive(Args)]
pub struct TimelapseArgs {
    /// Composite frame tree for one zoom level
    /// (e.g. `lighter_blend/4`)
    #[arg(short, long)]
    input: PathBuf,

    /// Output video path (default: timestamped file under
    /// `output_videos/`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Video time span in hours, ending at the newest frame
    /// (0 = unlimited)
    #[arg(long, default_value_t = 24)]
    hours: u32,

    /// Output framerate
    #[arg(short, long, default_value_t = 30)]
    framerate: u32,
}

/// Run the timelapse command.
pub fn run(args: TimelapseArgs) -> Result<(), CliError> {
    let frames = collect_frames(&args.input, args.hours, None)?;

    let output = args.output.unwrap_or_else(|| {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        PathBuf::from("output_videos").join(format!("timelapse_{stamp}.mp4"))
    });

    encode_timelapse(&frames, &output, args.framerate)?;
    println!("Time-lapse written to {}.", output.display());
    Ok(())
}
