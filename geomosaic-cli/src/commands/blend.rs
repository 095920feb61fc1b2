//! Blend command - composite mosaics with the lighten rule.

use crate::error::CliError;
use chrono::Utc;
use clap::Args;
use geomosaic::blend::{build_composites, BlendConfig};
use std::path::PathBuf;

/// Arguments for the blend command.
#[derive(Args)]
pub struct BlendArgs {
    /// Root of the mosaic tree
    #[arg(short, long, default_value = "mosaics")]
    input: PathBuf,

    /// Root of the composite output tree
    #[arg(short, long, default_value = "lighter_blend")]
    output: PathBuf,

    /// Zoom level whose mosaics are composited
    #[arg(short, long, default_value_t = 4)]
    zoom: u8,

    /// Trailing window in hours (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    hours: u32,

    /// Composite canvas width in pixels
    #[arg(long, default_value_t = 4096)]
    canvas_width: u32,

    /// Composite canvas height in pixels
    #[arg(long, default_value_t = 2048)]
    canvas_height: u32,

    /// Rebuild composites whose output already exists
    #[arg(long)]
    overwrite: bool,
}

/// Run the blend command.
pub fn run(args: BlendArgs) -> Result<(), CliError> {
    let config = BlendConfig {
        zoom: args.zoom,
        hours: args.hours,
        canvas_width: args.canvas_width,
        canvas_height: args.canvas_height,
        offsets: BlendConfig::default_offsets(),
        overwrite: args.overwrite,
    };

    let outcome = build_composites(&args.input, &args.output, &config, Utc::now())?;
    println!(
        "Generated {} composites, skipped {} existing.",
        outcome.generated, outcome.skipped
    );
    Ok(())
}
