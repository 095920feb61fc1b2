//! Mosaic command - reassemble downloaded tiles into mosaics.

use super::common::parse_satellites;
use crate::error::CliError;
use chrono::Utc;
use clap::Args;
use geomosaic::mosaic::{build_all_mosaics, MosaicOptions, Rotation};
use std::path::PathBuf;

/// Arguments for the mosaic command.
#[derive(Args)]
pub struct MosaicArgs {
    /// Root of the downloaded tile tree
    #[arg(short, long, default_value = "downloads")]
    input: PathBuf,

    /// Root of the mosaic output tree
    #[arg(short, long, default_value = "mosaics")]
    output: PathBuf,

    /// Tile edge length in pixels
    #[arg(long, default_value_t = 256)]
    tile_size: u32,

    /// Rotation in degrees (0, 90, 180 or 270)
    #[arg(short, long, default_value_t = 0)]
    rotate: u32,

    /// Keep the tile-name axis order instead of swapping x/y
    #[arg(long)]
    no_swap_xy: bool,

    /// Mark tile boundaries for debugging (do not feed marked mosaics
    /// into the blend stage)
    #[arg(long)]
    show_coords: bool,

    /// Satellites to process (repeatable; default: all)
    #[arg(short, long = "satellite")]
    satellites: Vec<String>,

    /// Trailing window in hours (0 = unlimited)
    #[arg(long, default_value_t = 2)]
    hours: u32,
}

/// Run the mosaic command.
pub fn run(args: MosaicArgs) -> Result<(), CliError> {
    let rotation = Rotation::try_from(args.rotate)?;
    let satellites = parse_satellites(&args.satellites)?;

    let opts = MosaicOptions {
        tile_size: args.tile_size,
        rotation,
        swap_xy: !args.no_swap_xy,
        show_coords: args.show_coords,
    };

    let processed = build_all_mosaics(
        &args.input,
        &args.output,
        Some(&satellites),
        args.hours,
        Utc::now(),
        &opts,
    )?;

    println!("Processed {processed} mosaic timestamps.");
    Ok(())
}
