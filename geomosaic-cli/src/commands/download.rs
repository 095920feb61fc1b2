//! Download command - batch tile download for the selected satellites.

use super::common::parse_satellites;
use crate::error::CliError;
use clap::Args;
use geomosaic::batch::BatchDownloader;
use geomosaic::config::{
    DownloadConfig, DEFAULT_CONCURRENCY, DEFAULT_HOURS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_ZOOM,
};
use geomosaic::fetch::TileFetcher;
use geomosaic::provider::{ReqwestClient, TileService};
use std::path::PathBuf;

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    /// Concurrent download workers
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Satellites to download (repeatable; default: all)
    #[arg(short, long = "satellite")]
    satellites: Vec<String>,

    /// Trailing window in hours (0 = unlimited)
    #[arg(long, default_value_t = DEFAULT_HOURS)]
    hours: u32,

    /// Zoom level (4 or 5)
    #[arg(short, long, default_value_t = DEFAULT_ZOOM)]
    zoom: u8,

    /// Treat response bodies under this many bytes as blank tiles and
    /// blacklist their coordinates
    #[arg(long)]
    blank_threshold: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout: u64,

    /// Root of the downloaded tile tree
    #[arg(long, default_value = "downloads")]
    downloads_root: PathBuf,

    /// Blacklist store location
    #[arg(long, default_value = "blacklist.json")]
    blacklist: PathBuf,
}

/// Run the download command.
pub async fn run(args: DownloadArgs) -> Result<(), CliError> {
    let satellites = parse_satellites(&args.satellites)?;

    let mut config = DownloadConfig::new()
        .with_concurrency(args.concurrency)
        .with_hours(args.hours)
        .with_zoom(args.zoom)
        .with_timeout_secs(args.timeout)
        .with_downloads_root(args.downloads_root)
        .with_blacklist_path(args.blacklist);
    if let Some(threshold) = args.blank_threshold {
        config = config.with_blank_threshold(threshold);
    }

    let client = ReqwestClient::with_timeout(config.timeout_secs()).map_err(CliError::Http)?;
    let service = TileService::new(client);
    let mut fetcher = TileFetcher::new(service, config.downloads_root());
    if let Some(threshold) = config.blank_threshold() {
        fetcher = fetcher.with_blank_threshold(threshold);
    }

    let report = BatchDownloader::new(fetcher).run(&satellites, &config).await?;

    let failed = report.total_failed();
    if failed > 0 {
        println!("Batch finished with {failed} tiles still failed after retry.");
    } else {
        println!("Batch finished; all attempted tiles succeeded.");
    }
    Ok(())
}
