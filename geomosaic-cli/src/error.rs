//! CLI error handling with user-friendly messages.

use geomosaic::batch::BatchError;
use geomosaic::blend::BlendError;
use geomosaic::coord::CoordError;
use geomosaic::mosaic::MosaicError;
use geomosaic::provider::HttpError;
use geomosaic::video::VideoError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Bad satellite or zoom selection
    Config(CoordError),
    /// Failed to construct the HTTP client
    Http(HttpError),
    /// Batch download aborted
    Batch(BatchError),
    /// Mosaic construction failed
    Mosaic(MosaicError),
    /// Compositing failed
    Blend(BlendError),
    /// Time-lapse rendering failed
    Video(VideoError),
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        if let CliError::Video(VideoError::Io(_)) = self {
            eprintln!();
            eprintln!("Time-lapse rendering requires ffmpeg on PATH.");
        }
        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Invalid configuration: {}", e),
            CliError::Http(e) => write!(f, "HTTP client setup failed: {}", e),
            CliError::Batch(e) => write!(f, "Batch download failed: {}", e),
            CliError::Mosaic(e) => write!(f, "Mosaic construction failed: {}", e),
            CliError::Blend(e) => write!(f, "Compositing failed: {}", e),
            CliError::Video(e) => write!(f, "Time-lapse rendering failed: {}", e),
        }
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Config(e)
    }
}

impl From<BatchError> for CliError {
    fn from(e: BatchError) -> Self {
        CliError::Batch(e)
    }
}

impl From<MosaicError> for CliError {
    fn from(e: MosaicError) -> Self {
        CliError::Mosaic(e)
    }
}

impl From<BlendError> for CliError {
    fn from(e: BlendError) -> Self {
        CliError::Blend(e)
    }
}

impl From<VideoError> for CliError {
    fn from(e: VideoError) -> Self {
        CliError::Video(e)
    }
}
