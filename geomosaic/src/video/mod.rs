//! Time-lapse rendering via the system `ffmpeg`.
//!
//! Collects composite frames from a `{date}/{time}.png` tree, writes a
//! concat-demuxer manifest, and hands encoding to `ffmpeg` with fixed
//! x264 parameters. Encoding failures are fatal for the command only and
//! carry ffmpeg's stderr.

use crate::time::parse_date_time;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from frame collection and encoding.
#[derive(Debug, Error)]
pub enum VideoError {
    /// Nothing to encode within the requested window
    #[error("no frames found in the requested window")]
    NoFrames,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// ffmpeg exited non-zero; stderr captured for diagnosis
    #[error("ffmpeg exited with {status}: {stderr}")]
    FfmpegFailed { status: ExitStatus, stderr: String },
}

/// One frame of the time-lapse, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelapseFrame {
    pub timestamp: i64,
    pub path: PathBuf,
}

/// Collects frames from `input_dir` (a `{date}/{time}.png` tree).
///
/// The window spans `duration_hours` backwards from `start` (or from the
/// newest frame found when `start` is `None`); 0 means unlimited.
/// Missing or empty files
/// are dropped with a warning. Frames return sorted oldest-first, ready
/// for the encoder.
pub fn collect_frames(
    input_dir: &Path,
    duration_hours: u32,
    start: Option<i64>,
) -> Result<Vec<TimelapseFrame>, VideoError> {
    let mut all = Vec::new();
    for date_entry in fs::read_dir(input_dir)? {
        let date_entry = date_entry?;
        if !date_entry.file_type()?.is_dir() {
            continue;
        }
        let date = date_entry.file_name().to_string_lossy().into_owned();

        for file_entry in fs::read_dir(date_entry.path())? {
            let file_entry = file_entry?;
            let name = file_entry.file_name();
            let Some(time) = name.to_string_lossy().strip_suffix(".png").map(String::from)
            else {
                continue;
            };
            let Some(timestamp) = parse_date_time(&date, &time) else {
                debug!(date = %date, file = %name.to_string_lossy(), "Unparsable frame name, skipping");
                continue;
            };
            all.push(TimelapseFrame {
                timestamp,
                path: file_entry.path(),
            });
        }
    }

    let Some(start) = start.or_else(|| all.iter().map(|f| f.timestamp).max()) else {
        return Err(VideoError::NoFrames);
    };
    // 0 = unlimited, matching the download and blend stages.
    let window_start = if duration_hours == 0 {
        i64::MIN
    } else {
        start - i64::from(duration_hours) * 3600
    };

    let mut frames: Vec<_> = all
        .into_iter()
        .filter(|f| (window_start..=start).contains(&f.timestamp))
        .filter(|f| match fs::metadata(&f.path) {
            Ok(meta) if meta.len() > 0 => true,
            Ok(_) => {
                warn!(path = %f.path.display(), "Empty frame file, dropping");
                false
            }
            Err(e) => {
                warn!(path = %f.path.display(), error = %e, "Unreadable frame file, dropping");
                false
            }
        })
        .collect();

    if frames.is_empty() {
        return Err(VideoError::NoFrames);
    }
    frames.sort_by_key(|f| f.timestamp);
    Ok(frames)
}

/// Encodes `frames` into an MP4 at `output` with the given framerate.
///
/// Writes a concat-demuxer manifest next to the output, invokes the
/// system `ffmpeg`, and removes the manifest afterwards. A non-zero exit
/// surfaces as [`VideoError::FfmpegFailed`].
pub fn encode_timelapse(
    frames: &[TimelapseFrame],
    output: &Path,
    framerate: u32,
) -> Result<(), VideoError> {
    if frames.is_empty() {
        return Err(VideoError::NoFrames);
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let manifest_path = output.with_extension("frames.txt");
    fs::write(&manifest_path, manifest(frames, framerate))?;

    info!(
        frames = frames.len(),
        framerate,
        output = %output.display(),
        "Invoking ffmpeg"
    );

    let result = Command::new("ffmpeg")
        .arg("-y")
        .args(["-loglevel", "error"])
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .arg(&manifest_path)
        .args(["-fps_mode", "cfr"])
        .args(["-r", &framerate.to_string()])
        .args(["-vf", "format=yuv420p,setpts=N/FRAME_RATE/TB"])
        .args(["-c:v", "libx264", "-crf", "23", "-preset", "medium"])
        .args(["-movflags", "+faststart"])
        .arg(output)
        .output();

    // The manifest is only useful for diagnosing a failed run.
    match result {
        Ok(out) if out.status.success() => {
            let _ = fs::remove_file(&manifest_path);
            info!(output = %output.display(), "Time-lapse written");
            Ok(())
        }
        Ok(out) => {
            warn!(manifest = %manifest_path.display(), "ffmpeg failed, keeping manifest");
            Err(VideoError::FfmpegFailed {
                status: out.status,
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            })
        }
        Err(e) => {
            let _ = fs::remove_file(&manifest_path);
            Err(e.into())
        }
    }
}

/// Concat-demuxer manifest: one `file`/`duration` pair per frame.
fn manifest(frames: &[TimelapseFrame], framerate: u32) -> String {
    let frame_duration = 1.0 / f64::from(framerate.max(1));
    let mut out = String::new();
    for frame in frames {
        out.push_str(&format!(
            "file '{}'\nduration {:.5}\n",
            frame.path.display(),
            frame_duration
        ));
    }
    out
}
