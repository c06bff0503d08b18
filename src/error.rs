//! Error types for the `moviebarcode` crate.
//!
//! This module defines [`Error`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context to diagnose
//! the problem without additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `moviebarcode` operations.
///
/// Every public method that can fail returns `Result<T, Error>`. There is no
/// internal retry anywhere: every error is terminal for the enclosing
/// operation, recoverable only by the caller re-invoking with corrected
/// input. The single soft failure — a sampling window that yields no frame —
/// never surfaces as an error; the affected column is skipped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The output dimensions are not both positive.
    #[error("Dimensions must be positive (got {width}x{height})")]
    InvalidDimensions {
        /// Requested output width.
        width: u32,
        /// Requested output height.
        height: u32,
    },

    /// A trim bound violates `0 <= start < end <= 1`.
    #[error(
        "Invalid trim range: start ({start}) must be >= 0 and less than end ({end}), end must be <= 1"
    )]
    InvalidTrimRange {
        /// Trim start as a fraction of total duration.
        start: f64,
        /// Trim end as a fraction of total duration.
        end: f64,
    },

    /// More tracks were requested than there are output pixel rows.
    #[error("Height of {height} px is too low for {tracks} tracks")]
    TooManyTracks {
        /// Number of requested tracks.
        tracks: usize,
        /// Total output height in pixels.
        height: u32,
    },

    /// A setter was called after generation started.
    #[error("Session is no longer modifiable (generation has started)")]
    SessionFrozen,

    /// A donated output buffer does not match `width * height * 4` bytes.
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// Required buffer size in bytes.
        expected: usize,
        /// Size of the buffer that was supplied.
        actual: usize,
    },

    /// A video-based style was requested but the file has no video stream.
    #[error("File contains no video stream, please select an appropriate style")]
    NoVideoStream,

    /// The spectrogram style was requested but the file has no audio stream.
    #[error("File contains no audio stream, please select an appropriate style")]
    NoAudioStream,

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`MediaSource::open`](crate::MediaSource::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// An empty output path was passed to `write`.
    #[error("Output path must not be empty")]
    EmptyOutputPath,

    /// The output path resolves to the input file.
    #[error("Will not overwrite input file {path}")]
    OutputIsInput {
        /// The offending (canonicalized) path.
        path: PathBuf,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Audio data could not be decoded.
    #[error("Failed to decode audio: {0}")]
    AudioDecodeError(String),

    /// Generation was cancelled via a
    /// [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding or decoding a raster.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for Error {
    fn from(error: FfmpegError) -> Self {
        Error::FfmpegError(error.to_string())
    }
}
