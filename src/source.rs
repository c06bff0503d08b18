//! The decoding seam between the generation pipeline and the media backend.
//!
//! [`Source`] is everything the pipeline needs from a media file: trim
//! bounds, a seek index sized to the output width, stream-capability
//! queries, an exact-mode switch, and per-window frame retrieval. The
//! production implementation is [`MediaSource`](crate::MediaSource); tests
//! script their own deterministic sources against this trait.

use std::{path::Path, time::Duration};

use image::DynamicImage;

use crate::error::Error;

/// A strictly sequential seek-and-decode media resource.
///
/// A source is exclusively owned by one [`Session`](crate::Session) and is
/// never used from more than one thread at a time. The session reuses it
/// serially across all tracks and passes; `set_exact` marks the start of a
/// fresh traversal and rewinds decoding to the trim start.
///
/// Frame retrieval takes a normalized time window `[min, max]` expressed as
/// fractions of the *trimmed* range — the source maps them into its
/// `[start, end]` trim bounds, which are themselves fractions of the total
/// duration. Returning `Ok(None)` means the window yields no decodable
/// content; the caller skips that column.
pub trait Source {
    /// Set the trim bounds, both fractions of total duration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTrimRange`] unless `0 <= start < end <= 1`.
    fn set_trim(&mut self, start: f64, end: f64) -> Result<(), Error>;

    /// Current trim start fraction.
    fn trim_start(&self) -> f64;

    /// Current trim end fraction.
    fn trim_end(&self) -> f64;

    /// Build a seek index over the trimmed range, sized to the requested
    /// output width. Called once per generation before any pass runs. Also
    /// decides whether exact-mode decoding applies to this configuration
    /// (see [`exact_capable`](Source::exact_capable)).
    fn build_seek_index(&mut self, target_width: u32) -> Result<(), Error>;

    /// Whether the file has a video stream.
    fn has_video(&self) -> bool;

    /// Whether the file has an audio stream.
    fn has_audio(&self) -> bool;

    /// Begin a fresh traversal in the given mode, rewound to the trim
    /// start. Exact mode decodes sequentially for frame accuracy;
    /// approximate mode seeks by keyframe index.
    fn set_exact(&mut self, exact: bool) -> Result<(), Error>;

    /// The source's determination of whether exact-mode decoding applies to
    /// the current configuration. Only meaningful after
    /// [`build_seek_index`](Source::build_seek_index).
    fn exact_capable(&self) -> bool;

    /// Decode a representative video frame for the window `[min, max]`.
    fn video_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error>;

    /// Decode a representative audio-domain frame (a rendered column of
    /// audio content) for the window `[min, max]`.
    fn audio_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error>;

    /// The path this source was opened from, if it came from the
    /// filesystem. Used by the output-overwrite guard.
    fn path(&self) -> Option<&Path>;

    /// Total media duration.
    fn duration(&self) -> Duration;
}
