//! The generation session.
//!
//! [`Session`] owns one [`Source`], the output buffer, and the
//! configuration (dimensions, trim range, track styles, strategy). It
//! enforces a single-shot configure → generate → read lifecycle: setters
//! are only legal before [`generate`](Session::generate) is called, and
//! generation runs exactly once.
//!
//! # Example
//!
//! ```no_run
//! use moviebarcode::{Session, Style};
//!
//! let mut session = Session::open("input.mp4", 1000, 150)?;
//! session.set_styles(&[Style::Horizontal])?;
//! session.generate()?;
//! session.write("barcode.png")?;
//! # Ok::<(), moviebarcode::Error>(())
//! ```

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::{
    error::Error,
    media::MediaSource,
    progress::{CancellationToken, Progress},
    render::{composite_bgra, render_column},
    source::Source,
    style::{Strategy, Style, Track, layout_tracks},
};

/// Fraction of one output column covered by its sampling window. The
/// half-pixel overlap averages neighbouring content into each column.
const COLUMN_WINDOW: f64 = 0.95;

/// The session lifecycle. Transitions only move forward; `Done` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configuring,
    Generating,
    Done,
}

/// Provenance of the output buffer.
///
/// An owned buffer is allocated (zero-initialized) by the session; a
/// donated one was supplied by the caller via
/// [`set_buffer`](Session::set_buffer) and is only ever handed back, via
/// [`into_buffer`](Session::into_buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferOwnership {
    Owned,
    Donated,
}

/// A single-shot timeline-visualization session.
///
/// Data flows `Source` → style renderer → compositor → output buffer. The
/// source is reused serially across all tracks and passes; the pipeline is
/// single-threaded and synchronous, with progress readable from another
/// thread through [`progress_handle`](Session::progress_handle).
pub struct Session {
    width: u32,
    height: u32,
    source: Box<dyn Source>,
    tracks: Vec<Track>,
    strategy: Strategy,
    buffer: Vec<u8>,
    ownership: BufferOwnership,
    progress: Progress,
    cancellation: Option<CancellationToken>,
    state: State,
}

impl Session {
    /// Open a media file and create a session with the given output
    /// dimensions.
    ///
    /// Defaults: one [`Style::Horizontal`] track spanning the full height,
    /// [`Strategy::Fast`], trim range `[0, 1]`, and an owned
    /// zero-initialized buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if either dimension is zero, or
    /// [`Error::FileOpen`] if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self, Error> {
        let source = MediaSource::open(path)?;
        Self::from_source(Box::new(source), width, height)
    }

    /// Create a session over an already-constructed [`Source`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if either dimension is zero.
    pub fn from_source(
        source: Box<dyn Source>,
        width: u32,
        height: u32,
    ) -> Result<Self, Error> {
        if width < 1 || height < 1 {
            return Err(Error::InvalidDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            source,
            tracks: vec![Track {
                style: Style::Horizontal,
                height,
            }],
            strategy: Strategy::Fast,
            buffer: vec![0; width as usize * height as usize * 4],
            ownership: BufferOwnership::Owned,
            progress: Progress::new(),
            cancellation: None,
            state: State::Configuring,
        })
    }

    /// Output width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Output height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the output buffer in bytes (`width * height * 4`).
    pub fn buffer_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Current trim start, as a fraction of total duration.
    pub fn trim_start(&self) -> f64 {
        self.source.trim_start()
    }

    /// Current trim end, as a fraction of total duration.
    pub fn trim_end(&self) -> f64 {
        self.source.trim_end()
    }

    fn require_modifiable(&self) -> Result<(), Error> {
        if self.state == State::Configuring {
            Ok(())
        } else {
            Err(Error::SessionFrozen)
        }
    }

    /// Set the trim start, a fraction of total duration.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] after generation has started;
    /// [`Error::InvalidTrimRange`] unless `0 <= start < end`. On error the
    /// previous trim values are retained.
    pub fn set_start(&mut self, start: f64) -> Result<(), Error> {
        self.require_modifiable()?;
        self.source.set_trim(start, self.source.trim_end())
    }

    /// Set the trim end, a fraction of total duration.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] after generation has started;
    /// [`Error::InvalidTrimRange`] unless `start < end <= 1`. On error the
    /// previous trim values are retained.
    pub fn set_end(&mut self, end: f64) -> Result<(), Error> {
        self.require_modifiable()?;
        self.source.set_trim(self.source.trim_start(), end)
    }

    /// Set the rendering styles, one track per style.
    ///
    /// Replaces the previous track list entirely. Heights follow the
    /// [`layout_tracks`] policy and always sum to the output height.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] after generation has started;
    /// [`Error::TooManyTracks`] if there are more styles than pixel rows.
    /// On error the previous track list is retained.
    pub fn set_styles(&mut self, styles: &[Style]) -> Result<(), Error> {
        self.require_modifiable()?;
        self.tracks = layout_tracks(self.height, styles)?;
        Ok(())
    }

    /// Set the pass strategy.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] after generation has started.
    pub fn set_strategy(&mut self, strategy: Strategy) -> Result<(), Error> {
        self.require_modifiable()?;
        self.strategy = strategy;
        Ok(())
    }

    /// Donate an output buffer instead of the session's own allocation.
    ///
    /// The buffer must be exactly `width * height * 4` bytes. It is tagged
    /// as caller-provided and can be recovered with
    /// [`into_buffer`](Session::into_buffer) after generation.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] after generation has started;
    /// [`Error::BufferSizeMismatch`] if the size is wrong (the session
    /// keeps its previous buffer).
    pub fn set_buffer(&mut self, buffer: Vec<u8>) -> Result<(), Error> {
        self.require_modifiable()?;
        if buffer.len() != self.buffer_size() {
            return Err(Error::BufferSizeMismatch {
                expected: self.buffer_size(),
                actual: buffer.len(),
            });
        }
        self.buffer = buffer;
        self.ownership = BufferOwnership::Donated;
        Ok(())
    }

    /// Attach a cancellation token, checked between output columns during
    /// generation.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] after generation has started.
    pub fn set_cancellation(&mut self, token: CancellationToken) -> Result<(), Error> {
        self.require_modifiable()?;
        self.cancellation = Some(token);
        Ok(())
    }

    /// Current completion estimate in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        self.progress.value()
    }

    /// A cloneable [`Progress`] handle for polling from another thread
    /// while [`generate`](Session::generate) runs.
    pub fn progress_handle(&self) -> Progress {
        self.progress.clone()
    }

    /// Read access to the output buffer: packed row-major pixels, 4 bytes
    /// per pixel in B,G,R,A order.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns `true` if the output buffer was donated by the caller.
    pub fn buffer_is_donated(&self) -> bool {
        self.ownership == BufferOwnership::Donated
    }

    /// Consume the session and return the output buffer (owned or
    /// donated).
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// Run the generation pipeline.
    ///
    /// The configuration freezes the instant this is called; the session
    /// moves to its terminal state on return, and progress reads exactly
    /// `1.0` afterwards whether generation succeeded or failed. Columns
    /// composited before a failure are left in the buffer as-is.
    ///
    /// # Errors
    ///
    /// [`Error::SessionFrozen`] if generation already ran;
    /// [`Error::NoAudioStream`] / [`Error::NoVideoStream`] if a track's
    /// style has no matching stream; [`Error::Cancelled`] if the attached
    /// token fired; any decode error from the source.
    pub fn generate(&mut self) -> Result<(), Error> {
        self.require_modifiable()?;
        self.state = State::Generating;

        let result = self.run_passes();
        self.progress.finish();
        self.state = State::Done;
        if let Err(error) = &result {
            log::debug!("Generation aborted: {error}");
        }
        result
    }

    /// Decide which passes run, and run them in order.
    ///
    /// The approximate pass runs iff the strategy is [`Strategy::Live`] or
    /// the source reports that exact decoding does not apply; the exact
    /// pass runs iff it does. Approximate first, so a cheap keyframe-driven
    /// result is visible early and refined column-by-column.
    fn run_passes(&mut self) -> Result<(), Error> {
        self.source.build_seek_index(self.width)?;

        let exact_capable = self.source.exact_capable();
        let run_approximate = self.strategy == Strategy::Live || !exact_capable;

        for (exact, enabled) in [(false, run_approximate), (true, exact_capable)] {
            if enabled {
                self.run_pass(exact)?;
            }
        }
        Ok(())
    }

    /// Render every track, column by column, in the given mode.
    fn run_pass(&mut self, exact: bool) -> Result<(), Error> {
        log::debug!(
            "Running {} pass ({} tracks, {} columns)",
            if exact { "exact" } else { "approximate" },
            self.tracks.len(),
            self.width,
        );

        let tracks = self.tracks.clone();
        let track_count = tracks.len();
        let mut y_offset = 0u32;

        for (track_index, track) in tracks.iter().enumerate() {
            if track.style.is_audio() {
                if !self.source.has_audio() {
                    return Err(Error::NoAudioStream);
                }
            } else if !self.source.has_video() {
                return Err(Error::NoVideoStream);
            }

            // Marks the start of a fresh traversal for this track.
            self.source.set_exact(exact)?;

            let mut x = 0u32;
            while x < self.width {
                if let Some(token) = &self.cancellation
                    && token.is_cancelled()
                {
                    return Err(Error::Cancelled);
                }

                let min = (x as f64 + 0.5 - COLUMN_WINDOW / 2.0) / self.width as f64;
                let max = (x as f64 + 0.5 + COLUMN_WINDOW / 2.0) / self.width as f64;

                let frame = if track.style.is_audio() {
                    self.source.audio_frame(min, max)?
                } else {
                    self.source.video_frame(min, max)?
                };

                // No decodable content in this window: keep whatever an
                // earlier pass left here.
                let Some(frame) = frame else {
                    x += 1;
                    continue;
                };

                let column = render_column(track.style, &frame, track.height, x);
                composite_bgra(
                    &mut self.buffer,
                    self.width,
                    self.height,
                    &column,
                    x,
                    y_offset,
                );

                self.progress.advance_to(
                    ((track_index as f64 + x as f64 / self.width as f64) / track_count as f64)
                        as f32,
                );

                // Wide columns (thumbnails) cover several output columns;
                // skip ahead so the same tile is not resampled.
                x += column.width().max(1);
            }

            y_offset += track.height;
        }

        Ok(())
    }

    /// Encode the output buffer as an image file (format inferred from the
    /// extension, typically PNG).
    ///
    /// Legal any number of times once generation has run; also usable
    /// concurrently with progress polling.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyOutputPath`] for an empty path;
    /// [`Error::OutputIsInput`] if the target canonically resolves to the
    /// source file (overwrite guard); [`Error::ImageError`] /
    /// [`Error::IoError`] if encoding or writing fails. Neither file is
    /// modified on error.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::EmptyOutputPath);
        }

        // Only an existing output can canonicalize; a fresh path cannot
        // collide with the input.
        if let Ok(canonical_output) = std::fs::canonicalize(path)
            && let Some(input_path) = self.source.path()
            && let Ok(canonical_input) = std::fs::canonicalize(input_path)
            && canonical_output == canonical_input
        {
            return Err(Error::OutputIsInput {
                path: canonical_output,
            });
        }

        let mut rgba = Vec::with_capacity(self.buffer.len());
        for pixel in self.buffer.chunks_exact(4) {
            rgba.extend_from_slice(&[pixel[2], pixel[1], pixel[0], pixel[3]]);
        }
        let image = RgbaImage::from_raw(self.width, self.height, rgba).ok_or(
            Error::BufferSizeMismatch {
                expected: self.buffer_size(),
                actual: self.buffer.len(),
            },
        )?;
        image.save(path)?;

        log::info!(
            "Wrote {}x{} image to {}",
            self.width,
            self.height,
            path.display(),
        );
        Ok(())
    }

    /// The path of the bound source, if it was opened from the
    /// filesystem.
    pub fn source_path(&self) -> Option<PathBuf> {
        self.source.path().map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::rc::Rc;
    use std::time::Duration;

    use image::{DynamicImage, Rgba, RgbaImage};

    use super::*;

    /// A deterministic source: every video window yields a solid-color
    /// frame whose red channel encodes the window midpoint.
    struct ScriptedSource {
        has_video: bool,
        has_audio: bool,
        exact_capable: bool,
        start: f64,
        end: f64,
        frame_width: u32,
        frame_height: u32,
        path: Option<std::path::PathBuf>,
        video_requests: Rc<Cell<u32>>,
        exact_traversals: Rc<Cell<u32>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                has_video: true,
                has_audio: false,
                exact_capable: false,
                start: 0.0,
                end: 1.0,
                frame_width: 16,
                frame_height: 16,
                path: None,
                video_requests: Rc::new(Cell::new(0)),
                exact_traversals: Rc::new(Cell::new(0)),
            }
        }

        fn solid_frame(&self, min: f64, max: f64) -> DynamicImage {
            let mid = self.start + (min + max) / 2.0 * (self.end - self.start);
            let red = (mid.clamp(0.0, 1.0) * 255.0) as u8;
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                self.frame_width,
                self.frame_height,
                Rgba([red, 128, 64, 255]),
            ))
        }
    }

    impl Source for ScriptedSource {
        fn set_trim(&mut self, start: f64, end: f64) -> Result<(), Error> {
            if !(0.0..1.0).contains(&start) || end > 1.0 || start >= end {
                return Err(Error::InvalidTrimRange { start, end });
            }
            self.start = start;
            self.end = end;
            Ok(())
        }

        fn trim_start(&self) -> f64 {
            self.start
        }

        fn trim_end(&self) -> f64 {
            self.end
        }

        fn build_seek_index(&mut self, _target_width: u32) -> Result<(), Error> {
            Ok(())
        }

        fn has_video(&self) -> bool {
            self.has_video
        }

        fn has_audio(&self) -> bool {
            self.has_audio
        }

        fn set_exact(&mut self, exact: bool) -> Result<(), Error> {
            if exact {
                self.exact_traversals.set(self.exact_traversals.get() + 1);
            }
            Ok(())
        }

        fn exact_capable(&self) -> bool {
            self.exact_capable
        }

        fn video_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error> {
            self.video_requests.set(self.video_requests.get() + 1);
            Ok(Some(self.solid_frame(min, max)))
        }

        fn audio_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error> {
            Ok(Some(self.solid_frame(min, max)))
        }

        fn path(&self) -> Option<&Path> {
            self.path.as_deref()
        }

        fn duration(&self) -> Duration {
            Duration::from_secs(10)
        }
    }

    fn session_with(source: ScriptedSource, width: u32, height: u32) -> Session {
        Session::from_source(Box::new(source), width, height).unwrap()
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            Session::from_source(Box::new(ScriptedSource::new()), 0, 10),
            Err(Error::InvalidDimensions { .. })
        ));
        assert!(matches!(
            Session::from_source(Box::new(ScriptedSource::new()), 10, 0),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn buffer_size_is_width_height_times_four() {
        let session = session_with(ScriptedSource::new(), 100, 10);
        assert_eq!(session.buffer_size(), 100 * 10 * 4);
        assert_eq!(session.buffer().len(), 100 * 10 * 4);
        assert!(session.buffer().iter().all(|&byte| byte == 0));
    }

    #[test]
    fn horizontal_fast_scenario_fills_buffer() {
        let mut session = session_with(ScriptedSource::new(), 100, 10);
        session.set_styles(&[Style::Horizontal]).unwrap();
        session.set_strategy(Strategy::Fast).unwrap();

        session.generate().unwrap();

        assert_eq!(session.progress(), 1.0);
        // Every sampled window yielded a frame, so every column's alpha
        // must be populated.
        for x in 0..100usize {
            for y in 0..10usize {
                let offset = 4 * (y * 100 + x);
                assert_eq!(session.buffer()[offset + 3], 255, "column {x} row {y}");
            }
        }
    }

    #[test]
    fn columns_encode_increasing_time() {
        let mut session = session_with(ScriptedSource::new(), 50, 4);
        session.generate().unwrap();

        // The red channel (offset 2 in BGRA) encodes the window midpoint,
        // so it must increase monotonically left to right.
        let buffer = session.buffer();
        let red_at = |x: usize| buffer[4 * x + 2];
        assert!(red_at(0) < red_at(25));
        assert!(red_at(25) < red_at(49));
    }

    #[test]
    fn setters_fail_after_generate() {
        let mut session = session_with(ScriptedSource::new(), 10, 10);
        session.generate().unwrap();

        assert!(matches!(session.set_start(0.1), Err(Error::SessionFrozen)));
        assert!(matches!(session.set_end(0.9), Err(Error::SessionFrozen)));
        assert!(matches!(
            session.set_styles(&[Style::Vertical]),
            Err(Error::SessionFrozen)
        ));
        assert!(matches!(
            session.set_strategy(Strategy::Live),
            Err(Error::SessionFrozen)
        ));
        assert!(matches!(
            session.set_buffer(vec![0; 10 * 10 * 4]),
            Err(Error::SessionFrozen)
        ));
        assert!(matches!(session.generate(), Err(Error::SessionFrozen)));
    }

    #[test]
    fn invalid_trim_is_rejected_and_previous_values_kept() {
        let mut session = session_with(ScriptedSource::new(), 10, 10);
        session.set_start(0.5).unwrap();

        assert!(matches!(
            session.set_end(0.3),
            Err(Error::InvalidTrimRange { .. })
        ));
        assert_eq!(session.trim_start(), 0.5);
        assert_eq!(session.trim_end(), 1.0);

        // Still modifiable after the rejection.
        session.set_end(0.8).unwrap();
        assert_eq!(session.trim_end(), 0.8);
    }

    #[test]
    fn negative_or_out_of_range_trim_is_rejected() {
        let mut session = session_with(ScriptedSource::new(), 10, 10);
        assert!(session.set_start(-0.1).is_err());
        assert!(session.set_end(1.5).is_err());
        assert_eq!(session.trim_start(), 0.0);
        assert_eq!(session.trim_end(), 1.0);
    }

    #[test]
    fn spectrogram_without_audio_fails_with_progress_pinned() {
        let mut session = session_with(ScriptedSource::new(), 20, 10);
        session
            .set_styles(&[Style::Horizontal, Style::Spectrogram])
            .unwrap();

        let result = session.generate();
        assert!(matches!(result, Err(Error::NoAudioStream)));
        assert_eq!(session.progress(), 1.0);

        // The first (video) track was already rendered and stays in the
        // buffer; the spectrogram band was never touched.
        let buffer = session.buffer();
        assert_eq!(buffer[3], 255, "first track rendered");
        let second_band_offset = 4 * (5 * 20);
        assert!(
            buffer[second_band_offset..].iter().all(|&byte| byte == 0),
            "second track untouched"
        );
    }

    #[test]
    fn video_style_without_video_fails() {
        let mut source = ScriptedSource::new();
        source.has_video = false;
        source.has_audio = true;
        let mut session = session_with(source, 10, 10);

        assert!(matches!(session.generate(), Err(Error::NoVideoStream)));
        assert_eq!(session.progress(), 1.0);
    }

    #[test]
    fn exact_capable_source_gets_an_exact_pass() {
        let mut source = ScriptedSource::new();
        source.exact_capable = true;
        let traversals = Rc::clone(&source.exact_traversals);
        let requests = Rc::clone(&source.video_requests);

        let mut session = session_with(source, 10, 10);
        session.generate().unwrap();

        // Fast strategy + exact-capable source: exact pass only.
        assert_eq!(traversals.get(), 1);
        assert_eq!(requests.get(), 10);
    }

    #[test]
    fn live_strategy_adds_an_approximate_pass() {
        let mut source = ScriptedSource::new();
        source.exact_capable = true;
        let requests = Rc::clone(&source.video_requests);

        let mut session = session_with(source, 10, 10);
        session.set_strategy(Strategy::Live).unwrap();
        session.generate().unwrap();

        // Both passes ran, each sampling every column once.
        assert_eq!(requests.get(), 20);
    }

    #[test]
    fn thumbnails_skip_covered_columns() {
        let mut source = ScriptedSource::new();
        source.frame_width = 32;
        source.frame_height = 16; // 2:1, thumbnails are 20px wide at h=10
        let requests = Rc::clone(&source.video_requests);

        let mut session = session_with(source, 100, 10);
        session.set_styles(&[Style::Thumbnails]).unwrap();
        session.generate().unwrap();

        assert_eq!(requests.get(), 100_u32.div_ceil(20));
    }

    #[test]
    fn donated_buffer_is_validated_and_returned() {
        let mut session = session_with(ScriptedSource::new(), 10, 10);

        assert!(matches!(
            session.set_buffer(vec![0; 7]),
            Err(Error::BufferSizeMismatch {
                expected: 400,
                actual: 7
            })
        ));
        assert!(!session.buffer_is_donated());

        session.set_buffer(vec![0; 400]).unwrap();
        assert!(session.buffer_is_donated());

        session.generate().unwrap();
        let buffer = session.into_buffer();
        assert_eq!(buffer.len(), 400);
        assert!(buffer.iter().any(|&byte| byte != 0));
    }

    #[test]
    fn cancellation_aborts_between_columns() {
        let mut session = session_with(ScriptedSource::new(), 10, 10);
        let token = CancellationToken::new();
        session.set_cancellation(token.clone()).unwrap();
        token.cancel();

        assert!(matches!(session.generate(), Err(Error::Cancelled)));
        assert_eq!(session.progress(), 1.0);
    }

    #[test]
    fn write_round_trips_dimensions() {
        let mut session = session_with(ScriptedSource::new(), 32, 8);
        session.generate().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("barcode.png");
        session.write(&output).unwrap();

        let reread = image::open(&output).unwrap();
        assert_eq!(reread.width(), 32);
        assert_eq!(reread.height(), 8);
    }

    #[test]
    fn write_rejects_empty_path_and_input_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, b"not really a video").unwrap();

        let mut source = ScriptedSource::new();
        source.path = Some(input.clone());
        let session = session_with(source, 4, 4);

        assert!(matches!(session.write(""), Err(Error::EmptyOutputPath)));
        assert!(matches!(
            session.write(&input),
            Err(Error::OutputIsInput { .. })
        ));
        // The guard must not have touched the input file.
        assert_eq!(std::fs::read(&input).unwrap(), b"not really a video");
    }

    #[test]
    fn progress_is_monotonic_across_generation() {
        // Record the session's own progress at every sampled column by
        // routing a handle into the source through shared cells.
        struct Watcher {
            inner: ScriptedSource,
            handle: Rc<RefCell<Option<Progress>>>,
            seen: Rc<RefCell<Vec<f32>>>,
        }

        impl Source for Watcher {
            fn set_trim(&mut self, start: f64, end: f64) -> Result<(), Error> {
                self.inner.set_trim(start, end)
            }
            fn trim_start(&self) -> f64 {
                self.inner.trim_start()
            }
            fn trim_end(&self) -> f64 {
                self.inner.trim_end()
            }
            fn build_seek_index(&mut self, width: u32) -> Result<(), Error> {
                self.inner.build_seek_index(width)
            }
            fn has_video(&self) -> bool {
                self.inner.has_video()
            }
            fn has_audio(&self) -> bool {
                self.inner.has_audio()
            }
            fn set_exact(&mut self, exact: bool) -> Result<(), Error> {
                self.inner.set_exact(exact)
            }
            fn exact_capable(&self) -> bool {
                self.inner.exact_capable()
            }
            fn video_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error> {
                if let Some(handle) = self.handle.borrow().as_ref() {
                    self.seen.borrow_mut().push(handle.value());
                }
                self.inner.video_frame(min, max)
            }
            fn audio_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error> {
                self.inner.audio_frame(min, max)
            }
            fn path(&self) -> Option<&Path> {
                self.inner.path()
            }
            fn duration(&self) -> Duration {
                self.inner.duration()
            }
        }

        let handle = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let watcher = Watcher {
            inner: ScriptedSource::new(),
            handle: Rc::clone(&handle),
            seen: Rc::clone(&seen),
        };
        let mut session = Session::from_source(Box::new(watcher), 20, 5).unwrap();
        *handle.borrow_mut() = Some(session.progress_handle());

        session.generate().unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 20);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(seen[0], 0.0);
        assert_eq!(session.progress(), 1.0);
    }
}
