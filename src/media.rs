//! FFmpeg-backed [`Source`] implementation.
//!
//! [`MediaSource`] opens a media file via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate and serves the
//! generation pipeline's per-window frame requests. It supports two traversal
//! modes: an approximate mode that seeks by a keyframe index built over the
//! trimmed range, and an exact mode that decodes strictly sequentially for
//! frame-accurate sampling. Audio windows are decoded to mono f32 samples and
//! rendered into a frequency-magnitude column for the spectrogram style.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    ChannelLayout, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder,
    format::{Pixel, Sample, context::Input, sample::Type as SampleType},
    frame::{Audio as AudioFrame, Video as VideoFrame},
    media::Type,
    software::resampling::Context as ResamplingContext,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level as FfmpegLogLevel,
};
use image::{DynamicImage, Rgba, RgbaImage, RgbImage};

use crate::{error::Error, source::Source};

/// Number of frequency rows in a rendered spectrogram column.
const SPECTRUM_ROWS: usize = 128;

/// Maximum number of mono samples analyzed per spectrogram column. Windows
/// longer than this are center-cropped so the per-column cost stays bounded.
const SPECTRUM_WINDOW: usize = 2048;

/// Decoding state for the video stream, recreated at the start of every
/// traversal (see [`Source::set_exact`]).
struct VideoState {
    decoder: decoder::Video,
    scaler: ScalingContext,
    time_base: Rational,
    stream_index: usize,
    /// EOF has been sent to the decoder; no more packets will be read.
    finished: bool,
    /// Timestamp and converted image of the most recently returned frame.
    last: Option<(f64, DynamicImage)>,
    /// Keyframe timestamp the approximate mode last seeked to.
    last_seek_pts: Option<i64>,
}

/// A media file opened for timeline sampling.
///
/// Exclusively owned by one [`Session`](crate::Session) and used serially:
/// seeking and decoding are never invoked concurrently.
///
/// # Example
///
/// ```no_run
/// use moviebarcode::MediaSource;
///
/// let source = MediaSource::open("input.mp4")?;
/// # Ok::<(), moviebarcode::Error>(())
/// ```
pub struct MediaSource {
    input: Input,
    path: PathBuf,
    duration: Duration,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    /// Trim bounds as fractions of total duration.
    start: f64,
    end: f64,
    exact: bool,
    exact_capable: bool,
    /// Keyframe timestamps (video stream time base) inside the trimmed
    /// range, in presentation order.
    keyframes: Vec<i64>,
    video: Option<VideoState>,
}

impl MediaSource {
    /// Open a media file for timeline sampling.
    ///
    /// Initializes FFmpeg (idempotent), silences FFmpeg's own stderr
    /// logging, opens the file, and locates the best video and audio
    /// streams.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileOpen`] if the file cannot be opened or has no
    /// recognisable media streams.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| Error::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;
        ffmpeg_next::util::log::set_level(FfmpegLogLevel::Quiet);

        let input = ffmpeg_next::format::input(&path).map_err(|error| Error::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let video_stream_index = input
            .streams()
            .best(Type::Video)
            .map(|stream| stream.index());
        let audio_stream_index = input
            .streams()
            .best(Type::Audio)
            .map(|stream| stream.index());

        if video_stream_index.is_none() && audio_stream_index.is_none() {
            return Err(Error::FileOpen {
                path,
                reason: "File contains neither video nor audio streams".to_string(),
            });
        }

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        log::info!(
            "Opened media file: {} (format={}, duration={:.2}s, video={}, audio={})",
            path.display(),
            input.format().name(),
            duration.as_secs_f64(),
            video_stream_index.is_some(),
            audio_stream_index.is_some(),
        );

        Ok(Self {
            input,
            path,
            duration,
            video_stream_index,
            audio_stream_index,
            start: 0.0,
            end: 1.0,
            exact: false,
            exact_capable: false,
            keyframes: Vec::new(),
            video: None,
        })
    }

    /// Map a normalized window inside the trimmed range to absolute
    /// seconds.
    fn window_seconds(&self, min: f64, max: f64) -> (f64, f64) {
        let total = self.duration.as_secs_f64();
        let span = self.end - self.start;
        (
            (self.start + min.clamp(0.0, 1.0) * span) * total,
            (self.start + max.clamp(0.0, 1.0) * span) * total,
        )
    }

    /// Pull the next decoded frame for the current video traversal,
    /// reading packets as needed. Returns `None` once the stream is
    /// exhausted and the decoder drained.
    fn next_video_frame(input: &mut Input, state: &mut VideoState) -> Result<Option<VideoFrame>, Error> {
        let mut frame = VideoFrame::empty();
        loop {
            if state.decoder.receive_frame(&mut frame).is_ok() {
                return Ok(Some(frame));
            }
            if state.finished {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(input) {
                Ok(()) => {
                    if packet.stream() == state.stream_index {
                        state.decoder.send_packet(&packet)?;
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    state.decoder.send_eof()?;
                    state.finished = true;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Scale a decoded frame to RGB24 and convert it to a
    /// [`DynamicImage`].
    fn convert_frame(state: &mut VideoState, frame: &VideoFrame) -> Result<DynamicImage, Error> {
        let mut rgb_frame = VideoFrame::empty();
        state.scaler.run(frame, &mut rgb_frame)?;

        let width = rgb_frame.width();
        let height = rgb_frame.height();
        let buffer = strip_stride(&rgb_frame, width, height);
        let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            Error::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(rgb_image))
    }

    /// Exact traversal: decode forward until the stream reaches
    /// `target_seconds`, never seeking backward within a pass.
    fn exact_video_frame(&mut self, target_seconds: f64) -> Result<Option<DynamicImage>, Error> {
        let Some(state) = self.video.as_mut() else {
            return Ok(None);
        };

        if let Some((seconds, image)) = &state.last
            && *seconds >= target_seconds
        {
            return Ok(Some(image.clone()));
        }

        loop {
            match Self::next_video_frame(&mut self.input, state)? {
                Some(frame) => {
                    let seconds = pts_to_seconds(frame.pts().unwrap_or(0), state.time_base);
                    if seconds >= target_seconds {
                        let image = Self::convert_frame(state, &frame)?;
                        state.last = Some((seconds, image.clone()));
                        return Ok(Some(image));
                    }
                }
                // Stream exhausted before the target: hold the last frame
                // for any trailing columns.
                None => return Ok(state.last.as_ref().map(|(_, image)| image.clone())),
            }
        }
    }

    /// Approximate traversal: seek to the nearest indexed keyframe at or
    /// before the target and decode one frame. Columns that map to the
    /// same keyframe reuse the cached frame without touching the decoder.
    fn approximate_video_frame(&mut self, target_seconds: f64) -> Result<Option<DynamicImage>, Error> {
        let Some(state) = self.video.as_mut() else {
            return Ok(None);
        };

        let target_pts = seconds_to_pts(target_seconds, state.time_base);
        let seek_pts = self
            .keyframes
            .iter()
            .copied()
            .take_while(|&pts| pts <= target_pts)
            .last()
            .unwrap_or(target_pts);

        if state.last_seek_pts == Some(seek_pts)
            && let Some((_, image)) = &state.last
        {
            return Ok(Some(image.clone()));
        }

        self.input.seek(seek_pts, ..seek_pts)?;
        state.decoder.flush();
        state.finished = false;
        state.last_seek_pts = Some(seek_pts);

        match Self::next_video_frame(&mut self.input, state)? {
            Some(frame) => {
                let seconds = pts_to_seconds(frame.pts().unwrap_or(0), state.time_base);
                let image = Self::convert_frame(state, &frame)?;
                state.last = Some((seconds, image.clone()));
                Ok(Some(image))
            }
            None => Ok(None),
        }
    }

    /// Decode the window's audio packets to mono f32 samples.
    fn decode_audio_window(
        &mut self,
        window_start: f64,
        window_end: f64,
    ) -> Result<Vec<f32>, Error> {
        let Some(audio_stream_index) = self.audio_stream_index else {
            return Ok(Vec::new());
        };

        let (time_base, mut audio_decoder) = {
            let stream = self
                .input
                .stream(audio_stream_index)
                .ok_or(Error::NoAudioStream)?;
            let decoder_context = CodecContext::from_parameters(stream.parameters())?;
            let audio_decoder = decoder_context.decoder().audio().map_err(|error| {
                Error::AudioDecodeError(format!("Failed to create audio decoder: {error}"))
            })?;
            (stream.time_base(), audio_decoder)
        };

        let sample_rate = audio_decoder.rate();
        let mut resampler = ResamplingContext::get(
            audio_decoder.format(),
            audio_decoder.channel_layout(),
            sample_rate,
            Sample::F32(SampleType::Packed),
            ChannelLayout::MONO,
            sample_rate,
        )
        .map_err(|error| Error::AudioDecodeError(format!("Failed to create resampler: {error}")))?;

        let start_pts = seconds_to_pts(window_start, time_base);
        let end_pts = seconds_to_pts(window_end, time_base);
        self.input.seek(start_pts, ..start_pts)?;

        let mut samples: Vec<f32> = Vec::new();
        let mut decoded_frame = AudioFrame::empty();
        let mut resampled_frame = AudioFrame::empty();

        'packets: loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != audio_stream_index {
                        continue;
                    }
                    if let Some(packet_pts) = packet.pts()
                        && packet_pts > end_pts
                    {
                        break;
                    }
                    audio_decoder.send_packet(&packet).map_err(|error| {
                        Error::AudioDecodeError(format!("Audio decode error: {error}"))
                    })?;
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(error) => return Err(error.into()),
            }

            while audio_decoder.receive_frame(&mut decoded_frame).is_ok() {
                resampler
                    .run(&decoded_frame, &mut resampled_frame)
                    .map_err(|error| {
                        Error::AudioDecodeError(format!("Resample error: {error}"))
                    })?;

                let data = resampled_frame.data(0);
                let sample_count = resampled_frame.samples();
                let float_samples: &[f32] = unsafe {
                    std::slice::from_raw_parts(data.as_ptr() as *const f32, sample_count)
                };
                samples.extend_from_slice(float_samples);

                // One window's worth is plenty; stop early on long windows.
                if samples.len() >= 8 * SPECTRUM_WINDOW {
                    break 'packets;
                }
            }
        }

        Ok(samples)
    }
}

impl Source for MediaSource {
    fn set_trim(&mut self, start: f64, end: f64) -> Result<(), Error> {
        if !(0.0..1.0).contains(&start) || !(start..=1.0).contains(&end) || start >= end {
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

    fn build_seek_index(&mut self, target_width: u32) -> Result<(), Error> {
        self.keyframes.clear();

        let Some(video_stream_index) = self.video_stream_index else {
            // Audio-only file: there is nothing to refine with an exact
            // video pass.
            self.exact_capable = false;
            return Ok(());
        };

        let time_base = self
            .input
            .stream(video_stream_index)
            .ok_or(Error::NoVideoStream)?
            .time_base();
        let total = self.duration.as_secs_f64();
        let range_start = self.start * total;
        let range_end = self.end * total;

        self.input.seek(0, ..0)?;

        let mut packet = Packet::empty();
        let mut video_packets: u64 = 0;
        loop {
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != video_stream_index {
                        continue;
                    }
                    video_packets += 1;
                    if packet.is_key()
                        && let Some(pts) = packet.pts()
                    {
                        let seconds = pts_to_seconds(pts, time_base);
                        if seconds >= range_start && seconds <= range_end {
                            self.keyframes.push(pts);
                        }
                    }
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(error) => return Err(error.into()),
            }
        }
        self.keyframes.sort_unstable();

        // With fewer seek points than half the output columns, keyframe
        // seeking alone smears the timeline; an exact pass applies.
        self.exact_capable = (self.keyframes.len() as u32) < target_width / 2;

        log::debug!(
            "Seek index: {} keyframes across {} video packets in trim [{:.3}, {:.3}], exact={}",
            self.keyframes.len(),
            video_packets,
            self.start,
            self.end,
            self.exact_capable,
        );

        self.input.seek(0, ..0)?;
        Ok(())
    }

    fn has_video(&self) -> bool {
        self.video_stream_index.is_some()
    }

    fn has_audio(&self) -> bool {
        self.audio_stream_index.is_some()
    }

    fn set_exact(&mut self, exact: bool) -> Result<(), Error> {
        self.exact = exact;

        let Some(video_stream_index) = self.video_stream_index else {
            return Ok(());
        };

        // Fresh decoder and scaler for the new traversal.
        let (time_base, video_decoder) = {
            let stream = self
                .input
                .stream(video_stream_index)
                .ok_or(Error::NoVideoStream)?;
            let decoder_context = CodecContext::from_parameters(stream.parameters())?;
            let video_decoder = decoder_context.decoder().video()?;
            (stream.time_base(), video_decoder)
        };

        let scaler = ScalingContext::get(
            video_decoder.format(),
            video_decoder.width(),
            video_decoder.height(),
            Pixel::RGB24,
            video_decoder.width(),
            video_decoder.height(),
            ScalingFlags::BILINEAR,
        )?;

        let start_pts = seconds_to_pts(self.start * self.duration.as_secs_f64(), time_base);
        self.input.seek(start_pts, ..start_pts)?;

        self.video = Some(VideoState {
            decoder: video_decoder,
            scaler,
            time_base,
            stream_index: video_stream_index,
            finished: false,
            last: None,
            last_seek_pts: None,
        });

        Ok(())
    }

    fn exact_capable(&self) -> bool {
        self.exact_capable
    }

    fn video_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error> {
        if self.video_stream_index.is_none() {
            return Ok(None);
        }
        let (window_start, window_end) = self.window_seconds(min, max);
        let target_seconds = (window_start + window_end) / 2.0;

        if self.exact {
            self.exact_video_frame(target_seconds)
        } else {
            self.approximate_video_frame(target_seconds)
        }
    }

    fn audio_frame(&mut self, min: f64, max: f64) -> Result<Option<DynamicImage>, Error> {
        let (window_start, window_end) = self.window_seconds(min, max);
        let samples = self.decode_audio_window(window_start, window_end)?;
        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(spectrum_column(&samples)))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

/// Copy pixel data from a scaled RGB24 frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3); this
/// strips it so the result can be passed to [`RgbImage::from_raw`].
fn strip_stride(rgb_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = rgb_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a timestamp in stream time base to seconds.
fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64
}

/// Rescale seconds to a timestamp in stream time base.
fn seconds_to_pts(seconds: f64, time_base: Rational) -> i64 {
    (seconds * time_base.denominator() as f64 / time_base.numerator().max(1) as f64) as i64
}

/// Render mono samples into a grayscale frequency-magnitude column, low
/// frequencies at the bottom.
///
/// Uses a direct DFT over a center crop of the window — one dot product per
/// output row, bounded by [`SPECTRUM_WINDOW`].
fn spectrum_column(samples: &[f32]) -> DynamicImage {
    let window = if samples.len() > SPECTRUM_WINDOW {
        let offset = (samples.len() - SPECTRUM_WINDOW) / 2;
        &samples[offset..offset + SPECTRUM_WINDOW]
    } else {
        samples
    };
    let length = window.len();

    let mut column = RgbaImage::new(1, SPECTRUM_ROWS as u32);
    for row in 0..SPECTRUM_ROWS {
        // Map rows linearly onto the lower half of the spectrum.
        let frequency_bin = (row + 1) * (length / 2) / SPECTRUM_ROWS;
        let mut real = 0.0_f64;
        let mut imaginary = 0.0_f64;
        for (n, &sample) in window.iter().enumerate() {
            let angle =
                2.0 * std::f64::consts::PI * frequency_bin as f64 * n as f64 / length as f64;
            real += sample as f64 * angle.cos();
            imaginary -= sample as f64 * angle.sin();
        }
        let magnitude = (real * real + imaginary * imaginary).sqrt() / length as f64;

        // Map [-60 dB, 0 dB] to [0, 255].
        let decibels = 20.0 * (magnitude + 1e-9).log10();
        let intensity = (((decibels + 60.0) / 60.0).clamp(0.0, 1.0) * 255.0) as u8;

        let y = (SPECTRUM_ROWS - 1 - row) as u32;
        column.put_pixel(0, y, Rgba([intensity, intensity, intensity, 255]));
    }

    DynamicImage::ImageRgba8(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_conversions_round_trip() {
        let time_base = Rational::new(1, 90_000);
        let pts = seconds_to_pts(12.5, time_base);
        assert_eq!(pts, 1_125_000);
        assert!((pts_to_seconds(pts, time_base) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn spectrum_column_has_fixed_dimensions() {
        let samples = vec![0.0_f32; 512];
        let column = spectrum_column(&samples);
        assert_eq!(column.width(), 1);
        assert_eq!(column.height(), SPECTRUM_ROWS as u32);
    }

    #[test]
    fn silence_renders_dark_and_tone_renders_bright() {
        let silence = vec![0.0_f32; 1024];
        let dark = spectrum_column(&silence).to_rgba8();
        assert!(dark.pixels().all(|pixel| pixel.0[0] == 0));

        // A loud sine somewhere in the analyzed band must light up at
        // least one row.
        let tone: Vec<f32> = (0..1024)
            .map(|n| (2.0 * std::f32::consts::PI * 64.0 * n as f32 / 1024.0).sin())
            .collect();
        let bright = spectrum_column(&tone).to_rgba8();
        assert!(bright.pixels().any(|pixel| pixel.0[0] > 128));
    }
}
