//! # moviebarcode
//!
//! Render a video's timeline as a single still image — barcodes, thumbnail
//! strips, slitscans, and spectrograms.
//!
//! `moviebarcode` samples a media file at evenly spaced points along its
//! timeline, renders each sample into a one-column (or thumbnail-wide)
//! strip, and composites the strips left to right into one output image.
//! Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
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
//!
//! ### Stacked Tracks
//!
//! Each style gets its own horizontal band of the output, stacked top to
//! bottom:
//!
//! ```no_run
//! use moviebarcode::{Session, Style};
//!
//! let mut session = Session::open("input.mp4", 1000, 300)?;
//! session.set_styles(&[Style::Horizontal, Style::Thumbnails, Style::Spectrogram])?;
//! session.generate()?;
//! session.write("stacked.png")?;
//! # Ok::<(), moviebarcode::Error>(())
//! ```
//!
//! ### Progress and Cancellation
//!
//! ```no_run
//! use moviebarcode::{CancellationToken, Session};
//!
//! let mut session = Session::open("input.mp4", 1000, 150)?;
//! let progress = session.progress_handle();
//! let token = CancellationToken::new();
//! session.set_cancellation(token.clone())?;
//!
//! let poller = std::thread::spawn(move || {
//!     while progress.value() < 1.0 {
//!         eprintln!("{:.0}%", progress.value() * 100.0);
//!         std::thread::sleep(std::time::Duration::from_millis(200));
//!     }
//! });
//!
//! session.generate()?;
//! poller.join().unwrap();
//! # Ok::<(), moviebarcode::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Six rendering styles** — horizontal and vertical barcodes,
//!   thumbnail strips, slitscans, middle-column scans, and audio
//!   spectrograms
//! - **Stacked tracks** — combine any number of styles in one image
//! - **Two-phase decoding** — a fast keyframe-driven pass for quick
//!   results, refined by an exact sequential pass when the file allows it
//! - **Trimming** — restrict generation to a fraction of the timeline
//! - **Progress & cancellation** — a lock-free progress handle pollable
//!   from another thread, and a `CancellationToken` checked between
//!   columns
//! - **Caller-provided buffers** — render directly into memory you own
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod error;
pub mod media;
pub mod progress;
mod render;
pub mod session;
pub mod source;
pub mod style;

pub use error::Error;
pub use media::MediaSource;
pub use progress::{CancellationToken, Progress};
pub use session::Session;
pub use source::Source;
pub use style::{Strategy, Style, Track, layout_tracks};
