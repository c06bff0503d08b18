//! Progress reporting and cancellation support.
//!
//! This module provides [`Progress`], a lock-free completion estimate that a
//! second thread can poll while [`Session::generate`](crate::Session::generate)
//! runs on its owning thread, and [`CancellationToken`] for cooperative
//! cancellation between output columns.
//!
//! # Example
//!
//! ```no_run
//! use moviebarcode::Session;
//!
//! let mut session = Session::open("input.mp4", 1000, 150)?;
//! let progress = session.progress_handle();
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

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

/// A monotonically increasing completion estimate in `0.0..=1.0`.
///
/// Backed by a single shared atomic scalar, so polling never blocks the
/// generating thread. The value reaches exactly `1.0` when generation
/// finishes, whether it succeeded or failed — it signals "no more work will
/// occur", not "succeeded".
#[derive(Debug, Clone)]
pub struct Progress {
    // f32 bit pattern. Non-negative floats order the same as their bits,
    // so fetch_max keeps the value monotonic even with racing stores.
    bits: Arc<AtomicU32>,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(0.0_f32.to_bits())),
        }
    }

    /// Read the current completion estimate.
    pub fn value(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Raise the estimate to `value`. Lower values are ignored.
    pub(crate) fn advance_to(&self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.bits.fetch_max(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Pin the estimate at `1.0`.
    pub(crate) fn finish(&self) {
        self.bits.store(1.0_f32.to_bits(), Ordering::Relaxed);
    }
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation. The generation loop checks
/// [`is_cancelled`](CancellationToken::is_cancelled) between output columns
/// and aborts with [`Error::Cancelled`](crate::Error::Cancelled).
///
/// # Example
///
/// ```
/// use moviebarcode::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic() {
        let progress = Progress::new();
        assert_eq!(progress.value(), 0.0);
        progress.advance_to(0.5);
        progress.advance_to(0.25);
        assert_eq!(progress.value(), 0.5);
        progress.advance_to(0.75);
        assert_eq!(progress.value(), 0.75);
    }

    #[test]
    fn finish_pins_at_one() {
        let progress = Progress::new();
        progress.advance_to(0.3);
        progress.finish();
        assert_eq!(progress.value(), 1.0);
    }

    #[test]
    fn advance_clamps_out_of_range_values() {
        let progress = Progress::new();
        progress.advance_to(7.0);
        assert_eq!(progress.value(), 1.0);
    }

    #[test]
    fn handles_share_one_value() {
        let progress = Progress::new();
        let clone = progress.clone();
        progress.advance_to(0.4);
        assert_eq!(clone.value(), 0.4);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
