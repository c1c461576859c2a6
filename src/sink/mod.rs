//! Sink trait and implementations for recording destinations.
//!
//! A [`Sink`] receives the gated microphone samples of a recording session.
//! The crate provides [`FileSink`], which writes either raw headerless PCM or
//! a WAV file. Implement [`Sink`] yourself to stream takes elsewhere.
//!
//! Sinks never run on the real-time thread. Each recording session owns its
//! sink on a dedicated writer thread, which is why the methods take
//! `&mut self` and the trait only requires `Send`.

mod file;

pub use file::FileSink;

use crate::SinkError;

/// A destination for recorded audio.
///
/// Samples are mono signed 16-bit at the engine sample rate, in capture
/// order.
///
/// # Lifecycle
///
/// 1. [`open`](Sink::open) is called on the control thread by
///    `start_recording`; an error here aborts the session.
/// 2. [`write`](Sink::write) is called on the writer thread for each batch
///    drained from the recording ring.
/// 3. [`finish`](Sink::finish) is called exactly once when the session ends,
///    even if a write failed.
///
/// # Example
///
/// ```
/// use tapstory_audio::{Sink, SinkError};
///
/// struct PeakMeter {
///     peak: i16,
/// }
///
/// impl Sink for PeakMeter {
///     fn name(&self) -> &str {
///         "peak-meter"
///     }
///
///     fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
///         for &s in samples {
///             self.peak = self.peak.max(s.saturating_abs());
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send {
    /// Human-readable name for logging and events.
    fn name(&self) -> &str;

    /// Acquires whatever the sink writes to.
    ///
    /// Default implementation does nothing.
    fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Appends a batch of samples.
    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError>;

    /// Flushes and releases resources.
    ///
    /// Default implementation does nothing.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> Result<(), SinkError> {
        (**self).open()
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        (**self).write(samples)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}
