//! Engine configuration.

use std::time::Duration;

/// Fixed operating sample rate of the original tap-along engine.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Interleaved output channel count (stereo).
pub const OUTPUT_CHANNELS: usize = 2;

/// Capture channel count (mono).
pub const INPUT_CHANNELS: usize = 1;

/// Configuration for an [`AudioEngine`](crate::AudioEngine).
///
/// Use [`EngineConfig::default()`] for the standard 44.1kHz setup, or
/// customize as needed.
///
/// # Example
///
/// ```
/// use tapstory_audio::EngineConfig;
///
/// let config = EngineConfig {
///     buffer_size: Some(256),
///     ..Default::default()
/// };
/// assert_eq!(config.sample_rate, 44_100);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Operating sample rate in Hz, shared by playback and capture.
    ///
    /// The engine never resamples; tracks and recordings are at this rate.
    /// Default: 44100
    pub sample_rate: u32,

    /// Requested device buffer size in frames.
    ///
    /// `None` lets the device choose. Small fixed sizes give lower latency.
    /// Default: `None`
    pub buffer_size: Option<u32>,

    /// Size of the preallocated capture scratch buffer, in frames.
    ///
    /// Callbacks larger than this are still fully served; the capture path
    /// reads them in pieces.
    /// Default: 4096
    pub max_callback_frames: usize,

    /// Capacity of the ring between the input device and the audio callback.
    ///
    /// Default: 1 second
    pub capture_buffer: Duration,

    /// Capacity of the ring between the audio callback and the recording writer.
    ///
    /// If the writer falls this far behind, newly captured samples are dropped.
    /// Default: 10 seconds
    pub recording_buffer: Duration,

    /// How long the recording writer sleeps when it finds the ring empty.
    ///
    /// Default: 5ms
    pub writer_poll_interval: Duration,

    /// Output device name, or `None` for the system default.
    pub output_device: Option<String>,

    /// Input device name, or `None` for the system default.
    pub input_device: Option<String>,
}

impl EngineConfig {
    /// Number of mono samples that fit in `duration` at the configured rate.
    #[must_use]
    pub fn samples_for(&self, duration: Duration) -> usize {
        (f64::from(self.sample_rate) * duration.as_secs_f64()) as usize
    }

    /// Converts a frame position to seconds at the configured rate.
    #[must_use]
    pub fn frames_to_secs(&self, frames: i64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(self.sample_rate)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: None,
            max_callback_frames: 4096,
            capture_buffer: Duration::from_secs(1),
            recording_buffer: Duration::from_secs(10),
            writer_poll_interval: Duration::from_millis(5),
            output_device: None,
            input_device: None,
        }
    }
}
