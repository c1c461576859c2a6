//! Audio device capability.
//!
//! The engine never talks to an audio API directly. It asks an
//! [`AudioBackend`] for a playback stream (which drives the engine through an
//! [`OutputCallback`]) and a polled capture stream (read through a
//! [`CaptureReader`] from inside that same callback).
//!
//! Two backends ship with the crate:
//! - [`CpalBackend`]: real devices via CPAL
//! - [`MockBackend`]: a scriptable device for tests and CI

mod cpal_backend;
mod mock;

pub use cpal_backend::{
    default_input_device_name, default_output_device_name, list_input_devices,
    list_output_devices, CpalBackend,
};
pub use mock::MockBackend;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::{EngineConfig, EngineError};

/// Lifecycle state of a device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Opened, never started.
    Open,
    /// Delivering callbacks / capturing.
    Started,
    /// Paused; can be started again.
    Stopped,
    /// Released. A closed stream cannot be restarted.
    Closed,
}

impl StreamState {
    /// Returns `true` if `start()` is meaningful in this state.
    pub fn is_startable(self) -> bool {
        matches!(self, Self::Open | Self::Stopped)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Started => 1,
            Self::Stopped => 2,
            Self::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Started,
            2 => Self::Stopped,
            _ => Self::Closed,
        }
    }
}

/// Stream state shared between a stream handle and its real-time side.
#[derive(Debug)]
pub struct SharedStreamState(AtomicU8);

impl SharedStreamState {
    /// Creates a cell in `state`.
    pub fn new(state: StreamState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    /// Current state.
    pub fn get(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Publishes a new state.
    pub fn set(&self, state: StreamState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// Runtime device failure reported outside a control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device was unplugged or otherwise became unavailable.
    Disconnected,
    /// Any other backend error (xruns, driver hiccups).
    Backend(String),
}

impl DeviceError {
    /// Returns `true` if the stream cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("device disconnected"),
            Self::Backend(reason) => f.write_str(reason),
        }
    }
}

/// Receives device errors. Invoked on a backend thread, never on the
/// real-time callback.
pub type ErrorCallback = Arc<dyn Fn(DeviceError) + Send + Sync>;

/// Produces the next playback buffer. Implemented by the engine.
pub trait OutputCallback: Send + 'static {
    /// Fills an interleaved stereo f32 buffer. Runs on the real-time thread.
    fn on_audio_ready(&mut self, output: &mut [f32]);
}

/// Control surface of an open stream.
pub trait DeviceStream: Send {
    /// Current state.
    fn state(&self) -> StreamState;

    /// Starts (or resumes) the stream.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Pauses the stream without releasing it.
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Releases the device. Idempotent.
    fn close(&mut self);
}

/// Real-time read side of a capture stream.
pub trait CaptureReader: Send + 'static {
    /// Copies up to `buf.len()` available samples into `buf` and returns how
    /// many were copied. Never blocks; may return 0.
    fn read(&mut self, buf: &mut [i16]) -> usize;

    /// Returns `true` while the capture stream is started.
    fn is_started(&self) -> bool;
}

/// An opened capture stream: control handle plus real-time reader.
pub struct CaptureHandles {
    /// Control surface, owned by the engine.
    pub stream: Box<dyn DeviceStream>,
    /// Polled from inside the playback callback.
    pub reader: Box<dyn CaptureReader>,
}

/// Opens device streams for the engine.
pub trait AudioBackend: Send {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Opens a stereo f32 playback stream at `config.sample_rate` that calls
    /// `callback` once per device buffer.
    fn open_playback(
        &self,
        config: &EngineConfig,
        callback: Box<dyn OutputCallback>,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn DeviceStream>, EngineError>;

    /// Opens a mono i16 capture stream at `config.sample_rate` that is polled
    /// rather than driving its own callback.
    fn open_capture(
        &self,
        config: &EngineConfig,
        on_error: ErrorCallback,
    ) -> Result<CaptureHandles, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startable_states() {
        assert!(StreamState::Open.is_startable());
        assert!(StreamState::Stopped.is_startable());
        assert!(!StreamState::Started.is_startable());
        assert!(!StreamState::Closed.is_startable());
    }

    #[test]
    fn test_shared_state_round_trips_every_variant() {
        let cell = SharedStreamState::new(StreamState::Open);
        for state in [
            StreamState::Started,
            StreamState::Stopped,
            StreamState::Closed,
            StreamState::Open,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_only_disconnect_is_fatal() {
        assert!(DeviceError::Disconnected.is_fatal());
        assert!(!DeviceError::Backend("buffer underrun".into()).is_fatal());
        assert_eq!(DeviceError::Disconnected.to_string(), "device disconnected");
    }

    #[test]
    fn test_traits_are_object_safe_and_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<Box<dyn DeviceStream>>();
        assert_send::<Box<dyn CaptureReader>>();
        assert_send::<Box<dyn AudioBackend>>();
        assert_send::<Box<dyn OutputCallback>>();
    }
}
