//! Error types for tapstory-audio.
//!
//! Errors are split into two categories:
//! - **Operation errors** ([`EngineError`]): a control operation (start, open,
//!   start recording) could not complete. Engine state is left consistent.
//! - **Runtime events**: device loss, stream glitches and writer failures are
//!   reported through [`EventCallback`](crate::EventCallback) instead.

use std::path::PathBuf;

/// Errors returned by engine control operations.
///
/// None of these are fatal to the engine itself: a failed [`start()`] leaves
/// the engine stopped with all tracks intact, and the caller may retry.
///
/// [`start()`]: crate::AudioEngine::start
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No default output device is configured on this system.
    #[error("no default output device configured")]
    NoOutputDevice,

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoInputDevice,

    /// The requested device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// A stream could not be opened.
    #[error("failed to open {direction} stream: {reason}")]
    StreamOpen {
        /// `"playback"` or `"capture"`.
        direction: &'static str,
        /// Backend description of the failure.
        reason: String,
    },

    /// A stream was opened but refused to start.
    #[error("failed to start {direction} stream: {reason}")]
    StreamStart {
        /// `"playback"` or `"capture"`.
        direction: &'static str,
        /// Backend description of the failure.
        reason: String,
    },

    /// A stream refused to pause.
    #[error("failed to stop {direction} stream: {reason}")]
    StreamStop {
        /// `"playback"` or `"capture"`.
        direction: &'static str,
        /// Backend description of the failure.
        reason: String,
    },

    /// An operation was attempted on a stream that has already been closed.
    #[error("{direction} stream is closed")]
    StreamClosed {
        /// `"playback"` or `"capture"`.
        direction: &'static str,
    },

    /// The recording sink could not be opened.
    #[error("recording failed: {0}")]
    Recording(#[from] SinkError),
}

impl EngineError {
    pub(crate) fn open(direction: &'static str, reason: impl ToString) -> Self {
        Self::StreamOpen {
            direction,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn start(direction: &'static str, reason: impl ToString) -> Self {
        Self::StreamStart {
            direction,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn stop(direction: &'static str, reason: impl ToString) -> Self {
        Self::StreamStop {
            direction,
            reason: reason.to_string(),
        }
    }
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::DeviceNotFound {
            name: "USB Mic".to_string(),
        };
        assert_eq!(err.to_string(), "device not found: USB Mic");
    }

    #[test]
    fn test_stream_open_error_names_direction() {
        let err = EngineError::open("capture", "exclusive mode unavailable");
        assert_eq!(
            err.to_string(),
            "failed to open capture stream: exclusive mode unavailable"
        );
    }

    #[test]
    fn test_recording_error_wraps_sink_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory");
        let err: EngineError = SinkError::file_error("/tmp/missing/take.pcm", io_err).into();
        assert!(err.to_string().starts_with("recording failed"));
        assert!(err.to_string().contains("/tmp/missing/take.pcm"));
    }

    #[test]
    fn test_sink_error_custom() {
        let err = SinkError::custom("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[test]
    fn test_sink_error_write_failed() {
        let err = SinkError::write_failed("disk full");
        assert_eq!(err.to_string(), "write failed: disk full");
    }
}
