//! Runtime events for monitoring engine health.
//!
//! Events are notifications about things that happen outside a direct control
//! call: the device disappearing, the writer thread failing, capture being
//! unavailable. They are never emitted from the real-time audio callback.

use std::sync::Arc;

/// Runtime events emitted by an [`AudioEngine`](crate::AudioEngine).
///
/// # Example
///
/// ```
/// use tapstory_audio::EngineEvent;
///
/// fn handle_event(event: EngineEvent) {
///     match event {
///         EngineEvent::DeviceLost { reason } => {
///             eprintln!("audio device lost ({reason}), call start() to reopen");
///         }
///         EngineEvent::RecordingFailed { sink_name, error } => {
///             eprintln!("recording to {sink_name} failed: {error}");
///         }
///         other => eprintln!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback started; the clock resumes from `frame`.
    Started {
        /// Clock value at start.
        frame: i64,
    },

    /// Playback was paused by [`stop()`](crate::AudioEngine::stop) or
    /// [`reset()`](crate::AudioEngine::reset).
    Stopped {
        /// Clock value when the engine stopped.
        frame: i64,
    },

    /// The output or input device went away.
    ///
    /// The engine has stopped itself. The next `start()` reopens both streams.
    DeviceLost {
        /// Backend description.
        reason: String,
    },

    /// A non-fatal stream error (xrun, backend hiccup).
    StreamError {
        /// Backend description.
        reason: String,
    },

    /// The input stream could not be opened; playback continues without
    /// recording capability.
    CaptureUnavailable {
        /// Why the input stream failed to open.
        reason: String,
    },

    /// A recording session began.
    RecordingStarted {
        /// Name of the sink receiving samples.
        sink_name: String,
        /// Gating threshold on the frame clock.
        start_frame: i64,
    },

    /// A recording session ended and its sink was closed.
    RecordingStopped {
        /// Samples accepted for the sink.
        captured_samples: i64,
        /// Samples that did not fit in the recording ring.
        dropped_samples: u64,
    },

    /// The recording sink failed to open or to write.
    RecordingFailed {
        /// Name of the sink that failed.
        sink_name: String,
        /// Description of the error.
        error: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via
/// [`EngineBuilder::on_event()`](crate::EngineBuilder::on_event).
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use tapstory_audio::{event_callback, EngineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(EngineEvent::Started { frame: 0 });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_debug() {
        let event = EngineEvent::Stopped { frame: 4410 };
        let debug = format!("{event:?}");
        assert!(debug.contains("Stopped"));
        assert!(debug.contains("4410"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |event| {
            if let EngineEvent::DeviceLost { reason } = event {
                assert_eq!(reason, "unplugged");
                called_clone.store(true, Ordering::SeqCst);
            }
        });

        callback(EngineEvent::DeviceLost {
            reason: "unplugged".to_string(),
        });
        assert!(called.load(Ordering::SeqCst));
    }
}
