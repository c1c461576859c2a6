//! Builder pattern for `AudioEngine`.

use crate::device::{AudioBackend, CpalBackend};
use crate::{event_callback, AudioEngine, EngineConfig, EngineEvent, EventCallback};

/// Builder for configuring an [`AudioEngine`].
///
/// Use [`AudioEngine::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// use tapstory_audio::{AudioEngine, EngineConfig};
///
/// let engine = AudioEngine::builder()
///     .config(EngineConfig {
///         buffer_size: Some(256),
///         ..Default::default()
///     })
///     .output_device("USB Audio Interface")
///     .on_event(|e| tracing::warn!(?e, "engine event"))
///     .build();
/// engine.start()?;
/// # Ok::<(), tapstory_audio::EngineError>(())
/// ```
#[must_use]
pub struct EngineBuilder {
    config: EngineConfig,
    backend: Option<Box<dyn AudioBackend>>,
    event_callback: Option<EventCallback>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            backend: None,
            event_callback: None,
        }
    }

    /// Replaces the whole engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the operating sample rate.
    ///
    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Requests a fixed device buffer size, in frames.
    pub fn buffer_size(mut self, frames: u32) -> Self {
        self.config.buffer_size = Some(frames);
        self
    }

    /// Plays through the named output device instead of the default.
    pub fn output_device(mut self, name: impl Into<String>) -> Self {
        self.config.output_device = Some(name.into());
        self
    }

    /// Records from the named input device instead of the default.
    pub fn input_device(mut self, name: impl Into<String>) -> Self {
        self.config.input_device = Some(name.into());
        self
    }

    /// Uses a custom device backend, such as [`MockBackend`].
    ///
    /// Default: [`CpalBackend`]
    ///
    /// [`MockBackend`]: crate::MockBackend
    pub fn backend<B: AudioBackend + 'static>(mut self, backend: B) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include device loss, stream errors and recording failures.
    /// The callback runs on whichever thread raised the event (control,
    /// device or writer thread, never the audio thread) and must not call
    /// `start`, `reset` or recording methods on the same engine.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Builds the engine. No device is touched until
    /// [`AudioEngine::start`].
    pub fn build(self) -> AudioEngine {
        let backend: Box<dyn AudioBackend> = match self.backend {
            Some(backend) => backend,
            None => Box::new(CpalBackend::new()),
        };
        AudioEngine::from_parts(self.config, backend, self.event_callback)
    }
}
