//! Scriptable audio device for testing without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    AudioBackend, CaptureHandles, CaptureReader, DeviceError, DeviceStream, ErrorCallback,
    OutputCallback, SharedStreamState, StreamState,
};
use crate::config::OUTPUT_CHANNELS;
use crate::{EngineConfig, EngineError};

/// A fake device pair that lets tests play the role of the audio driver.
///
/// The backend is cheaply clonable: hand one clone to the engine and keep
/// another to push microphone samples, deliver callbacks with
/// [`render`](Self::render), and inject failures.
///
/// # Example
///
/// ```
/// use tapstory_audio::{AudioEngine, MockBackend};
///
/// let device = MockBackend::new();
/// let engine = AudioEngine::builder().backend(device.clone()).build();
///
/// engine.load_track("beep", &[16384; 64], 0);
/// engine.start().unwrap();
///
/// let buffer = device.render(32).unwrap();
/// assert_eq!(buffer.len(), 64);
/// assert_eq!(buffer[0], 0.5);
/// assert_eq!(engine.current_frame(), 32);
/// ```
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    playback: Mutex<Option<MockPlayback>>,
    capture_state: Mutex<Option<Arc<SharedStreamState>>>,
    capture_errors: Mutex<Option<ErrorCallback>>,
    mic: Mutex<VecDeque<i16>>,
    fail_playback_open: AtomicBool,
    fail_capture_open: AtomicBool,
    fail_playback_start: AtomicBool,
    playback_opens: AtomicUsize,
    capture_opens: AtomicUsize,
}

struct MockPlayback {
    callback: Box<dyn OutputCallback>,
    state: Arc<SharedStreamState>,
    on_error: ErrorCallback,
}

impl MockBackend {
    /// Creates a backend with working playback and capture devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent playback opens fail.
    pub fn fail_playback_open(&self, fail: bool) {
        self.inner.fail_playback_open.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent capture opens fail.
    pub fn fail_capture_open(&self, fail: bool) {
        self.inner.fail_capture_open.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent playback starts fail.
    pub fn fail_playback_start(&self, fail: bool) {
        self.inner.fail_playback_start.store(fail, Ordering::SeqCst);
    }

    /// Queues microphone samples for the capture reader.
    pub fn push_input(&self, samples: &[i16]) {
        self.inner.mic.lock().extend(samples.iter().copied());
    }

    /// Microphone samples not yet read by the engine.
    pub fn pending_input(&self) -> usize {
        self.inner.mic.lock().len()
    }

    /// Delivers one device buffer of `frames` stereo frames.
    ///
    /// Returns the rendered interleaved buffer, or `None` when no playback
    /// stream is started (a real device would not call back either).
    pub fn render(&self, frames: usize) -> Option<Vec<f32>> {
        let mut playback = self.inner.playback.lock();
        let playback = playback.as_mut()?;
        if playback.state.get() != StreamState::Started {
            return None;
        }

        let mut buffer = vec![f32::NAN; frames * OUTPUT_CHANNELS];
        playback.callback.on_audio_ready(&mut buffer);
        Some(buffer)
    }

    /// Reports a device error the way a driver thread would.
    pub fn raise_error(&self, error: DeviceError) {
        let on_error = self
            .inner
            .playback
            .lock()
            .as_ref()
            .map(|p| Arc::clone(&p.on_error))
            .or_else(|| self.inner.capture_errors.lock().clone());

        if let Some(on_error) = on_error {
            on_error(error);
        }
    }

    /// State of the most recently opened playback stream.
    pub fn playback_state(&self) -> Option<StreamState> {
        self.inner.playback.lock().as_ref().map(|p| p.state.get())
    }

    /// State of the most recently opened capture stream.
    pub fn capture_state(&self) -> Option<StreamState> {
        self.inner.capture_state.lock().as_ref().map(|s| s.get())
    }

    /// How many playback streams have been opened successfully.
    pub fn playback_opens(&self) -> usize {
        self.inner.playback_opens.load(Ordering::SeqCst)
    }

    /// How many capture streams have been opened successfully.
    pub fn capture_opens(&self) -> usize {
        self.inner.capture_opens.load(Ordering::SeqCst)
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open_playback(
        &self,
        _config: &EngineConfig,
        callback: Box<dyn OutputCallback>,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn DeviceStream>, EngineError> {
        if self.inner.fail_playback_open.load(Ordering::SeqCst) {
            return Err(EngineError::open("playback", "mock device refused"));
        }

        let state = Arc::new(SharedStreamState::new(StreamState::Open));
        *self.inner.playback.lock() = Some(MockPlayback {
            callback,
            state: Arc::clone(&state),
            on_error,
        });
        self.inner.playback_opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockStream {
            direction: "playback",
            state,
            inner: Arc::clone(&self.inner),
        }))
    }

    fn open_capture(
        &self,
        _config: &EngineConfig,
        on_error: ErrorCallback,
    ) -> Result<CaptureHandles, EngineError> {
        if self.inner.fail_capture_open.load(Ordering::SeqCst) {
            return Err(EngineError::open("capture", "mock microphone refused"));
        }

        let state = Arc::new(SharedStreamState::new(StreamState::Open));
        *self.inner.capture_state.lock() = Some(Arc::clone(&state));
        *self.inner.capture_errors.lock() = Some(on_error);
        self.inner.capture_opens.fetch_add(1, Ordering::SeqCst);

        Ok(CaptureHandles {
            stream: Box::new(MockStream {
                direction: "capture",
                state: Arc::clone(&state),
                inner: Arc::clone(&self.inner),
            }),
            reader: Box::new(MockReader {
                state,
                inner: Arc::clone(&self.inner),
            }),
        })
    }
}

struct MockStream {
    direction: &'static str,
    state: Arc<SharedStreamState>,
    inner: Arc<MockInner>,
}

impl DeviceStream for MockStream {
    fn state(&self) -> StreamState {
        self.state.get()
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.state.get() == StreamState::Closed {
            return Err(EngineError::StreamClosed {
                direction: self.direction,
            });
        }
        if self.direction == "playback" && self.inner.fail_playback_start.load(Ordering::SeqCst) {
            return Err(EngineError::start(self.direction, "mock device refused"));
        }
        self.state.set(StreamState::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        if self.state.get() == StreamState::Closed {
            return Err(EngineError::StreamClosed {
                direction: self.direction,
            });
        }
        self.state.set(StreamState::Stopped);
        Ok(())
    }

    fn close(&mut self) {
        self.state.set(StreamState::Closed);
    }
}

struct MockReader {
    state: Arc<SharedStreamState>,
    inner: Arc<MockInner>,
}

impl CaptureReader for MockReader {
    fn read(&mut self, buf: &mut [i16]) -> usize {
        let mut mic = self.inner.mic.lock();
        let count = buf.len().min(mic.len());
        for (slot, sample) in buf.iter_mut().zip(mic.drain(..count)) {
            *slot = sample;
        }
        count
    }

    fn is_started(&self) -> bool {
        self.state.get() == StreamState::Started
    }
}
