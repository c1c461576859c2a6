//! The engine: lifecycle control, track loading and recording control on top
//! of one playback stream and one capture stream.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::FrameClock;
use crate::config::OUTPUT_CHANNELS;
use crate::device::{
    AudioBackend, DeviceError, DeviceStream, ErrorCallback, OutputCallback, StreamState,
};
use crate::pipeline::{mix_tracks, CapturePath};
use crate::recorder::{RecordingSession, RecordingState, RecordingStats};
use crate::sink::{FileSink, Sink};
use crate::track::{Track, TrackId, TrackStore};
use crate::{EngineBuilder, EngineConfig, EngineError, EngineEvent, EventCallback};

/// State shared with the real-time callback and the device error handler.
struct EngineShared {
    clock: FrameClock,
    tracks: TrackStore,
    running: AtomicBool,
    /// Set by a fatal device error; the next `start()` reopens both streams.
    streams_lost: AtomicBool,
    recording: RecordingState,
    events: Option<EventCallback>,
}

impl EngineShared {
    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            events(event);
        }
    }

    fn on_device_error(&self, error: DeviceError) {
        if error.is_fatal() {
            let was_running = self.running.swap(false, Ordering::AcqRel);
            self.streams_lost.store(true, Ordering::Release);
            tracing::error!(
                error = %error,
                was_running,
                frame = self.clock.now(),
                "audio device lost, engine stopped"
            );
            self.emit(EngineEvent::DeviceLost {
                reason: error.to_string(),
            });
        } else {
            tracing::warn!(error = %error, "audio stream error");
            self.emit(EngineEvent::StreamError {
                reason: error.to_string(),
            });
        }
    }
}

/// The backend and whatever streams it has opened for us.
struct Devices {
    backend: Box<dyn AudioBackend>,
    playback: Option<Box<dyn DeviceStream>>,
    capture: Option<Box<dyn DeviceStream>>,
}

impl Devices {
    fn needs_open(&self) -> bool {
        self.playback
            .as_ref()
            .map_or(true, |p| p.state() == StreamState::Closed)
    }

    fn pause_all(&mut self) {
        for (direction, stream) in [
            ("playback", &mut self.playback),
            ("capture", &mut self.capture),
        ] {
            let Some(stream) = stream.as_mut() else {
                continue;
            };
            if stream.state() != StreamState::Started {
                continue;
            }
            if let Err(e) = stream.stop() {
                tracing::warn!(direction, error = %e, "failed to pause stream");
            }
        }
    }

    fn close_all(&mut self) {
        self.pause_all();
        if let Some(mut playback) = self.playback.take() {
            playback.close();
        }
        if let Some(mut capture) = self.capture.take() {
            capture.close();
        }
    }
}

/// Runs once per device buffer on the real-time thread: capture, mix, then
/// advance the clock. Nothing here blocks, allocates or logs.
struct EngineCallback {
    shared: Arc<EngineShared>,
    capture: CapturePath,
}

impl OutputCallback for EngineCallback {
    fn on_audio_ready(&mut self, output: &mut [f32]) {
        // A lost device leaves the surviving stream running until start()
        // or stop() gets to it; keep it silent and hold the clock.
        if self.shared.streams_lost.load(Ordering::Acquire) {
            output.fill(0.0);
            return;
        }

        let num_frames = output.len() / OUTPUT_CHANNELS;
        let current_frame = self.shared.clock.now();

        self.capture
            .process(current_frame, num_frames, &self.shared.recording);

        let tracks = self.shared.tracks.snapshot();
        mix_tracks(&tracks, current_frame, output);

        self.shared.clock.advance(num_frames);
    }
}

/// A multi-track player that records the microphone in sync with its
/// timeline.
///
/// Tracks are mono clips placed at absolute frame positions. While running,
/// every device buffer mixes whatever tracks overlap the current window and
/// captures the same window from the microphone, so recorded sample `n` lines
/// up with timeline frame `record_start_frame + n`.
///
/// All methods take `&self` and may be called from any thread.
///
/// # Example
///
/// ```no_run
/// use tapstory_audio::AudioEngine;
///
/// let engine = AudioEngine::new();
/// engine.load_track("narration", &[0i16; 44_100], 0);
/// engine.start_recording("take.pcm", 22_050)?;
/// engine.start()?;
/// // ...
/// engine.stop_recording();
/// engine.stop();
/// # Ok::<(), tapstory_audio::EngineError>(())
/// ```
pub struct AudioEngine {
    shared: Arc<EngineShared>,
    config: EngineConfig,
    devices: Mutex<Devices>,
    session: Mutex<Option<RecordingSession>>,
}

impl AudioEngine {
    /// Creates an engine on the system's default devices.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        backend: Box<dyn AudioBackend>,
        events: Option<EventCallback>,
    ) -> Self {
        tracing::debug!(
            backend = backend.name(),
            sample_rate = config.sample_rate,
            "audio engine created"
        );
        Self {
            shared: Arc::new(EngineShared {
                clock: FrameClock::new(),
                tracks: TrackStore::new(),
                running: AtomicBool::new(false),
                streams_lost: AtomicBool::new(false),
                recording: RecordingState::new(),
                events,
            }),
            config,
            devices: Mutex::new(Devices {
                backend,
                playback: None,
                capture: None,
            }),
            session: Mutex::new(None),
        }
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- lifecycle ----

    /// Starts playback and capture.
    ///
    /// Streams are opened on first use, after [`reset`](Self::reset), and
    /// after the device was lost; otherwise the existing streams resume. A
    /// missing microphone is not an error: playback runs and recordings stay
    /// empty. Calling `start` while running does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the playback stream cannot be opened or started.
    /// The engine is left stopped; tracks, clock and recording state are
    /// untouched.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut devices = self.devices.lock();

        if self.shared.running.load(Ordering::Acquire) {
            tracing::warn!("start requested while already running");
            return Ok(());
        }

        if self.shared.streams_lost.swap(false, Ordering::AcqRel) {
            tracing::info!("reopening streams after device loss");
            devices.close_all();
        }
        if devices.needs_open() {
            self.open_streams(&mut devices)?;
        }

        if let Some(capture) = devices.capture.as_mut() {
            if capture.state().is_startable() {
                if let Err(e) = capture.start() {
                    tracing::warn!(error = %e, "capture failed to start, recording unavailable");
                    self.shared.emit(EngineEvent::CaptureUnavailable {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let Some(playback) = devices.playback.as_mut() else {
            return Err(EngineError::NoOutputDevice);
        };
        if playback.state().is_startable() {
            if let Err(e) = playback.start() {
                tracing::error!(error = %e, "playback failed to start");
                return Err(e);
            }
        }

        self.shared.running.store(true, Ordering::Release);
        drop(devices);
        let frame = self.shared.clock.now();
        tracing::info!(frame, "audio engine started");
        self.shared.emit(EngineEvent::Started { frame });
        Ok(())
    }

    fn open_streams(&self, devices: &mut Devices) -> Result<(), EngineError> {
        devices.close_all();

        let shared = Arc::clone(&self.shared);
        let on_error: ErrorCallback = Arc::new(move |error| shared.on_device_error(error));

        let (capture, reader) = match devices
            .backend
            .open_capture(&self.config, Arc::clone(&on_error))
        {
            Ok(handles) => (Some(handles.stream), Some(handles.reader)),
            Err(e) => {
                tracing::warn!(error = %e, "capture unavailable, recording disabled");
                self.shared.emit(EngineEvent::CaptureUnavailable {
                    reason: e.to_string(),
                });
                (None, None)
            }
        };

        let callback = EngineCallback {
            shared: Arc::clone(&self.shared),
            capture: CapturePath::new(reader, self.config.max_callback_frames),
        };
        let playback = match devices
            .backend
            .open_playback(&self.config, Box::new(callback), on_error)
        {
            Ok(playback) => playback,
            Err(e) => {
                tracing::error!(error = %e, "failed to open playback stream");
                if let Some(mut capture) = capture {
                    capture.close();
                }
                return Err(e);
            }
        };

        tracing::debug!(
            backend = devices.backend.name(),
            capture = capture.is_some(),
            "streams opened"
        );
        devices.playback = Some(playback);
        devices.capture = capture;
        Ok(())
    }

    /// Pauses playback and capture without releasing the devices.
    ///
    /// The clock keeps its value, so the next [`start`](Self::start) resumes
    /// where playback left off. Calling `stop` while stopped does nothing,
    /// except after a device loss, where it pauses whichever stream survived.
    pub fn stop(&self) {
        let mut devices = self.devices.lock();
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            if self.shared.streams_lost.load(Ordering::Acquire) {
                tracing::debug!("pausing streams left over from device loss");
                devices.pause_all();
            } else {
                tracing::debug!("stop requested while not running");
            }
            return;
        }

        devices.pause_all();
        drop(devices);
        let frame = self.shared.clock.now();
        tracing::info!(frame, "audio engine stopped");
        self.shared.emit(EngineEvent::Stopped { frame });
    }

    /// Stops, releases both streams, and rewinds the clock to frame 0.
    ///
    /// Tracks stay loaded and an active recording keeps its sink open.
    pub fn reset(&self) {
        let mut devices = self.devices.lock();
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        let frame = self.shared.clock.now();

        devices.close_all();
        self.shared.streams_lost.store(false, Ordering::Release);
        self.shared.clock.reset();
        drop(devices);

        tracing::info!(from_frame = frame, "audio engine reset");
        if was_running {
            self.shared.emit(EngineEvent::Stopped { frame });
        }
    }

    /// Moves the timeline to `frame`. No bounds check: negative frames and
    /// frames past every track are valid and simply play silence.
    pub fn seek_to_frame(&self, frame: i64) {
        self.shared.clock.seek(frame);
        tracing::debug!(frame, "seek");
    }

    /// Current timeline position, in frames.
    pub fn current_frame(&self) -> i64 {
        self.shared.clock.now()
    }

    /// Returns `true` between a successful [`start`](Self::start) and the
    /// next stop, reset or device loss.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    // ---- tracks ----

    /// Converts 16-bit PCM to a track starting at `start_frame` and appends
    /// it. Safe while running; the audio thread picks it up on its next
    /// buffer.
    pub fn load_track(&self, id: impl Into<TrackId>, pcm: &[i16], start_frame: i64) {
        self.add_track(Track::from_pcm(id, pcm, start_frame));
    }

    /// Appends an already-built track.
    pub fn add_track(&self, track: Track) {
        tracing::debug!(
            track = %track.id(),
            frames = track.len(),
            start_frame = track.start_frame(),
            "track loaded"
        );
        self.shared.tracks.push(track);
    }

    /// Removes every track.
    pub fn clear_tracks(&self) {
        let count = self.shared.tracks.len();
        self.shared.tracks.clear();
        tracing::debug!(count, "tracks cleared");
    }

    /// Number of loaded tracks.
    pub fn track_count(&self) -> usize {
        self.shared.tracks.len()
    }

    /// The loaded tracks, in mix order.
    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.shared.tracks.snapshot().iter().cloned().collect()
    }

    // ---- recording ----

    /// Starts recording the microphone to a raw 16-bit PCM file at `path`.
    ///
    /// Only audio captured while the clock is at or past `start_frame` is
    /// kept. See [`start_recording_with`](Self::start_recording_with).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn start_recording(
        &self,
        path: impl AsRef<Path>,
        start_frame: i64,
    ) -> Result<(), EngineError> {
        self.start_recording_with(Box::new(FileSink::raw(path)), start_frame)
    }

    /// Starts recording the microphone into `sink`.
    ///
    /// Any active recording is finished first. The recorded sample counter
    /// is reset and the threshold replaced even if `sink` fails to open.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails to open; recording stays off.
    pub fn start_recording_with(
        &self,
        sink: Box<dyn Sink>,
        start_frame: i64,
    ) -> Result<(), EngineError> {
        let mut session = self.session.lock();
        if let Some(active) = session.take() {
            tracing::info!(sink = active.sink_name(), "replacing active recording");
            self.finish_session(active);
        }

        let sink_name = sink.name().to_string();
        match RecordingSession::begin(
            &self.shared.recording,
            sink,
            start_frame,
            &self.config,
            self.shared.events.clone(),
        ) {
            Ok(started) => {
                tracing::info!(sink = %sink_name, start_frame, "recording started");
                self.shared.emit(EngineEvent::RecordingStarted {
                    sink_name,
                    start_frame,
                });
                *session = Some(started);
                Ok(())
            }
            Err(e) => {
                tracing::error!(sink = %sink_name, error = %e, "failed to start recording");
                self.shared.emit(EngineEvent::RecordingFailed {
                    sink_name,
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Stops recording and closes the sink once every accepted sample has
    /// been written. Does nothing when not recording.
    pub fn stop_recording(&self) {
        let Some(active) = self.session.lock().take() else {
            tracing::debug!("stop_recording requested while not recording");
            return;
        };
        self.finish_session(active);
    }

    fn finish_session(&self, session: RecordingSession) {
        let sink_name = session.sink_name().to_string();
        session.end(&self.shared.recording);

        let stats = self.shared.recording.stats();
        tracing::info!(
            sink = %sink_name,
            captured = stats.captured_samples,
            dropped = stats.dropped_samples,
            "recording stopped"
        );
        self.shared.emit(EngineEvent::RecordingStopped {
            captured_samples: stats.captured_samples,
            dropped_samples: stats.dropped_samples,
        });
    }

    /// Threshold frame of the current or most recent recording.
    pub fn recording_start_frame(&self) -> i64 {
        self.shared.recording.start_frame()
    }

    /// Samples accepted by the current or most recent recording.
    pub fn recorded_sample_count(&self) -> i64 {
        self.shared.recording.captured()
    }

    /// Returns `true` while a recording session is active.
    pub fn is_recording(&self) -> bool {
        self.shared.recording.is_enabled()
    }

    /// Counters for the current or most recent recording.
    pub fn recording_stats(&self) -> RecordingStats {
        self.shared.recording.stats()
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if let Some(active) = self.session.get_mut().take() {
            self.finish_session(active);
        }
        self.shared.running.store(false, Ordering::Release);
        self.devices.get_mut().close_all();
        tracing::debug!("audio engine dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockBackend;

    fn engine() -> (AudioEngine, MockBackend) {
        let device = MockBackend::new();
        let engine = AudioEngine::builder().backend(device.clone()).build();
        (engine, device)
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AudioEngine>();
    }

    #[test]
    fn test_streams_opened_lazily() {
        let (engine, device) = engine();
        assert_eq!(device.playback_opens(), 0);
        assert!(!engine.is_running());

        engine.start().unwrap();
        assert_eq!(device.playback_opens(), 1);
        assert_eq!(device.capture_opens(), 1);
        assert_eq!(device.playback_state(), Some(StreamState::Started));
        assert_eq!(device.capture_state(), Some(StreamState::Started));
    }

    #[test]
    fn test_callback_advances_clock() {
        let (engine, device) = engine();
        engine.start().unwrap();
        device.render(256).unwrap();
        device.render(256).unwrap();
        assert_eq!(engine.current_frame(), 512);
    }

    #[test]
    fn test_non_fatal_error_keeps_running() {
        let (engine, device) = engine();
        engine.start().unwrap();
        device.raise_error(DeviceError::Backend("underrun".into()));
        assert!(engine.is_running());
    }

    #[test]
    fn test_drop_closes_streams() {
        let (engine, device) = engine();
        engine.start().unwrap();
        drop(engine);
        assert_eq!(device.playback_state(), Some(StreamState::Closed));
        assert_eq!(device.capture_state(), Some(StreamState::Closed));
    }
}
