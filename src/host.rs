//! Process-wide engine facade for hosts that cannot hold a Rust value.
//!
//! Foreign-language bindings (mobile bridges, C shims) usually want a flat
//! set of functions over one engine per process. This module keeps that
//! engine in a global slot. Every function is a no-op when no engine exists,
//! and every getter then returns 0.
//!
//! Operations that can fail log the error and return nothing; Rust callers
//! that want the error should use [`AudioEngine`] directly.
//!
//! ```no_run
//! use tapstory_audio::host;
//!
//! host::create_engine();
//! host::load_track("intro", &[0i16; 4410], 0);
//! host::start();
//! let frame = host::current_frame();
//! host::destroy_engine();
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{AudioEngine, EngineBuilder};

static ENGINE: Mutex<Option<Arc<AudioEngine>>> = parking_lot::const_mutex(None);

/// Runs `f` on the engine without holding the global slot, so event
/// callbacks may call back into this module.
fn with_engine<R>(f: impl FnOnce(&AudioEngine) -> R) -> Option<R> {
    let engine = ENGINE.lock().clone()?;
    Some(f(&engine))
}

/// Creates the engine on the default devices, unless one already exists.
pub fn create_engine() {
    create_engine_with(AudioEngine::builder());
}

/// Creates the engine from `builder`, unless one already exists.
///
/// Returns `true` if a new engine was installed.
pub fn create_engine_with(builder: EngineBuilder) -> bool {
    let mut slot = ENGINE.lock();
    if slot.is_some() {
        tracing::debug!("engine already exists");
        return false;
    }
    *slot = Some(Arc::new(builder.build()));
    true
}

/// Destroys the engine: finishes any recording and releases both devices.
pub fn destroy_engine() {
    let engine = ENGINE.lock().take();
    // Dropped outside the lock; the last in-flight call releases it.
    drop(engine);
}

/// Returns `true` if an engine exists.
pub fn has_engine() -> bool {
    ENGINE.lock().is_some()
}

/// See [`AudioEngine::start`].
pub fn start() {
    with_engine(|engine| {
        if let Err(e) = engine.start() {
            tracing::error!(error = %e, "host start failed");
        }
    });
}

/// See [`AudioEngine::stop`].
pub fn stop() {
    with_engine(AudioEngine::stop);
}

/// See [`AudioEngine::reset`].
pub fn reset() {
    with_engine(AudioEngine::reset);
}

/// See [`AudioEngine::load_track`].
pub fn load_track(id: &str, pcm: &[i16], start_frame: i64) {
    with_engine(|engine| engine.load_track(id, pcm, start_frame));
}

/// See [`AudioEngine::clear_tracks`].
pub fn clear_tracks() {
    with_engine(AudioEngine::clear_tracks);
}

/// See [`AudioEngine::start_recording`].
pub fn start_recording(path: impl AsRef<Path>, start_frame: i64) {
    with_engine(|engine| {
        if let Err(e) = engine.start_recording(path, start_frame) {
            tracing::error!(error = %e, "host start_recording failed");
        }
    });
}

/// See [`AudioEngine::stop_recording`].
pub fn stop_recording() {
    with_engine(AudioEngine::stop_recording);
}

/// See [`AudioEngine::current_frame`].
pub fn current_frame() -> i64 {
    with_engine(AudioEngine::current_frame).unwrap_or(0)
}

/// See [`AudioEngine::seek_to_frame`].
pub fn seek_to_frame(frame: i64) {
    with_engine(|engine| engine.seek_to_frame(frame));
}

/// See [`AudioEngine::recording_start_frame`].
pub fn recording_start_frame() -> i64 {
    with_engine(AudioEngine::recording_start_frame).unwrap_or(0)
}

/// See [`AudioEngine::recorded_sample_count`].
pub fn recorded_sample_count() -> i64 {
    with_engine(AudioEngine::recorded_sample_count).unwrap_or(0)
}
