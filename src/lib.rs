//! # tapstory-audio
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time multi-track playback with timeline-synchronized recording.
//!
//! `tapstory-audio` plays any number of mono clips placed at absolute frame
//! positions, mixes them to stereo, and records the microphone against the
//! same frame clock. A recording started with threshold `T` contains exactly
//! the audio captured while the timeline was at or past frame `T`, so a take
//! can be laid back onto the timeline at `T` without drift.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tapstory_audio::AudioEngine;
//!
//! let engine = AudioEngine::builder()
//!     .on_event(|e| tracing::warn!(?e, "engine event"))
//!     .build();
//!
//! // Backing track at frame 0, recording from one second in
//! engine.load_track("backing", &[0i16; 88_200], 0);
//! engine.start_recording("take.pcm", 44_100)?;
//! engine.start()?;
//!
//! // ...later
//! engine.stop_recording();
//! engine.stop();
//! println!("recorded {} samples", engine.recorded_sample_count());
//! # Ok::<(), tapstory_audio::EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Audio Thread**: the playback callback reads the clock, drains the
//!   microphone, mixes the tracks, then advances the clock. It never blocks,
//!   allocates or logs.
//! - **Control Threads**: lifecycle, track and recording calls. Tracks are
//!   published copy-on-write, so loading never stalls the audio thread.
//! - **Writer Thread**: one per recording, draining a lock-free ring into the
//!   [`Sink`] so disk I/O never touches the audio thread.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
pub mod clock;
mod config;
pub mod device;
mod engine;
mod error;
mod event;
pub mod format;
pub mod host;
pub mod pipeline;
mod recorder;
mod sink;
pub mod track;

pub use builder::EngineBuilder;
pub use config::{EngineConfig, DEFAULT_SAMPLE_RATE, INPUT_CHANNELS, OUTPUT_CHANNELS};
pub use device::{
    default_input_device_name, default_output_device_name, list_input_devices,
    list_output_devices, AudioBackend, CpalBackend, DeviceError, MockBackend, StreamState,
};
pub use engine::AudioEngine;
pub use error::{EngineError, SinkError};
pub use event::{event_callback, EngineEvent, EventCallback};
pub use recorder::RecordingStats;
pub use sink::{FileSink, Sink};
pub use track::{Track, TrackId};
