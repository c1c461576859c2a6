//! Tap-along example.
//!
//! Plays a metronome click track and records the default microphone from the
//! second bar onward, so the take lines up with the clicks it was played to.
//!
//! Run with: cargo run --example tap_along
//! Set `RUST_LOG=tapstory_audio=debug` for engine logs.

use std::time::Duration;
use tapstory_audio::{AudioEngine, FileSink, DEFAULT_SAMPLE_RATE};
use tracing_subscriber::EnvFilter;

/// 120 BPM at 44.1 kHz.
const FRAMES_PER_BEAT: usize = DEFAULT_SAMPLE_RATE as usize / 2;

/// A short 1 kHz blip at the start of each beat.
fn click_track(beats: usize) -> Vec<i16> {
    let click_len = DEFAULT_SAMPLE_RATE as usize / 50;
    let mut pcm = vec![0i16; beats * FRAMES_PER_BEAT];
    for beat in 0..beats {
        let start = beat * FRAMES_PER_BEAT;
        for i in 0..click_len {
            let t = i as f32 / DEFAULT_SAMPLE_RATE as f32;
            let envelope = 1.0 - i as f32 / click_len as f32;
            let sample = (t * 1000.0 * std::f32::consts::TAU).sin() * envelope * 0.5;
            pcm[start + i] = (sample * f32::from(i16::MAX)) as i16;
        }
    }
    pcm
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = AudioEngine::builder()
        .on_event(|e| tracing::warn!(?e, "engine event"))
        .build();

    engine.load_track("click", &click_track(16), 0);

    // Record from the start of bar two (beat 4)
    let record_from = (4 * FRAMES_PER_BEAT) as i64;
    engine.start_recording_with(
        Box::new(FileSink::wav("tap_along.wav", DEFAULT_SAMPLE_RATE)),
        record_from,
    )?;

    println!("Playing 16 clicks; recording starts on beat 5...");
    engine.start()?;
    std::thread::sleep(Duration::from_secs(8));

    engine.stop_recording();
    engine.stop();

    let stats = engine.recording_stats();
    println!(
        "Recorded {} samples from frame {} into tap_along.wav ({} dropped)",
        stats.captured_samples, stats.start_frame, stats.dropped_samples
    );
    println!(
        "Stopped at {:.2}s",
        engine.config().frames_to_secs(engine.current_frame())
    );

    Ok(())
}
