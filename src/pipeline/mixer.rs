//! Mix path: sums every overlapping track into an interleaved stereo buffer.

use std::sync::Arc;

use crate::config::OUTPUT_CHANNELS;
use crate::format::soft_clip_in_place;
use crate::track::Track;

/// Mixes `tracks` into `output` for the window starting at `current_frame`.
///
/// `output` is interleaved stereo (`[L, R, L, R, ...]`); its length decides the
/// window size. Each mono sample is added to both channels of its frame, with
/// no gain or normalization, and the result is soft clipped. Tracks are summed
/// in slice order.
///
/// Does not allocate.
pub fn mix_tracks(tracks: &[Arc<Track>], current_frame: i64, output: &mut [f32]) {
    output.fill(0.0);
    let num_frames = output.len() / OUTPUT_CHANNELS;

    for track in tracks {
        let Some(overlap) = track.overlap(current_frame, num_frames) else {
            continue;
        };

        let samples = &track.samples()[overlap.sample_start..overlap.sample_start + overlap.len];
        let frames = output
            .chunks_exact_mut(OUTPUT_CHANNELS)
            .skip(overlap.output_start)
            .take(overlap.len);

        for (frame, &sample) in frames.zip(samples) {
            frame[0] += sample;
            frame[1] += sample;
        }
    }

    soft_clip_in_place(output);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(list: Vec<Track>) -> Vec<Arc<Track>> {
        list.into_iter().map(Arc::new).collect()
    }

    /// A clip whose sample `i` is `i / 1000`, so positions are recognizable.
    fn ramp(start_frame: i64, len: usize) -> Track {
        let samples = (0..len).map(|i| i as f32 / 1000.0).collect();
        Track::new("ramp", samples, start_frame)
    }

    fn left(output: &[f32]) -> Vec<f32> {
        output.iter().step_by(2).copied().collect()
    }

    #[test]
    fn test_empty_store_yields_silence() {
        let mut output = vec![0.7; 64];
        mix_tracks(&[], 0, &mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_silence_before_and_after_track() {
        let list = tracks(vec![ramp(100, 50)]);
        let mut output = vec![0.0; 200];

        mix_tracks(&list, 0, &mut output);
        assert!(output.iter().all(|&s| s == 0.0));

        mix_tracks(&list, 150, &mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_window_matching_track_gets_all_samples() {
        let list = tracks(vec![ramp(100, 50)]);
        let mut output = vec![0.0; 100];

        mix_tracks(&list, 100, &mut output);

        let expected: Vec<f32> = (0..50).map(|i| i as f32 / 1000.0).collect();
        assert_eq!(left(&output), expected);
    }

    #[test]
    fn test_straddling_window_places_samples_at_offset() {
        let list = tracks(vec![ramp(100, 50)]);
        let mut output = vec![0.0; 80];

        mix_tracks(&list, 80, &mut output);

        let left = left(&output);
        assert!(left[..20].iter().all(|&s| s == 0.0));
        let expected: Vec<f32> = (0..20).map(|i| i as f32 / 1000.0).collect();
        assert_eq!(&left[20..], expected.as_slice());
    }

    #[test]
    fn test_mono_is_duplicated_to_both_channels() {
        let list = tracks(vec![ramp(0, 32)]);
        let mut output = vec![0.0; 64];

        mix_tracks(&list, 0, &mut output);

        for frame in output.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_tracks_sum_without_normalization() {
        let list = tracks(vec![
            Track::new("a", vec![0.25; 8], 0),
            Track::new("b", vec![0.5; 8], 0),
        ]);
        let mut output = vec![0.0; 16];

        mix_tracks(&list, 0, &mut output);
        assert!(output.iter().all(|&s| s == 0.75));
    }

    #[test]
    fn test_duplicate_ids_both_mix() {
        let list = tracks(vec![
            Track::new("same", vec![0.25; 4], 0),
            Track::new("same", vec![0.25; 4], 0),
        ]);
        let mut output = vec![0.0; 8];

        mix_tracks(&list, 0, &mut output);
        assert!(output.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_overflow_is_soft_clipped() {
        let list = tracks(vec![
            Track::new("a", vec![1.0; 4], 0),
            Track::new("b", vec![1.0; 4], 0),
        ]);
        let mut output = vec![0.0; 8];

        mix_tracks(&list, 0, &mut output);
        for &sample in &output {
            assert_eq!(sample, 2.0f32.tanh());
            assert!((sample - 0.964).abs() < 0.001);
        }
    }

    #[test]
    fn test_full_scale_single_track_is_untouched() {
        let list = tracks(vec![Track::from_pcm("min", &[i16::MIN; 4], 0)]);
        let mut output = vec![0.0; 8];

        mix_tracks(&list, 0, &mut output);
        assert!(output.iter().all(|&s| s == -1.0));
    }

    #[test]
    fn test_negative_clock_reaches_track_at_zero() {
        let list = tracks(vec![ramp(0, 16)]);
        let mut output = vec![0.0; 32];

        mix_tracks(&list, -8, &mut output);

        let left = left(&output);
        assert!(left[..8].iter().all(|&s| s == 0.0));
        assert_eq!(left[8], 0.0);
        assert_eq!(left[9], 0.001);
    }
}
