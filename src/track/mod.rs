//! Loaded clips and their placement on the timeline.

mod store;

pub use store::{TrackSnapshot, TrackStore};

use std::fmt;
use std::sync::Arc;

use crate::format::i16_slice_to_f32;

/// Caller-supplied label of a loaded clip.
///
/// Nothing is looked up by id. Two clips loaded under the same label are two
/// tracks, so the type is neither hashable nor ordered.
///
/// ```
/// use tapstory_audio::TrackId;
///
/// let page = TrackId::from("page-1");
/// assert_eq!(page.as_str(), "page-1");
/// assert_eq!(page.to_string(), "page-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackId(Arc<str>);

impl TrackId {
    /// The label as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(label: &str) -> Self {
        Self(label.into())
    }
}

impl From<String> for TrackId {
    fn from(label: String) -> Self {
        Self(label.into())
    }
}

/// A mono clip placed at a fixed frame on the timeline.
///
/// Tracks are immutable once built. The store only ever appends whole tracks
/// or drops all of them.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    samples: Vec<f32>,
    start_frame: i64,
}

/// The part of a track that falls inside one callback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    /// First output frame that receives track audio.
    pub output_start: usize,
    /// Track sample mixed into `output_start`.
    pub sample_start: usize,
    /// Number of consecutive frames to mix.
    pub len: usize,
}

impl Track {
    /// Builds a track from already-normalized samples.
    pub fn new(id: impl Into<TrackId>, samples: Vec<f32>, start_frame: i64) -> Self {
        Self {
            id: id.into(),
            samples,
            start_frame,
        }
    }

    /// Builds a track from 16-bit PCM, scaling each sample by 1/32768.
    ///
    /// Out-of-range values are not clamped here; the mixer's soft clip is the
    /// only overflow defense.
    pub fn from_pcm(id: impl Into<TrackId>, pcm: &[i16], start_frame: i64) -> Self {
        Self::new(id, i16_slice_to_f32(pcm), start_frame)
    }

    /// Caller-supplied id.
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    /// Normalized mono samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Timeline frame of the first sample.
    pub fn start_frame(&self) -> i64 {
        self.start_frame
    }

    /// Length in frames (one sample per frame).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` for a zero-length clip.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Computes which samples land in the window
    /// `[current_frame, current_frame + num_frames)`.
    ///
    /// Returns `None` when the track is entirely before or after the window.
    pub fn overlap(&self, current_frame: i64, num_frames: usize) -> Option<Overlap> {
        let len = self.samples.len() as i64;
        let frames = num_frames as i64;
        let offset = current_frame.saturating_sub(self.start_frame);

        if offset >= len || offset.saturating_add(frames) <= 0 {
            return None;
        }

        let output_start = (-offset).max(0);
        let sample_start = offset.max(0);
        let count = (frames - output_start).min(len - sample_start);

        Some(Overlap {
            output_start: output_start as usize,
            sample_start: sample_start as usize,
            len: count as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(start_frame: i64, len: usize) -> Track {
        Track::new("clip", vec![0.1; len], start_frame)
    }

    #[test]
    fn test_same_label_makes_two_tracks() {
        let store = TrackStore::new();
        store.push(Track::new("page-1", vec![0.1; 4], 0));
        store.push(Track::new(String::from("page-1"), vec![0.2; 4], 100));

        let tracks = store.snapshot();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id(), tracks[1].id());
        assert_eq!(tracks[1].start_frame(), 100);
    }

    #[test]
    fn test_from_pcm_scales_without_clamping() {
        let track = Track::from_pcm("t", &[i16::MIN, 0, i16::MAX], 10);
        assert_eq!(track.samples(), &[-1.0, 0.0, 32767.0 / 32768.0]);
        assert_eq!(track.start_frame(), 10);
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn test_empty_track_never_overlaps() {
        let track = clip(0, 0);
        assert!(track.is_empty());
        assert_eq!(track.overlap(0, 512), None);
        assert_eq!(track.overlap(-10, 512), None);
    }

    #[test]
    fn test_window_before_track() {
        assert_eq!(clip(100, 50).overlap(0, 100), None);
    }

    #[test]
    fn test_window_after_track() {
        assert_eq!(clip(100, 50).overlap(150, 64), None);
        assert_eq!(clip(100, 50).overlap(10_000, 64), None);
    }

    #[test]
    fn test_window_covering_track_exactly() {
        let overlap = clip(100, 50).overlap(100, 50).unwrap();
        assert_eq!(
            overlap,
            Overlap {
                output_start: 0,
                sample_start: 0,
                len: 50
            }
        );
    }

    #[test]
    fn test_window_straddling_track_start() {
        let overlap = clip(100, 50).overlap(80, 40).unwrap();
        assert_eq!(
            overlap,
            Overlap {
                output_start: 20,
                sample_start: 0,
                len: 20
            }
        );
    }

    #[test]
    fn test_window_straddling_track_end() {
        let overlap = clip(100, 50).overlap(140, 32).unwrap();
        assert_eq!(
            overlap,
            Overlap {
                output_start: 0,
                sample_start: 40,
                len: 10
            }
        );
    }

    #[test]
    fn test_window_inside_long_track() {
        let overlap = clip(-1000, 5000).overlap(0, 256).unwrap();
        assert_eq!(
            overlap,
            Overlap {
                output_start: 0,
                sample_start: 1000,
                len: 256
            }
        );
    }

    #[test]
    fn test_extreme_clock_values_do_not_overflow() {
        assert_eq!(clip(100, 50).overlap(i64::MIN, 256), None);
        assert_eq!(clip(100, 50).overlap(i64::MAX, 256), None);
        assert_eq!(clip(i64::MIN, 50).overlap(i64::MAX, 256), None);
    }
}
