//! The shared frame clock.

use std::sync::atomic::{AtomicI64, Ordering};

/// Authoritative timeline position, in frames.
///
/// The audio callback reads the clock once per buffer, mixes and records
/// against that value, then advances it by the buffer's frame count. The
/// control thread only ever overwrites it ([`seek`](Self::seek),
/// [`reset`](Self::reset)).
///
/// A seek racing a running callback is resolved by whichever store lands
/// last: a seek issued mid-callback can be followed by that callback's
/// advance. Seeks are expected while stopped or between discrete jumps.
#[derive(Debug, Default)]
pub struct FrameClock {
    frame: AtomicI64,
}

impl FrameClock {
    /// Creates a clock at frame 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame: AtomicI64::new(0),
        }
    }

    /// Current frame.
    pub fn now(&self) -> i64 {
        self.frame.load(Ordering::Acquire)
    }

    /// Advances by `frames` and returns the new position.
    pub fn advance(&self, frames: usize) -> i64 {
        let frames = frames as i64;
        self.frame.fetch_add(frames, Ordering::AcqRel) + frames
    }

    /// Overwrites the position. Any value is accepted, including negative
    /// frames and positions past every track.
    pub fn seek(&self, frame: i64) {
        self.frame.store(frame, Ordering::Release);
    }

    /// Rewinds to frame 0.
    pub fn reset(&self) {
        self.seek(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        assert_eq!(FrameClock::new().now(), 0);
    }

    #[test]
    fn test_advance_is_exact() {
        let clock = FrameClock::new();
        assert_eq!(clock.advance(256), 256);
        assert_eq!(clock.advance(192), 448);
        assert_eq!(clock.now(), 448);
    }

    #[test]
    fn test_seek_accepts_negative_and_far_positions() {
        let clock = FrameClock::new();
        clock.seek(-1000);
        assert_eq!(clock.now(), -1000);
        clock.advance(512);
        assert_eq!(clock.now(), -488);

        clock.seek(i64::MAX / 2);
        assert_eq!(clock.now(), i64::MAX / 2);
    }

    #[test]
    fn test_reset_rewinds() {
        let clock = FrameClock::new();
        clock.advance(4096);
        clock.reset();
        assert_eq!(clock.now(), 0);
    }
}
