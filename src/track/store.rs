//! Copy-on-write track list shared with the audio thread.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;

use super::Track;

/// A lock-free view of the track list, valid for as long as it is held.
pub type TrackSnapshot = Guard<Arc<Vec<Arc<Track>>>>;

/// Holds every loaded track in insertion order.
///
/// Writers (load, clear) take an exclusive lock among themselves and publish
/// a new list; the audio thread only ever loads the current list, so it never
/// waits on a control-thread operation.
pub struct TrackStore {
    tracks: ArcSwap<Vec<Arc<Track>>>,
    write_lock: Mutex<()>,
}

impl TrackStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tracks: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Appends a track. Duplicate ids are kept side by side.
    pub fn push(&self, track: Track) {
        let _guard = self.write_lock.lock();
        let mut next = Vec::with_capacity(self.tracks.load().len() + 1);
        next.extend(self.tracks.load().iter().cloned());
        next.push(Arc::new(track));
        self.tracks.store(Arc::new(next));
    }

    /// Removes every track.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.tracks.store(Arc::new(Vec::new()));
    }

    /// Current track list. Cheap and non-blocking; safe on the audio thread.
    pub fn snapshot(&self) -> TrackSnapshot {
        self.tracks.load()
    }

    /// Number of loaded tracks.
    pub fn len(&self) -> usize {
        self.tracks.load().len()
    }

    /// Returns `true` if no tracks are loaded.
    pub fn is_empty(&self) -> bool {
        self.tracks.load().is_empty()
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}
