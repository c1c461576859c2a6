//! Capture path: polls the microphone from inside the playback callback and
//! forwards samples to the recorder when the timeline has reached the
//! recording threshold.

use crate::device::CaptureReader;
use crate::recorder::RecordingState;

/// Reads captured audio once per callback.
///
/// The scratch buffer is allocated once, when the capture stream is opened,
/// so [`process`](Self::process) never allocates.
pub(crate) struct CapturePath {
    reader: Option<Box<dyn CaptureReader>>,
    scratch: Vec<i16>,
}

impl CapturePath {
    /// A capture path for a reader delivering up to `max_callback_frames`
    /// samples per read.
    pub fn new(reader: Option<Box<dyn CaptureReader>>, max_callback_frames: usize) -> Self {
        let scratch = if reader.is_some() {
            vec![0; max_callback_frames.max(1)]
        } else {
            Vec::new()
        };
        Self { reader, scratch }
    }

    /// Reads up to `num_frames` mono samples and offers them to `recording`
    /// at `current_frame`. Returns the number of samples read.
    ///
    /// Samples are always drained from the device, even while recording is
    /// off or gated, so the input ring never holds stale audio.
    pub fn process(
        &mut self,
        current_frame: i64,
        num_frames: usize,
        recording: &RecordingState,
    ) -> usize {
        let Some(reader) = self.reader.as_mut() else {
            return 0;
        };
        if !reader.is_started() {
            return 0;
        }

        let mut remaining = num_frames;
        let mut total = 0;
        while remaining > 0 {
            let want = remaining.min(self.scratch.len());
            let read = reader.read(&mut self.scratch[..want]);
            if read == 0 {
                break;
            }
            recording.offer(current_frame, &self.scratch[..read]);
            total += read;
            remaining -= read;
            if read < want {
                break;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecordingSession;
    use crate::sink::Sink;
    use crate::{EngineConfig, SinkError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    struct QueueReader {
        queue: VecDeque<i16>,
        started: bool,
        reads: Arc<Mutex<Vec<usize>>>,
    }

    impl CaptureReader for QueueReader {
        fn read(&mut self, buf: &mut [i16]) -> usize {
            self.reads.lock().push(buf.len());
            let n = buf.len().min(self.queue.len());
            for (slot, s) in buf.iter_mut().zip(self.queue.drain(..n)) {
                *slot = s;
            }
            n
        }

        fn is_started(&self) -> bool {
            self.started
        }
    }

    struct VecSink(Arc<Mutex<Vec<i16>>>);

    impl Sink for VecSink {
        fn name(&self) -> &str {
            "vec"
        }

        fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
            self.0.lock().extend_from_slice(samples);
            Ok(())
        }
    }

    fn reader(samples: impl IntoIterator<Item = i16>, started: bool) -> QueueReader {
        QueueReader {
            queue: samples.into_iter().collect(),
            started,
            reads: Arc::default(),
        }
    }

    fn record(
        state: &RecordingState,
        start_frame: i64,
    ) -> (RecordingSession, Arc<Mutex<Vec<i16>>>) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let config = EngineConfig {
            writer_poll_interval: Duration::from_millis(1),
            ..Default::default()
        };
        let session = RecordingSession::begin(
            state,
            Box::new(VecSink(Arc::clone(&out))),
            start_frame,
            &config,
            None,
        )
        .unwrap();
        (session, out)
    }

    #[test]
    fn test_no_reader_reads_nothing() {
        let mut path = CapturePath::new(None, 64);
        assert_eq!(path.process(0, 32, &RecordingState::new()), 0);
    }

    #[test]
    fn test_stopped_stream_is_not_read() {
        let mut path = CapturePath::new(Some(Box::new(reader(0..10, false))), 64);
        assert_eq!(path.process(0, 10, &RecordingState::new()), 0);
    }

    #[test]
    fn test_samples_drained_even_without_recording() {
        let mut path = CapturePath::new(Some(Box::new(reader(0..10, true))), 64);
        let state = RecordingState::new();
        assert_eq!(path.process(0, 8, &state), 8);
        assert_eq!(path.process(8, 8, &state), 2);
        assert_eq!(state.captured(), 0);
    }

    #[test]
    fn test_large_callback_is_read_in_pieces() {
        let source = reader((0..100).map(|i| i as i16), true);
        let reads = Arc::clone(&source.reads);
        let mut path = CapturePath::new(Some(Box::new(source)), 32);

        let state = RecordingState::new();
        let (session, out) = record(&state, 0);
        assert_eq!(path.process(0, 100, &state), 100);
        session.end(&state);

        assert_eq!(*reads.lock(), vec![32, 32, 32, 4]);
        assert_eq!(*out.lock(), (0..100).map(|i| i as i16).collect::<Vec<_>>());
        assert_eq!(state.captured(), 100);
    }

    #[test]
    fn test_gated_before_threshold() {
        let mut path = CapturePath::new(Some(Box::new(reader(vec![5; 1024], true))), 256);
        let state = RecordingState::new();
        let (session, out) = record(&state, 1000);

        assert_eq!(path.process(512, 256, &state), 256);
        assert_eq!(state.captured(), 0);

        assert_eq!(path.process(1024, 256, &state), 256);
        assert_eq!(state.captured(), 256);

        session.end(&state);
        assert_eq!(out.lock().len(), 256);
    }
}
