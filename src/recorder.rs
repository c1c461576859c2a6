//! Recording control: the state the audio thread gates on, and the writer
//! thread that moves captured samples into a [`Sink`].

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::sink::Sink;
use crate::{EngineConfig, EngineEvent, EventCallback, SinkError};

/// Samples moved from the ring to the sink per write.
const WRITER_BATCH: usize = 4096;

/// Statistics about the current or most recent recording session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingStats {
    /// `true` while a session is accepting samples.
    pub active: bool,
    /// Frame clock value at which capture begins to count.
    pub start_frame: i64,
    /// Samples accepted for the sink.
    pub captured_samples: i64,
    /// Samples discarded because the recording ring was full.
    pub dropped_samples: u64,
}

/// Recording state shared between the control thread and the audio thread.
///
/// The threshold and counters stay readable after a session ends; they are
/// only reset by the next session.
pub(crate) struct RecordingState {
    enabled: AtomicBool,
    start_frame: AtomicI64,
    captured: AtomicI64,
    dropped: AtomicU64,
    producer: Mutex<Option<HeapProd<i16>>>,
}

impl RecordingState {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            start_frame: AtomicI64::new(0),
            captured: AtomicI64::new(0),
            dropped: AtomicU64::new(0),
            producer: Mutex::new(None),
        }
    }

    /// Hands captured samples to the active session, if any.
    ///
    /// Called from the audio thread. Samples captured before the threshold
    /// frame are discarded. Never blocks: if the control thread is swapping
    /// the producer right now, this batch is counted as dropped.
    pub fn offer(&self, current_frame: i64, samples: &[i16]) {
        if samples.is_empty() || !self.enabled.load(Ordering::Acquire) {
            return;
        }
        if current_frame < self.start_frame.load(Ordering::Acquire) {
            return;
        }

        let Some(mut producer) = self.producer.try_lock() else {
            self.dropped.fetch_add(samples.len() as u64, Ordering::Relaxed);
            return;
        };
        let Some(producer) = producer.as_mut() else {
            return;
        };

        let pushed = producer.push_slice(samples);
        self.captured.fetch_add(pushed as i64, Ordering::AcqRel);
        if pushed < samples.len() {
            self.dropped
                .fetch_add((samples.len() - pushed) as u64, Ordering::Relaxed);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn start_frame(&self) -> i64 {
        self.start_frame.load(Ordering::Acquire)
    }

    pub fn captured(&self) -> i64 {
        self.captured.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RecordingStats {
        RecordingStats {
            active: self.is_enabled(),
            start_frame: self.start_frame(),
            captured_samples: self.captured(),
            dropped_samples: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Zeroes the counters and stores a new threshold.
    fn arm(&self, start_frame: i64) {
        self.captured.store(0, Ordering::Release);
        self.dropped.store(0, Ordering::Relaxed);
        self.start_frame.store(start_frame, Ordering::Release);
    }
}

/// An active recording: a sink owned by a writer thread, fed from a ring.
pub(crate) struct RecordingSession {
    sink_name: String,
    stop: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
}

impl RecordingSession {
    /// Opens `sink`, arms `state` with a fresh counter and threshold, and
    /// starts the writer thread.
    ///
    /// The counter and threshold are reset even if the sink fails to open;
    /// recording stays disabled in that case.
    pub fn begin(
        state: &RecordingState,
        mut sink: Box<dyn Sink>,
        start_frame: i64,
        config: &EngineConfig,
        events: Option<EventCallback>,
    ) -> Result<Self, SinkError> {
        state.enabled.store(false, Ordering::Release);
        state.arm(start_frame);

        let sink_name = sink.name().to_string();
        sink.open()?;

        let capacity = config.samples_for(config.recording_buffer).max(1);
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();
        *state.producer.lock() = Some(producer);

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let stop = Arc::clone(&stop);
            let poll_interval = config.writer_poll_interval;
            thread::Builder::new()
                .name("tapstory-recorder".into())
                .spawn(move || run_writer(sink, consumer, &stop, poll_interval, events.as_ref()))
        };
        let writer = match writer {
            Ok(handle) => handle,
            Err(e) => {
                state.producer.lock().take();
                return Err(SinkError::custom(format!(
                    "failed to spawn recording writer: {e}"
                )));
            }
        };

        state.enabled.store(true, Ordering::Release);
        Ok(Self {
            sink_name,
            stop,
            writer: Some(writer),
        })
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Disables capture, lets the writer drain everything already accepted,
    /// then finishes the sink. Blocks until the writer has exited.
    pub fn end(mut self, state: &RecordingState) {
        self.shutdown(state);
    }

    fn shutdown(&mut self, state: &RecordingState) {
        state.enabled.store(false, Ordering::Release);
        state.producer.lock().take();
        self.stop.store(true, Ordering::Release);

        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::error!(sink = %self.sink_name, "recording writer panicked");
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        // Dropped without end(): the sink is still finished, but capture
        // stays armed until the state is disabled by its owner.
        self.stop.store(true, Ordering::Release);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

fn run_writer(
    mut sink: Box<dyn Sink>,
    mut consumer: HeapCons<i16>,
    stop: &AtomicBool,
    poll_interval: Duration,
    events: Option<&EventCallback>,
) {
    let mut batch = vec![0i16; WRITER_BATCH];
    let mut failed = false;
    let mut written: u64 = 0;

    loop {
        // Read the flag before draining: everything pushed before the stop
        // request is then guaranteed to be visible to the drain below.
        let stopping = stop.load(Ordering::Acquire);
        let mut drained = 0;

        loop {
            let n = consumer.pop_slice(&mut batch);
            if n == 0 {
                break;
            }
            drained += n;
            if failed {
                continue;
            }
            match sink.write(&batch[..n]) {
                Ok(()) => written += n as u64,
                Err(e) => {
                    failed = true;
                    report_failure(sink.name(), &e, events);
                }
            }
        }

        if stopping {
            break;
        }
        if drained == 0 {
            thread::sleep(poll_interval);
        }
    }

    if let Err(e) = sink.finish() {
        report_failure(sink.name(), &e, events);
    }
    tracing::debug!(sink = sink.name(), samples = written, "recording writer exited");
}

fn report_failure(sink_name: &str, error: &SinkError, events: Option<&EventCallback>) {
    tracing::error!(sink = sink_name, error = %error, "recording sink failed");
    if let Some(events) = events {
        events(EngineEvent::RecordingFailed {
            sink_name: sink_name.to_string(),
            error: error.to_string(),
        });
    }
}
