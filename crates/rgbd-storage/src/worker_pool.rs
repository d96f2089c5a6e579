//! Fixed pool of serialization threads draining a [`BufferPool`].
//!
//! Each worker runs the same loop:
//!
//! ```text
//! loop {
//!     if let Some(job) = pool.dequeue_pending() {   // Idle -> Serializing
//!         sink.serialize(&job);                     // errors/panics recorded
//!         drop(job);                                // release, always
//!         continue;                                 // Serializing -> Idle
//!     }
//!     if stop requested { break }                   // Idle -> Stopped
//!     pool.wait_for_pending(idle_wait);             // condvar, not a spin
//! }
//! ```
//!
//! Stopping is cooperative: [`request_stop`](SerializationWorkerPool::request_stop)
//! stops nothing already queued. Workers keep draining pending buffers and
//! only exit once they find the queue empty with the stop flag set, so a
//! worker never dequeues after reaching `Stopped`.

use crate::sink::FrameSink;
use parking_lot::Mutex;
use rgbd_core::{CaptureError, CaptureResult};
use rgbd_pool::BufferPool;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of one worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for pending work
    Idle,
    /// Serializing a buffer
    Serializing,
    /// Exited after observing the stop flag while idle
    Stopped,
}

impl WorkerState {
    const fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Serializing => 1,
            WorkerState::Stopped => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Serializing,
            _ => WorkerState::Stopped,
        }
    }
}

/// Counters shared by all workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Buffers serialized without error
    pub serialized: u64,
    /// Buffers whose serialization failed or panicked
    pub failed: u64,
    /// Times a worker went back to waiting with nothing pending
    pub idle_waits: u64,
}

impl WorkerStats {
    /// Buffers taken off the pending queue, successful or not.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.serialized + self.failed
    }
}

/// A buffer that could not be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationFailure {
    /// Sequence index of the buffer
    pub sequence: Option<u64>,
    /// Error or panic message
    pub message: String,
}

struct Shared {
    pool: BufferPool,
    sink: Arc<dyn FrameSink>,
    stop: AtomicBool,
    states: Vec<AtomicU8>,
    serialized: AtomicU64,
    failed: AtomicU64,
    idle_waits: AtomicU64,
    failures: Mutex<Vec<SerializationFailure>>,
    idle_wait: Duration,
}

impl Shared {
    fn set_state(&self, worker: usize, state: WorkerState) {
        self.states[worker].store(state.as_u8(), Ordering::SeqCst);
    }

    fn run(&self, worker: usize) {
        debug!(worker, "Serialization worker started");
        loop {
            if let Some(job) = self.pool.dequeue_pending() {
                self.set_state(worker, WorkerState::Serializing);
                let sequence = job.sequence();
                trace!(worker, sequence, slot = job.slot(), "Serializing buffer");

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.sink.serialize(&job)));
                // Back to the pool before the outcome is recorded
                drop(job);

                match outcome {
                    Ok(Ok(())) => {
                        self.serialized.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        warn!(worker, sequence, error = %e, "Buffer serialization failed");
                        self.record_failure(sequence, e.to_string());
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(worker, sequence, panic = %message, "Sink panicked while serializing");
                        self.record_failure(sequence, message);
                    }
                }

                self.set_state(worker, WorkerState::Idle);
                continue;
            }

            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            self.idle_waits.fetch_add(1, Ordering::Relaxed);
            self.pool.wait_for_pending_unless(self.idle_wait, &self.stop);
        }

        self.set_state(worker, WorkerState::Stopped);
        debug!(worker, "Serialization worker stopped");
    }

    fn record_failure(&self, sequence: Option<u64>, message: String) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.failures
            .lock()
            .push(SerializationFailure { sequence, message });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Fixed set of worker threads serializing pending buffers.
pub struct SerializationWorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SerializationWorkerPool {
    /// Spawn `workers` threads named `rgbd-serializer-<n>` draining `pool` into `sink`.
    ///
    /// `idle_wait` bounds how long an idle worker blocks before re-checking
    /// the stop flag.
    pub fn start(
        workers: usize,
        pool: BufferPool,
        sink: Arc<dyn FrameSink>,
        idle_wait: Duration,
    ) -> CaptureResult<Self> {
        if workers == 0 {
            return Err(CaptureError::Configuration(
                "serialization worker pool needs at least one worker".to_string(),
            ));
        }

        let shared = Arc::new(Shared {
            pool,
            sink,
            stop: AtomicBool::new(false),
            states: (0..workers)
                .map(|_| AtomicU8::new(WorkerState::Idle.as_u8()))
                .collect(),
            serialized: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            idle_waits: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
            idle_wait,
        });

        let this = Self {
            shared: Arc::clone(&shared),
            handles: Mutex::new(Vec::with_capacity(workers)),
        };

        for worker in 0..workers {
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("rgbd-serializer-{worker}"))
                .spawn(move || shared.run(worker));

            match spawned {
                Ok(handle) => this.handles.lock().push(handle),
                Err(e) => {
                    // Never leave a half-started pool running
                    for w in worker..workers {
                        this.shared.set_state(w, WorkerState::Stopped);
                    }
                    this.stop_and_join().ok();
                    return Err(CaptureError::Io(e));
                }
            }
        }

        info!(workers, idle_wait_ms = idle_wait.as_millis() as u64, "Serialization workers started");
        Ok(this)
    }

    /// Stop accepting new work once the pending queue is empty.
    ///
    /// Non-blocking. Buffers already pending are still serialized.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.pool.wake_waiters();
    }

    /// Whether stop has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Block until every worker thread has exited.
    ///
    /// Without a prior [`request_stop`](Self::request_stop) this waits
    /// forever. Returns [`CaptureError::WorkerPanicked`] if a thread died
    /// outside per-buffer handling.
    pub fn join(&self) -> CaptureResult<()> {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        let mut panicked = 0;
        for handle in handles {
            let name = handle.thread().name().map(str::to_string);
            if let Err(e) = handle.join() {
                error!(thread = ?name, "Serialization worker panicked: {:?}", e);
                panicked += 1;
            }
        }

        let stats = self.stats();
        info!(
            serialized = stats.serialized,
            failed = stats.failed,
            idle_waits = stats.idle_waits,
            "Serialization workers joined"
        );

        if panicked > 0 {
            Err(CaptureError::WorkerPanicked(panicked))
        } else {
            Ok(())
        }
    }

    /// [`request_stop`](Self::request_stop) then [`join`](Self::join).
    pub fn stop_and_join(&self) -> CaptureResult<()> {
        self.request_stop();
        self.join()
    }

    /// Current state of each worker.
    #[must_use]
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.shared
            .states
            .iter()
            .map(|s| WorkerState::from_u8(s.load(Ordering::SeqCst)))
            .collect()
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.states.len()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            serialized: self.shared.serialized.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            idle_waits: self.shared.idle_waits.load(Ordering::Relaxed),
        }
    }

    /// Take the failures recorded so far.
    #[must_use]
    pub fn take_failures(&self) -> Vec<SerializationFailure> {
        std::mem::take(&mut *self.shared.failures.lock())
    }
}

impl Drop for SerializationWorkerPool {
    fn drop(&mut self) {
        if !self.handles.lock().is_empty() {
            if let Err(e) = self.stop_and_join() {
                error!(error = %e, "Serialization workers did not shut down cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::writers::test_support::{fill, tiny_geometry};
    use rgbd_pool::FrameBuffer;
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    /// Records sequences; fails odd sequences, panics on 13.
    #[derive(Default)]
    struct ScriptedSink {
        seen: Mutex<Vec<u64>>,
        fail_odd: bool,
        delay: Duration,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
    }

    impl FrameSink for ScriptedSink {
        fn serialize(&self, frame: &FrameBuffer) -> Result<(), StorageError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            let sequence = frame.sequence().unwrap_or(u64::MAX);
            self.seen.lock().push(sequence);
            if sequence == 13 {
                panic!("sink exploded on 13");
            }
            if self.fail_odd && sequence % 2 == 1 {
                return Err(StorageError::Encode(format!("odd sequence {sequence}")));
            }
            Ok(())
        }
    }

    fn enqueue(pool: &BufferPool, count: usize) {
        for _ in 0..count {
            let mut buf = pool.acquire_free().unwrap();
            fill(&mut buf);
            pool.enqueue_pending(buf);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let pool = BufferPool::new(1, tiny_geometry()).unwrap();
        let sink: Arc<dyn FrameSink> = Arc::new(ScriptedSink::default());
        assert!(SerializationWorkerPool::start(0, pool, sink, Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_stop_finishes_pending_work() {
        let pool = BufferPool::new(8, tiny_geometry()).unwrap();
        enqueue(&pool, 8);

        let sink = Arc::new(ScriptedSink {
            delay: Duration::from_millis(2),
            ..Default::default()
        });
        let workers =
            SerializationWorkerPool::start(2, pool.clone(), sink.clone(), Duration::from_millis(5))
                .unwrap();
        workers.stop_and_join().unwrap();

        let mut seen = sink.seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
        assert_eq!(workers.stats().serialized, 8);
        assert_eq!(pool.free_count(), 8);
        assert!(workers
            .worker_states()
            .iter()
            .all(|s| *s == WorkerState::Stopped));
    }

    #[test]
    fn test_failures_are_isolated_and_buffers_released() {
        let pool = BufferPool::new(16, tiny_geometry()).unwrap();
        enqueue(&pool, 16);

        let sink = Arc::new(ScriptedSink {
            fail_odd: true,
            ..Default::default()
        });
        let workers =
            SerializationWorkerPool::start(3, pool.clone(), sink, Duration::from_millis(5)).unwrap();
        workers.stop_and_join().unwrap();

        let stats = workers.stats();
        // 8 odd failures (13 panics instead of failing), 8 evens succeed
        assert_eq!(stats.serialized, 8);
        assert_eq!(stats.failed, 8);
        assert_eq!(pool.free_count(), 16);

        let failures = workers.take_failures();
        assert_eq!(failures.len(), 8);
        assert!(failures
            .iter()
            .any(|f| f.sequence == Some(13) && f.message.contains("exploded")));
        assert!(workers.take_failures().is_empty());
    }

    #[test]
    fn test_workers_run_in_parallel() {
        let pool = BufferPool::new(8, tiny_geometry()).unwrap();
        let sink = Arc::new(ScriptedSink {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let workers =
            SerializationWorkerPool::start(4, pool.clone(), sink.clone(), Duration::from_millis(5))
                .unwrap();
        enqueue(&pool, 8);
        workers.stop_and_join().unwrap();

        assert!(sink.max_concurrent.load(Ordering::SeqCst) > 1);
        assert_eq!(pool.free_count(), 8);
    }

    #[test]
    fn test_idle_workers_wake_on_enqueue() {
        let pool = BufferPool::new(2, tiny_geometry()).unwrap();
        let sink = Arc::new(ScriptedSink::default());
        let workers =
            SerializationWorkerPool::start(1, pool.clone(), sink.clone(), Duration::from_secs(10))
                .unwrap();

        thread::sleep(Duration::from_millis(20));
        enqueue(&pool, 1);
        assert!(pool.wait_until_drained(Duration::from_secs(5)));
        assert_eq!(sink.seen.lock().as_slice(), &[0]);

        workers.stop_and_join().unwrap();
    }

    #[traced_test]
    #[test]
    fn test_worker_logs_start() {
        let pool = BufferPool::new(1, tiny_geometry()).unwrap();
        let sink: Arc<dyn FrameSink> = Arc::new(ScriptedSink::default());
        let workers =
            SerializationWorkerPool::start(2, pool, sink, Duration::from_millis(1)).unwrap();
        workers.stop_and_join().unwrap();
        assert!(logs_contain("Serialization workers started"));
        assert!(logs_contain("Serialization workers joined"));
    }
}
