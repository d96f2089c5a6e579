//! One shot: the producer side, its serialization workers and the drain barrier.
//!
//! ```text
//! sensor callback ── on_frame ──► acquire_free ─► capture ─► enqueue_pending
//!                       │              │             │
//!                    Ignored        Dropped       Rejected
//!                 (budget spent)  (pool empty)  (bad samples)
//! ```
//!
//! Every arrival is accounted for exactly once:
//! `arrived == accepted + dropped + rejected`. Frames past the shot's budget
//! or after [`ShotRecorder::cancel`] are ignored and not counted as arrivals.

use chrono::Utc;
use rgbd_core::config::StorageConfig;
use rgbd_core::{CaptureError, CaptureResult, SensorFrame, ShotDefinition};
use rgbd_pool::BufferPool;
use rgbd_storage::{FrameSink, SavedItem, SerializationFailure, SerializationWorkerPool};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::capture::ChannelCapture;

/// Worker and barrier settings for a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderSettings {
    /// Serialization worker threads
    pub workers: usize,
    /// Idle worker wait before re-checking for stop
    pub idle_wait: Duration,
    /// Upper bound on the drain barrier in [`ShotRecorder::finish`]
    pub drain_timeout: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self::from_storage_config(&StorageConfig::default())
    }
}

impl RecorderSettings {
    /// Settings from the `[storage]` section.
    #[must_use]
    pub fn from_storage_config(config: &StorageConfig) -> Self {
        Self {
            workers: config.workers,
            idle_wait: config.idle_wait(),
            drain_timeout: config.drain_timeout(),
        }
    }
}

/// What happened to one sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Captured and queued with this sequence index
    Accepted(u64),
    /// No free buffer; the frame was shed
    Dropped,
    /// Capture failed (size mismatch, missing channel); buffer returned
    Rejected,
    /// The shot is not accepting frames
    Ignored,
}

/// Accounting for a finished shot.
#[derive(Debug, Clone, Default)]
pub struct ShotReport {
    /// Frames counted against the shot's budget
    pub arrived: u64,
    /// Frames captured and queued
    pub accepted: u64,
    /// Frames shed because the pool was exhausted
    pub dropped: u64,
    /// Frames whose capture failed
    pub rejected: u64,
    /// Buffers serialized without error
    pub serialized: u64,
    /// Buffers whose serialization failed or panicked
    pub failed: u64,
    /// Items written by the sink, sorted by path
    pub saved_items: Vec<SavedItem>,
    /// Per-buffer failure details
    pub failures: Vec<SerializationFailure>,
    /// Wall time from start to the end of the drain barrier
    pub elapsed: Duration,
}

impl ShotReport {
    /// No frame was dropped, rejected or failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped == 0 && self.rejected == 0 && self.failed == 0
    }
}

/// Records one shot into a shared [`BufferPool`].
///
/// [`on_frame`](Self::on_frame) never blocks on serialization; it is meant to
/// be called from the sensor callback thread. `ShotRecorder` is `Sync`, so
/// [`cancel`](Self::cancel) may come from another thread.
pub struct ShotRecorder {
    shot_index: usize,
    definition: ShotDefinition,
    pool: BufferPool,
    capture: ChannelCapture,
    sink: Arc<dyn FrameSink>,
    workers: SerializationWorkerPool,
    drain_timeout: Duration,
    started: Instant,
    closed: AtomicBool,
    arrived: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl ShotRecorder {
    /// Resize `pool` for `definition` and start the shot's workers.
    ///
    /// Fails with [`CaptureError::PoolBusy`] if the previous shot has not
    /// drained.
    pub fn start(
        shot_index: usize,
        definition: ShotDefinition,
        pool: BufferPool,
        sink: Arc<dyn FrameSink>,
        settings: RecorderSettings,
    ) -> CaptureResult<Self> {
        pool.set_capacity(definition.buffer_count)?;
        let capture = ChannelCapture::new(pool.geometry());
        let workers = SerializationWorkerPool::start(
            settings.workers,
            pool.clone(),
            Arc::clone(&sink),
            settings.idle_wait,
        )?;

        info!(
            shot = shot_index,
            pool_size = definition.buffer_count,
            frames_to_capture = definition.frames_to_capture,
            workers = settings.workers,
            "Shot started"
        );

        Ok(Self {
            shot_index,
            definition,
            pool,
            capture,
            sink,
            workers,
            drain_timeout: settings.drain_timeout,
            started: Instant::now(),
            closed: AtomicBool::new(false),
            arrived: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// 0-based index of the shot in its session.
    #[must_use]
    pub fn shot_index(&self) -> usize {
        self.shot_index
    }

    /// Definition the shot runs with.
    #[must_use]
    pub fn definition(&self) -> &ShotDefinition {
        &self.definition
    }

    /// Handle one sensor frame.
    pub fn on_frame(&self, sensor: &SensorFrame<'_>) -> FrameOutcome {
        if self.closed.load(Ordering::Acquire) || !self.admit() {
            return FrameOutcome::Ignored;
        }

        // The pool counts and logs the drop
        let Some(mut buffer) = self.pool.acquire_free() else {
            return FrameOutcome::Dropped;
        };

        buffer.set_arrival(Utc::now(), sensor.relative_time);
        if let Err(e) = self
            .capture
            .capture(&mut buffer, sensor, &self.definition.channels)
        {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(shot = self.shot_index, slot = buffer.slot(), error = %e, "Frame rejected");
            return FrameOutcome::Rejected;
        }

        let sequence = self.pool.enqueue_pending(buffer);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        FrameOutcome::Accepted(sequence)
    }

    /// Count an arrival if the budget allows it.
    fn admit(&self) -> bool {
        let limit = self.definition.frames_to_capture;
        let unbounded = self.definition.is_unbounded();
        let admitted = self
            .arrived
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (unbounded || n < limit).then_some(n + 1)
            })
            .is_ok();
        if !admitted {
            self.closed.store(true, Ordering::Release);
        }
        admitted
    }

    /// Stop accepting frames. Frames already queued are still serialized.
    pub fn cancel(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(shot = self.shot_index, "Shot cancelled");
        }
    }

    /// Whether the shot has stopped accepting frames.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.closed.load(Ordering::Acquire)
            || (!self.definition.is_unbounded()
                && self.arrived.load(Ordering::Acquire) >= self.definition.frames_to_capture)
    }

    /// Frames counted so far.
    #[must_use]
    pub fn arrived(&self) -> u64 {
        self.arrived.load(Ordering::Relaxed)
    }

    /// Frames queued so far.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Stop, drain and report.
    ///
    /// Blocks until every buffer is back in the free set or the drain
    /// timeout elapses ([`CaptureError::DrainTimeout`]); the pool may only be
    /// resized for the next shot after this returns `Ok`.
    pub fn finish(self) -> CaptureResult<ShotReport> {
        self.cancel();
        self.workers.request_stop();

        if !self.pool.wait_until_drained(self.drain_timeout) {
            let stats = self.pool.stats();
            error!(
                shot = self.shot_index,
                pending = stats.pending,
                in_flight = stats.in_flight(),
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "Drain barrier timed out"
            );
            return Err(CaptureError::DrainTimeout {
                pending: stats.pending,
                in_flight: stats.in_flight(),
            });
        }
        self.workers.join()?;

        let worker_stats = self.workers.stats();
        let mut saved_items = self.sink.take_saved_items();
        saved_items.sort_by(|a, b| a.path.cmp(&b.path));

        let report = ShotReport {
            arrived: self.arrived(),
            accepted: self.accepted(),
            dropped: self.pool.dropped_frames(),
            rejected: self.rejected.load(Ordering::Relaxed),
            serialized: worker_stats.serialized,
            failed: worker_stats.failed,
            saved_items,
            failures: self.workers.take_failures(),
            elapsed: self.started.elapsed(),
        };

        info!(
            shot = self.shot_index,
            arrived = report.arrived,
            accepted = report.accepted,
            dropped = report.dropped,
            rejected = report.rejected,
            serialized = report.serialized,
            failed = report.failed,
            items = report.saved_items.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Shot drained"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ShotRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShotRecorder")
            .field("shot_index", &self.shot_index)
            .field("definition", &self.definition)
            .field("arrived", &self.arrived())
            .field("accepted", &self.accepted())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
