//! The shared pool: free set, pending queue and accounting.
//!
//! All state lives in one `parking_lot::Mutex`. Every operation touches at
//! most the two queues and a few counters while holding it, and nothing holds
//! it across I/O. The two condition variables back the optional blocking
//! helpers only; the core acquire/enqueue/dequeue/release contract never waits.

use crate::frame_buffer::FrameBuffer;
use crate::lease::{SerializableBuffer, WritableBuffer};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rgbd_core::{CaptureError, CaptureResult, SensorGeometry};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Largest index [`BufferPool::enqueue_pending_at`] accepts.
///
/// Frame numbers are derived as `sequence + 1`, so indices stay well below
/// `u64::MAX`.
pub const MAX_SEQUENCE: u64 = i64::MAX as u64;

struct PoolState {
    free: VecDeque<FrameBuffer>,
    pending: VecDeque<FrameBuffer>,
    capacity: usize,
    /// Held by the producer
    filling: usize,
    /// Held by workers
    serializing: usize,
    next_sequence: u64,
    last_sequence: Option<u64>,
}

impl PoolState {
    fn in_flight(&self) -> usize {
        self.filling + self.serializing
    }

    fn is_drained(&self) -> bool {
        self.free.len() == self.capacity
    }
}

/// Shared pool internals, referenced by the pool handle and every lease.
pub(crate) struct BufferPoolInner {
    geometry: SensorGeometry,
    state: Mutex<PoolState>,
    /// Signalled on enqueue and on explicit wake-ups
    work_available: Condvar,
    /// Signalled whenever a buffer returns to the free set
    buffer_returned: Condvar,
    total_acquires: AtomicU64,
    total_releases: AtomicU64,
    dropped_frames: AtomicU64,
}

impl BufferPoolInner {
    pub(crate) fn return_serialized(&self, mut frame: FrameBuffer) {
        frame.reset();
        {
            let mut state = self.state.lock();
            state.serializing -= 1;
            state.free.push_back(frame);
        }
        self.total_releases.fetch_add(1, Ordering::Relaxed);
        self.buffer_returned.notify_all();
    }

    pub(crate) fn return_abandoned(&self, mut frame: FrameBuffer) {
        debug!(slot = frame.slot(), "Frame abandoned before enqueue");
        frame.reset();
        {
            let mut state = self.state.lock();
            state.filling -= 1;
            state.free.push_back(frame);
        }
        self.buffer_returned.notify_all();
    }

    fn push_pending(&self, frame: FrameBuffer) -> u64 {
        let state = self.state.lock();
        let sequence = state.next_sequence;
        self.commit_pending(state, frame, sequence);
        sequence
    }

    fn push_pending_at(&self, frame: FrameBuffer, requested: u64) -> CaptureResult<u64> {
        let state = self.state.lock();
        if requested > MAX_SEQUENCE {
            self.abandon_locked(state, frame);
            return Err(CaptureError::SequenceOutOfRange {
                requested,
                max: MAX_SEQUENCE,
            });
        }
        if let Some(last) = state.last_sequence.filter(|&last| requested <= last) {
            self.abandon_locked(state, frame);
            return Err(CaptureError::SequenceRegression { last, requested });
        }
        self.commit_pending(state, frame, requested);
        Ok(requested)
    }

    /// The lease is gone; the buffer goes straight back to free.
    fn abandon_locked(&self, mut state: MutexGuard<'_, PoolState>, mut frame: FrameBuffer) {
        frame.reset();
        state.filling -= 1;
        state.free.push_back(frame);
        drop(state);
        self.buffer_returned.notify_all();
    }

    fn commit_pending(
        &self,
        mut state: MutexGuard<'_, PoolState>,
        mut frame: FrameBuffer,
        sequence: u64,
    ) {
        frame.assign_sequence(sequence);
        state.next_sequence = sequence.saturating_add(1);
        state.last_sequence = Some(sequence);
        state.filling -= 1;
        state.pending.push_back(frame);
        drop(state);
        self.work_available.notify_one();
    }
}

/// One consistent snapshot of pool accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total buffers owned by the pool
    pub capacity: usize,
    /// Buffers available to the producer
    pub free: usize,
    /// Buffers waiting for a worker
    pub pending: usize,
    /// Buffers held by the producer
    pub filling: usize,
    /// Buffers held by workers
    pub serializing: usize,
    /// Successful acquires since creation
    pub total_acquires: u64,
    /// Worker releases since creation
    pub total_releases: u64,
    /// Acquires that found the pool exhausted since the last resize
    pub dropped_frames: u64,
}

impl PoolStats {
    /// Buffers outside the free set and pending queue.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.filling + self.serializing
    }

    /// `free + pending + in_flight == capacity`.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.free + self.pending + self.in_flight() == self.capacity
    }
}

/// Fixed arena of frame buffers split between free and pending sets.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl BufferPool {
    /// Create a pool of `capacity` buffers sized for `geometry`.
    ///
    /// All buffers are allocated up front.
    pub fn new(capacity: usize, geometry: SensorGeometry) -> CaptureResult<Self> {
        if capacity == 0 {
            return Err(CaptureError::InvalidCapacity(capacity));
        }

        let free: VecDeque<FrameBuffer> = (0..capacity)
            .map(|slot| FrameBuffer::new(slot, geometry))
            .collect();

        let frame_bytes = geometry.frame_bytes();
        info!(
            pool_size = capacity,
            frame_mb = frame_bytes as f64 / (1024.0 * 1024.0),
            total_mb = (capacity * frame_bytes) as f64 / (1024.0 * 1024.0),
            "BufferPool created"
        );

        Ok(Self {
            inner: Arc::new(BufferPoolInner {
                geometry,
                state: Mutex::new(PoolState {
                    free,
                    pending: VecDeque::with_capacity(capacity),
                    capacity,
                    filling: 0,
                    serializing: 0,
                    next_sequence: 0,
                    last_sequence: None,
                }),
                work_available: Condvar::new(),
                buffer_returned: Condvar::new(),
                total_acquires: AtomicU64::new(0),
                total_releases: AtomicU64::new(0),
                dropped_frames: AtomicU64::new(0),
            }),
        })
    }

    /// Geometry every buffer is sized for.
    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.inner.geometry
    }

    /// Take a free buffer for filling, without blocking.
    ///
    /// Returns `None` when every buffer is pending or in flight. That is the
    /// load-shedding point: the miss is counted in
    /// [`dropped_frames`](Self::dropped_frames) and the caller drops the frame.
    #[must_use]
    pub fn acquire_free(&self) -> Option<WritableBuffer> {
        let mut state = self.inner.state.lock();
        match state.free.pop_front() {
            Some(frame) => {
                state.filling += 1;
                drop(state);
                self.inner.total_acquires.fetch_add(1, Ordering::Relaxed);
                Some(WritableBuffer {
                    frame: Some(frame),
                    pool: Arc::clone(&self.inner),
                })
            }
            None => {
                let pending = state.pending.len();
                let in_flight = state.in_flight();
                drop(state);
                let dropped = self.inner.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 {
                    warn!(pending, in_flight, "Buffer pool exhausted, dropping frames");
                } else {
                    debug!(dropped, pending, in_flight, "Frame dropped, pool exhausted");
                }
                None
            }
        }
    }

    /// Hand a filled buffer to the workers, assigning the next sequence index.
    ///
    /// Indices increase monotonically from 0 within a shot. Wakes one waiting
    /// worker. A lease always returns to the pool it was acquired from.
    pub fn enqueue_pending(&self, buffer: WritableBuffer) -> u64 {
        let (frame, pool) = buffer.take();
        pool.push_pending(frame)
    }

    /// Hand a filled buffer to the workers under a caller-chosen index.
    ///
    /// The index must be greater than every index assigned before it in this
    /// shot; otherwise the frame is abandoned (its buffer goes back to free)
    /// and [`CaptureError::SequenceRegression`] is returned. Indices above
    /// [`MAX_SEQUENCE`] are abandoned the same way with
    /// [`CaptureError::SequenceOutOfRange`]. Gaps are allowed,
    /// e.g. to keep the sensor's frame number when earlier frames were dropped.
    pub fn enqueue_pending_at(&self, buffer: WritableBuffer, index: u64) -> CaptureResult<u64> {
        let (frame, pool) = buffer.take();
        pool.push_pending_at(frame, index)
    }

    /// Pop the oldest pending buffer for serialization, without blocking.
    #[must_use]
    pub fn dequeue_pending(&self) -> Option<SerializableBuffer> {
        let mut state = self.inner.state.lock();
        let frame = state.pending.pop_front()?;
        state.serializing += 1;
        drop(state);
        Some(SerializableBuffer {
            frame: Some(frame),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Return a serialized buffer to the free set, clearing its metadata.
    ///
    /// Equivalent to dropping the lease.
    pub fn release(&self, buffer: SerializableBuffer) {
        drop(buffer);
    }

    /// Resize the arena between shots.
    ///
    /// Fails with [`CaptureError::PoolBusy`] unless every buffer is free.
    /// Growing allocates slots `old..n`; shrinking discards slots `n..old`.
    /// Also starts a new shot: the sequence counter and dropped-frame counter
    /// are reset.
    pub fn set_capacity(&self, capacity: usize) -> CaptureResult<()> {
        if capacity == 0 {
            return Err(CaptureError::InvalidCapacity(capacity));
        }

        let mut state = self.inner.state.lock();
        if !state.pending.is_empty() || state.in_flight() > 0 {
            return Err(CaptureError::PoolBusy {
                pending: state.pending.len(),
                in_flight: state.in_flight(),
            });
        }

        let old = state.capacity;
        if capacity > old {
            let geometry = self.inner.geometry;
            state
                .free
                .extend((old..capacity).map(|slot| FrameBuffer::new(slot, geometry)));
        } else if capacity < old {
            state.free.retain(|frame| frame.slot() < capacity);
        }
        state.capacity = capacity;
        state.next_sequence = 0;
        state.last_sequence = None;
        drop(state);

        self.inner.dropped_frames.store(0, Ordering::Relaxed);
        info!(old_capacity = old, new_capacity = capacity, "BufferPool resized");
        Ok(())
    }

    /// Total buffers owned by the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().capacity
    }

    /// Buffers currently free.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.inner.state.lock().free.len()
    }

    /// Buffers currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Buffers held by the producer.
    #[must_use]
    pub fn filling_count(&self) -> usize {
        self.inner.state.lock().filling
    }

    /// Buffers held by workers.
    #[must_use]
    pub fn serializing_count(&self) -> usize {
        self.inner.state.lock().serializing
    }

    /// Buffers held by the producer or a worker.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.state.lock().in_flight()
    }

    /// Acquires that found the pool exhausted since the last resize.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped_frames.load(Ordering::Relaxed)
    }

    /// Consistent snapshot of all counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            capacity: state.capacity,
            free: state.free.len(),
            pending: state.pending.len(),
            filling: state.filling,
            serializing: state.serializing,
            total_acquires: self.inner.total_acquires.load(Ordering::Relaxed),
            total_releases: self.inner.total_releases.load(Ordering::Relaxed),
            dropped_frames: self.inner.dropped_frames.load(Ordering::Relaxed),
        }
    }

    /// Block until work is pending or `timeout` elapses.
    ///
    /// Returns `true` if pending work was observed.
    pub fn wait_for_pending(&self, timeout: Duration) -> bool {
        let mut state = self.inner.state.lock();
        if state.pending.is_empty() {
            let _ = self.inner.work_available.wait_for(&mut state, timeout);
        }
        !state.pending.is_empty()
    }

    /// Like [`wait_for_pending`](Self::wait_for_pending), but returns
    /// immediately once `cancel` is set.
    ///
    /// `cancel` is checked under the pool lock, so a
    /// [`wake_waiters`](Self::wake_waiters) issued after setting it is never
    /// missed.
    pub fn wait_for_pending_unless(&self, timeout: Duration, cancel: &AtomicBool) -> bool {
        let mut state = self.inner.state.lock();
        if state.pending.is_empty() && !cancel.load(Ordering::SeqCst) {
            let _ = self.inner.work_available.wait_for(&mut state, timeout);
        }
        !state.pending.is_empty()
    }

    /// Wake every thread blocked waiting for pending work.
    pub fn wake_waiters(&self) {
        let _state = self.inner.state.lock();
        self.inner.work_available.notify_all();
    }

    /// Drain barrier: block until every buffer is free or `timeout` elapses.
    ///
    /// Returns `true` once `free_count == capacity`.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while !state.is_drained() {
            if self
                .inner
                .buffer_returned
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.is_drained();
            }
        }
        true
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("geometry", &self.inner.geometry)
            .field("stats", &self.stats())
            .finish()
    }
}
