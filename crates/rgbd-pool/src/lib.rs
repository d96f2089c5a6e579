//! Bounded frame-buffer pool for lossy, non-blocking capture.
//!
//! The pool decouples frame arrival (which must never block) from disk I/O
//! (slow, variable latency). It owns an arena of `N` pre-allocated
//! [`FrameBuffer`]s, indexed `0..N`, each in exactly one state:
//!
//! ```text
//!            acquire_free()           enqueue_pending()
//!   free ─────────────────► filling ─────────────────► pending
//!    ▲                         │                          │
//!    │       drop (abandon)    │          dequeue_pending()│
//!    ├─────────────────────────┘                          ▼
//!    │                 release() / drop              serializing
//!    └────────────────────────────────────────────────────┘
//! ```
//!
//! Buffers leave the pool as typed leases: a [`WritableBuffer`] for the
//! producer and a [`SerializableBuffer`] for a worker. Only the producer lease
//! hands out mutable access, and both leases return their buffer to the free
//! set when dropped, so a failed or panicking writer never leaks capacity.
//!
//! # Exhaustion
//!
//! [`BufferPool::acquire_free`] never blocks. When the free set is empty it
//! returns `None` and increments the dropped-frame counter: the caller drops
//! the frame and carries on.
//!
//! # Example
//!
//! ```
//! use rgbd_core::{ChannelKind, Resolution, SensorGeometry};
//! use rgbd_pool::BufferPool;
//!
//! let geometry = SensorGeometry::new(Resolution::new(8, 6), Resolution::new(4, 3));
//! let pool = BufferPool::new(3, geometry)?;
//!
//! // Producer
//! let mut buffer = pool.acquire_free().expect("pool exhausted");
//! buffer.region_mut(ChannelKind::BodyIndex).fill(1);
//! let sequence = pool.enqueue_pending(buffer);
//!
//! // Worker
//! let job = pool.dequeue_pending().expect("nothing pending");
//! assert_eq!(job.sequence(), Some(sequence));
//! pool.release(job);
//!
//! assert_eq!(pool.free_count(), 3);
//! # Ok::<(), rgbd_core::CaptureError>(())
//! ```

pub mod buffer_pool;
pub mod frame_buffer;
pub mod lease;

pub use buffer_pool::{BufferPool, PoolStats, MAX_SEQUENCE};
pub use frame_buffer::FrameBuffer;
pub use lease::{SerializableBuffer, WritableBuffer};
