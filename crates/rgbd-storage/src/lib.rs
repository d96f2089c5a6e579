//! Serialization side of the capture pipeline.
//!
//! - [`blkd`]: the packed binary format used for depth-to-color mapping
//! - [`writers`]: one [`FrameWriter`](writers::FrameWriter) per channel plus
//!   the calibration record writer
//! - [`worker_pool`]: fixed set of threads draining the buffer pool
//! - [`sink`]: the [`FrameSink`] seam between workers and storage, with the
//!   file-per-channel [`DiskSink`]

pub mod blkd;
pub mod error;
pub mod sink;
pub mod worker_pool;
pub mod writers;

pub use blkd::{Blkd, BlkdHeader};
pub use error::{BlkdError, StorageError};
pub use sink::{DiskSink, FrameSink, PathGenerator, SavedItem};
pub use worker_pool::{SerializationFailure, SerializationWorkerPool, WorkerState, WorkerStats};
pub use writers::{FrameWriter, WriterSettings};
