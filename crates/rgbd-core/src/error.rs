//! Error types for the capture pipeline.
//!
//! [`CaptureError`] covers every failure the pool, capture and session layers
//! report synchronously. Storage-side failures (encoders, BLKD files) have their
//! own type in `rgbd-storage` because they are reported per buffer by the worker
//! pool instead of being propagated to the producer.
//!
//! Pool exhaustion is not an error: it surfaces as `None` from
//! `acquire_free` plus a dropped-frame counter.

use crate::channel::ChannelKind;
use thiserror::Error;

/// Convenience alias for results using [`CaptureError`].
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Primary error type for the capture pipeline.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// `set_capacity` was called while buffers were still outstanding.
    ///
    /// Resizing is only valid once the drain barrier has completed
    /// (every buffer back in the free set). This is a programmer error in
    /// the session layer and is never retried.
    #[error(
        "Cannot resize buffer pool while busy ({pending} pending, {in_flight} in flight)"
    )]
    PoolBusy {
        /// Buffers waiting in the pending queue
        pending: usize,
        /// Buffers held by the producer or a worker
        in_flight: usize,
    },

    /// A pool capacity of zero was requested.
    #[error("Invalid buffer pool capacity: {0}")]
    InvalidCapacity(usize),

    /// A caller-supplied sequence index did not increase.
    #[error("Sequence index {requested} does not follow last assigned index {last}")]
    SequenceRegression {
        /// Last index assigned by the pool
        last: u64,
        /// Index the caller tried to assign
        requested: u64,
    },

    /// A caller-supplied sequence index was above the pool's maximum.
    #[error("Sequence index {requested} exceeds the maximum {max}")]
    SequenceOutOfRange {
        /// Index the caller tried to assign
        requested: u64,
        /// Largest index the pool accepts
        max: u64,
    },

    /// A capture destination or source did not match the channel's fixed size.
    ///
    /// Raised by channel capture as a guard against configuration drift
    /// between the sensor geometry and the pool's buffers. Fatal to the frame.
    #[error("Channel {channel} size mismatch: expected {expected} bytes, got {actual}")]
    ChannelSizeMismatch {
        /// Channel being captured
        channel: ChannelKind,
        /// `width * height * bytes_per_pixel`
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// A channel enabled for the shot was absent from the sensor frame.
    #[error("Channel {0} is enabled but the sensor frame has no data for it")]
    ChannelMissing(ChannelKind),

    /// Semantic configuration error (passes parsing but is invalid).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration could not be parsed or extracted.
    #[error("Configuration loading failed: {0}")]
    Config(#[from] figment::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session metadata could not be serialized or parsed.
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// An operation was attempted in the wrong shot/session state.
    #[error("Invalid shot state: {0}")]
    ShotState(String),

    /// A saved-item type name was not recognised.
    #[error("Unknown saved item type '{0}'")]
    UnknownItemType(String),

    /// The drain barrier did not complete in time.
    #[error("Drain barrier timed out ({pending} pending, {in_flight} in flight)")]
    DrainTimeout {
        /// Buffers still pending
        pending: usize,
        /// Buffers still held outside the pool
        in_flight: usize,
    },

    /// A session-level item (calibration, metadata side file) could not be written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// One or more serialization workers panicked outside buffer handling.
    #[error("{0} serialization worker(s) terminated abnormally")]
    WorkerPanicked(usize),
}
