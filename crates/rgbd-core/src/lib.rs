//! Core types for the RGB-D capture pipeline.
//!
//! This crate holds everything the pool, storage and session crates agree on:
//!
//! - [`channel`]: channel kinds, sensor geometry, per-shot channel flags and
//!   the saved-item taxonomy used for output folders and metadata
//! - [`sensor`]: the borrowed [`SensorFrame`] handed over by an acquisition
//!   source on every frame-arrival callback
//! - [`skeleton`] and [`calibration`]: the two non-image payloads
//! - [`error`]: the [`CaptureError`] taxonomy
//! - [`config`] and [`logging`]: figment-backed configuration and tracing setup

pub mod calibration;
pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod sensor;
pub mod skeleton;

pub use calibration::{CalibrationPoint, CalibrationRecord, DepthSpacePoint};
pub use channel::{ChannelKind, Resolution, SavedItemType, SensorGeometry, SerializationFlags};
pub use config::{CaptureConfig, ShotDefinition};
pub use error::{CaptureError, CaptureResult};
pub use sensor::{CameraSpacePoint, ColorSpacePoint, DepthMappingSamples, SensorFrame, Timed};
pub use skeleton::{Body, Joint, JointType, SkeletonFrame, TrackingState};
