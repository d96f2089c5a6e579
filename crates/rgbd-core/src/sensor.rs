//! Acquisition contract.
//!
//! On each frame-arrival callback the acquisition source hands the pipeline a
//! [`SensorFrame`] that borrows its per-channel sample arrays. The pipeline
//! reads each enabled channel exactly once, copying it into a pooled buffer,
//! and never calls back into the source.

use crate::skeleton::SkeletonFrame;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Position in the color image, in (fractional) pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorSpacePoint {
    /// Column
    pub x: f32,
    /// Row
    pub y: f32,
}

/// Position in camera space, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraSpacePoint {
    /// X (meters)
    pub x: f32,
    /// Y (meters)
    pub y: f32,
    /// Z (meters)
    pub z: f32,
}

/// Channel data paired with the sensor's relative timestamp for it.
#[derive(Debug, Clone, Copy)]
pub struct Timed<T> {
    /// The samples
    pub data: T,
    /// Sensor-relative capture time
    pub timestamp: Duration,
}

impl<T> Timed<T> {
    /// Pair data with a timestamp.
    pub const fn new(data: T, timestamp: Duration) -> Self {
        Self { data, timestamp }
    }
}

/// Per-depth-pixel mapping into color and camera space.
#[derive(Debug, Clone, Copy)]
pub struct DepthMappingSamples<'a> {
    /// Color-space point for every depth pixel
    pub color_points: &'a [ColorSpacePoint],
    /// Camera-space point for every depth pixel
    pub camera_points: &'a [CameraSpacePoint],
}

/// One frame as delivered by the acquisition source.
///
/// Every channel is optional: a source may not produce all streams on every
/// callback. Sample counts must match the pool's sensor geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorFrame<'a> {
    /// Frame-level relative time
    pub relative_time: Duration,
    /// BGRA color pixels, 4 bytes each
    pub color: Option<Timed<&'a [u8]>>,
    /// Raw depth samples (millimeters)
    pub depth: Option<Timed<&'a [u16]>>,
    /// Raw infrared intensities
    pub infrared: Option<Timed<&'a [u16]>>,
    /// Body index per depth pixel (255 = no body)
    pub body_index: Option<Timed<&'a [u8]>>,
    /// Depth-to-color/camera mapping, timed with the depth frame
    pub depth_mapping: Option<Timed<DepthMappingSamples<'a>>>,
    /// Tracked bodies
    pub skeleton: Option<Timed<&'a SkeletonFrame>>,
}
