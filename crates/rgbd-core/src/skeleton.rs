//! Tracked-body payload carried alongside the image channels.
//!
//! The pipeline treats this as an opaque, serde-serializable value: the
//! acquisition source fills it, the skeleton writer dumps it as JSON.

use crate::sensor::CameraSpacePoint;
use serde::{Deserialize, Serialize};

/// Skeleton joints reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum JointType {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

impl JointType {
    /// Joints in sensor order.
    pub const ALL: [JointType; 25] = [
        JointType::SpineBase,
        JointType::SpineMid,
        JointType::Neck,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::SpineShoulder,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::HandTipRight,
        JointType::ThumbRight,
    ];
}

/// How confidently a joint was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    /// Not tracked
    NotTracked,
    /// Position inferred from neighbouring joints
    Inferred,
    /// Directly tracked
    Tracked,
}

/// One joint of a tracked body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Which joint this is
    pub joint_type: JointType,
    /// Tracking confidence
    pub tracking_state: TrackingState,
    /// Position in camera space (meters)
    pub position: CameraSpacePoint,
    /// Orientation quaternion `[x, y, z, w]`
    pub orientation: [f32; 4],
}

/// One body slot reported by the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Sensor-assigned tracking id
    pub tracking_id: u64,
    /// Whether the slot currently tracks a person
    pub is_tracked: bool,
    /// Bitmask of frame edges the body is clipped by
    pub clipped_edges: u8,
    /// Lean `[x, y]` in `-1.0..=1.0`
    pub lean: [f32; 2],
    /// Joints, empty when untracked
    pub joints: Vec<Joint>,
}

/// All bodies for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonFrame {
    /// Floor plane `[a, b, c, d]`
    pub floor_clip_plane: [f32; 4],
    /// Body slots
    pub bodies: Vec<Body>,
}

impl SkeletonFrame {
    /// Number of bodies currently tracked.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_tracked).count()
    }
}
