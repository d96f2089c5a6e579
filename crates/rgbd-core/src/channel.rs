//! Channel model and sensor geometry.
//!
//! Every image channel of a frame lives in a fixed-size byte region whose
//! length is `width * height * bytes_per_pixel` for the channel's resolution.
//! The geometry is fixed for the lifetime of a buffer pool.

use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One data stream captured per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// BGRA color image at color resolution
    Color,
    /// 16-bit depth image at depth resolution
    Depth,
    /// 16-bit infrared image at depth resolution
    Infrared,
    /// 8-bit body-index map at depth resolution
    BodyIndex,
    /// Depth-to-color/camera-space mapping at depth resolution
    DepthMapping,
    /// Tracked bodies (no pixel region)
    Skeleton,
}

impl ChannelKind {
    /// Channels backed by a fixed byte region, in capture order.
    pub const IMAGE_CHANNELS: [ChannelKind; 5] = [
        ChannelKind::Color,
        ChannelKind::Depth,
        ChannelKind::Infrared,
        ChannelKind::BodyIndex,
        ChannelKind::DepthMapping,
    ];

    /// Bytes per pixel of the channel's region, `None` for skeleton data.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            ChannelKind::Color => Some(4),
            ChannelKind::Depth | ChannelKind::Infrared => Some(2),
            ChannelKind::BodyIndex => Some(1),
            ChannelKind::DepthMapping => Some(16),
            ChannelKind::Skeleton => None,
        }
    }

    /// Saved-item type produced when this channel is serialized.
    #[must_use]
    pub const fn item_type(self) -> SavedItemType {
        match self {
            ChannelKind::Color => SavedItemType::Color,
            ChannelKind::Depth => SavedItemType::Depth,
            ChannelKind::Infrared => SavedItemType::Infrared,
            ChannelKind::BodyIndex => SavedItemType::BodyIndex,
            ChannelKind::DepthMapping => SavedItemType::DepthMapping,
            ChannelKind::Skeleton => SavedItemType::Skeleton,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.item_type(), f)
    }
}

/// Width and height of a sensor stream in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
}

impl Resolution {
    /// Create a resolution.
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Fixed resolutions of the color and depth streams.
///
/// Infrared, body-index and depth-mapping channels share the depth resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGeometry {
    /// Color stream resolution
    pub color: Resolution,
    /// Depth stream resolution
    pub depth: Resolution,
}

impl SensorGeometry {
    /// Kinect v2: 1920x1080 color, 512x424 depth.
    pub const KINECT_V2: SensorGeometry = SensorGeometry {
        color: Resolution::new(1920, 1080),
        depth: Resolution::new(512, 424),
    };

    /// Create a geometry from color and depth resolutions.
    #[must_use]
    pub const fn new(color: Resolution, depth: Resolution) -> Self {
        Self { color, depth }
    }

    /// Resolution of the given channel, `None` for skeleton data.
    #[must_use]
    pub const fn resolution(&self, channel: ChannelKind) -> Option<Resolution> {
        match channel {
            ChannelKind::Color => Some(self.color),
            ChannelKind::Skeleton => None,
            _ => Some(self.depth),
        }
    }

    /// Exact region length in bytes for a channel (0 for skeleton data).
    #[must_use]
    pub fn region_len(&self, channel: ChannelKind) -> usize {
        match (self.resolution(channel), channel.bytes_per_pixel()) {
            (Some(res), Some(bpp)) => res.pixel_count() * bpp,
            _ => 0,
        }
    }

    /// Total bytes allocated for one frame buffer.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        ChannelKind::IMAGE_CHANNELS
            .iter()
            .map(|&c| self.region_len(c))
            .sum()
    }

    /// True if either stream has a zero dimension.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.color.width == 0
            || self.color.height == 0
            || self.depth.width == 0
            || self.depth.height == 0
    }
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self::KINECT_V2
    }
}

/// Which channels a shot serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationFlags {
    /// Serialize color frames (JPEG)
    pub color: bool,
    /// Serialize depth frames (PNG)
    pub depth: bool,
    /// Serialize infrared frames (PNG)
    pub infrared: bool,
    /// Serialize tracked bodies (JSON)
    pub skeleton: bool,
    /// Serialize depth-to-color mapping (BLKD)
    pub depth_mapping: bool,
    /// Serialize body-index maps (PNG)
    pub body_index: bool,
}

impl Default for SerializationFlags {
    fn default() -> Self {
        Self {
            color: true,
            depth: true,
            infrared: true,
            skeleton: true,
            depth_mapping: false,
            body_index: false,
        }
    }
}

impl SerializationFlags {
    /// Every channel enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            color: true,
            depth: true,
            infrared: true,
            skeleton: true,
            depth_mapping: true,
            body_index: true,
        }
    }

    /// Every channel disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            color: false,
            depth: false,
            infrared: false,
            skeleton: false,
            depth_mapping: false,
            body_index: false,
        }
    }

    /// Whether a channel is enabled.
    #[must_use]
    pub const fn enables(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Color => self.color,
            ChannelKind::Depth => self.depth,
            ChannelKind::Infrared => self.infrared,
            ChannelKind::BodyIndex => self.body_index,
            ChannelKind::DepthMapping => self.depth_mapping,
            ChannelKind::Skeleton => self.skeleton,
        }
    }

    /// Enabled channels in capture order.
    pub fn enabled_channels(&self) -> impl Iterator<Item = ChannelKind> + '_ {
        ChannelKind::IMAGE_CHANNELS
            .into_iter()
            .chain(std::iter::once(ChannelKind::Skeleton))
            .filter(|&c| self.enables(c))
    }
}

/// Logical type of a file written for a shot.
///
/// The display name doubles as the output folder name and the value stored
/// in session metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SavedItemType {
    /// Per-shot calibration record
    Calibration,
    /// Color image
    Color,
    /// Depth image
    Depth,
    /// Depth-to-color mapping
    DepthMapping,
    /// Infrared image
    Infrared,
    /// Skeleton JSON
    Skeleton,
    /// Body-index image
    BodyIndex,
}

impl SavedItemType {
    /// All item types.
    pub const ALL: [SavedItemType; 7] = [
        SavedItemType::Calibration,
        SavedItemType::Color,
        SavedItemType::Depth,
        SavedItemType::DepthMapping,
        SavedItemType::Infrared,
        SavedItemType::Skeleton,
        SavedItemType::BodyIndex,
    ];

    /// Stable name used for folders and metadata.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SavedItemType::Calibration => "Calibration",
            SavedItemType::Color => "Color",
            SavedItemType::Depth => "Depth",
            SavedItemType::DepthMapping => "DepthMapping",
            SavedItemType::Infrared => "Infrared",
            SavedItemType::Skeleton => "Skeleton",
            SavedItemType::BodyIndex => "BodyIndex",
        }
    }
}

impl fmt::Display for SavedItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SavedItemType {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| CaptureError::UnknownItemType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinect_region_lengths() {
        let g = SensorGeometry::KINECT_V2;
        assert_eq!(g.region_len(ChannelKind::Color), 1920 * 1080 * 4);
        assert_eq!(g.region_len(ChannelKind::Depth), 512 * 424 * 2);
        assert_eq!(g.region_len(ChannelKind::Infrared), 512 * 424 * 2);
        assert_eq!(g.region_len(ChannelKind::BodyIndex), 512 * 424);
        assert_eq!(g.region_len(ChannelKind::DepthMapping), 512 * 424 * 16);
        assert_eq!(g.region_len(ChannelKind::Skeleton), 0);
    }

    #[test]
    fn test_default_flags_skip_mapping_and_body_index() {
        let flags = SerializationFlags::default();
        let enabled: Vec<_> = flags.enabled_channels().collect();
        assert_eq!(
            enabled,
            vec![
                ChannelKind::Color,
                ChannelKind::Depth,
                ChannelKind::Infrared,
                ChannelKind::Skeleton
            ]
        );
        assert_eq!(SerializationFlags::none().enabled_channels().count(), 0);
        assert_eq!(SerializationFlags::all().enabled_channels().count(), 6);
    }

    #[test]
    fn test_item_type_names_round_trip() {
        for t in SavedItemType::ALL {
            assert_eq!(t.name().parse::<SavedItemType>().unwrap(), t);
        }
        assert!(matches!(
            "Thermal".parse::<SavedItemType>(),
            Err(CaptureError::UnknownItemType(_))
        ));
    }

    #[test]
    fn test_item_type_serde_uses_name() {
        let json = serde_json::to_string(&SavedItemType::DepthMapping).unwrap();
        assert_eq!(json, "\"DepthMapping\"");
    }

    #[test]
    fn test_degenerate_geometry() {
        assert!(!SensorGeometry::KINECT_V2.is_degenerate());
        let g = SensorGeometry::new(Resolution::new(0, 4), Resolution::new(4, 4));
        assert!(g.is_degenerate());
    }
}
