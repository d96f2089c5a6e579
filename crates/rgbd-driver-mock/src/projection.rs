//! Pinhole model shared by the depth mapping and the calibration record.

use rgbd_core::{CameraSpacePoint, ColorSpacePoint, SensorGeometry};

/// Depth focal length as a fraction of depth width (365 px at 512).
const DEPTH_FOCAL_RATIO: f32 = 0.714;
/// Color focal length as a fraction of color width (1081 px at 1920).
const COLOR_FOCAL_RATIO: f32 = 0.563;
/// Horizontal offset between the depth and color cameras, meters.
const BASELINE_M: f32 = 0.052;

/// Depth-to-camera and camera-to-color projection for one geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    depth_focal: f32,
    depth_center: (f32, f32),
    color_focal: f32,
    color_center: (f32, f32),
}

impl Projection {
    /// Projection scaled to `geometry`.
    #[must_use]
    pub fn new(geometry: SensorGeometry) -> Self {
        let d = geometry.depth;
        let c = geometry.color;
        Self {
            depth_focal: f32::from(d.width) * DEPTH_FOCAL_RATIO,
            depth_center: (f32::from(d.width) / 2.0, f32::from(d.height) / 2.0),
            color_focal: f32::from(c.width) * COLOR_FOCAL_RATIO,
            color_center: (f32::from(c.width) / 2.0, f32::from(c.height) / 2.0),
        }
    }

    /// Back-project a depth pixel. Zero depth has no camera point (all `-inf`).
    #[must_use]
    pub fn depth_to_camera(&self, x: f32, y: f32, depth_mm: u16) -> CameraSpacePoint {
        if depth_mm == 0 {
            return CameraSpacePoint {
                x: f32::NEG_INFINITY,
                y: f32::NEG_INFINITY,
                z: f32::NEG_INFINITY,
            };
        }
        let z = f32::from(depth_mm) / 1000.0;
        CameraSpacePoint {
            x: (x - self.depth_center.0) * z / self.depth_focal,
            y: (self.depth_center.1 - y) * z / self.depth_focal,
            z,
        }
    }

    /// Project a camera point into the color image.
    #[must_use]
    pub fn camera_to_color(&self, p: CameraSpacePoint) -> ColorSpacePoint {
        if !(p.z.is_finite() && p.z > 0.0) {
            return ColorSpacePoint {
                x: f32::NEG_INFINITY,
                y: f32::NEG_INFINITY,
            };
        }
        ColorSpacePoint {
            x: self.color_center.0 + self.color_focal * (p.x + BASELINE_M) / p.z,
            y: self.color_center.1 - self.color_focal * p.y / p.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_pixel_is_on_axis() {
        let projection = Projection::new(SensorGeometry::KINECT_V2);
        let p = projection.depth_to_camera(256.0, 212.0, 2000);
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 0.0);
        assert_eq!(p.z, 2.0);

        let c = projection.camera_to_color(p);
        assert!(c.x > 960.0, "baseline shifts right");
        assert_eq!(c.y, 540.0);
    }

    #[test]
    fn test_zero_depth_is_unmapped() {
        let projection = Projection::new(SensorGeometry::KINECT_V2);
        let p = projection.depth_to_camera(10.0, 10.0, 0);
        assert!(p.z.is_infinite());
        assert!(projection.camera_to_color(p).x.is_infinite());
    }
}
