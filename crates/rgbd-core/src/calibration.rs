//! Per-sensor calibration record written once per shot.

use crate::sensor::{CameraSpacePoint, ColorSpacePoint};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Position in the depth image, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthSpacePoint {
    /// Column
    pub x: f32,
    /// Row
    pub y: f32,
}

/// One depth pixel mapped into camera and color space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Pixel in depth space
    pub depth_point: DepthSpacePoint,
    /// Depth value at that pixel (millimeters)
    pub depth: u16,
    /// Corresponding camera-space point
    pub camera_point: CameraSpacePoint,
    /// Corresponding color-space point
    pub color_point: ColorSpacePoint,
}

/// Collection of depth-to-color/camera correspondences for one sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    points: Vec<CalibrationPoint>,
}

impl CalibrationRecord {
    /// Header line of the text format.
    pub const HEADER: &'static str = "#XYZ depth_xyd rgb_xy";

    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a correspondence.
    pub fn add_point(&mut self, point: CalibrationPoint) {
        self.points.push(point);
    }

    /// Recorded correspondences.
    #[must_use]
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Write the text form: a header, then one line per point with camera XYZ,
    /// depth pixel plus depth value, and color XY separated by three spaces.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", Self::HEADER)?;
        for p in &self.points {
            writeln!(
                out,
                "{} {} {}   {} {} {}   {} {}",
                p.camera_point.x,
                p.camera_point.y,
                p.camera_point.z,
                p.depth_point.x,
                p.depth_point.y,
                p.depth,
                p.color_point.x,
                p.color_point.y
            )?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_format() {
        let mut record = CalibrationRecord::new();
        record.add_point(CalibrationPoint {
            depth_point: DepthSpacePoint { x: 10.0, y: 20.0 },
            depth: 1500,
            camera_point: CameraSpacePoint {
                x: 0.5,
                y: -0.25,
                z: 1.5,
            },
            color_point: ColorSpacePoint { x: 100.5, y: 200.0 },
        });

        let mut out = Vec::new();
        record.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "#XYZ depth_xyd rgb_xy");
        assert_eq!(lines[1], "0.5 -0.25 1.5   10 20 1500   100.5 200");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_empty_record_has_header_only() {
        let mut out = Vec::new();
        CalibrationRecord::new().write_to(&mut out).unwrap();
        assert_eq!(out, b"#XYZ depth_xyd rgb_xy\n");
    }
}
