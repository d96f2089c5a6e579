//! Calibration record matching the mock sensor's projection.

use rgbd_core::{CalibrationPoint, CalibrationRecord, DepthSpacePoint, SensorGeometry};

use crate::projection::Projection;

/// Depth used for every sampled point, millimeters.
const CALIBRATION_DEPTH_MM: u16 = 2000;

/// Record with up to `points` correspondences sampled on an even grid over
/// the depth image.
#[must_use]
pub fn mock_calibration(geometry: SensorGeometry, points: usize) -> CalibrationRecord {
    let mut record = CalibrationRecord::new();
    if points == 0 || geometry.is_degenerate() {
        return record;
    }

    let projection = Projection::new(geometry);
    let side = (points as f64).sqrt().ceil() as usize;
    let (w, h) = (f32::from(geometry.depth.width), f32::from(geometry.depth.height));

    'grid: for row in 0..side {
        for col in 0..side {
            if record.points().len() == points {
                break 'grid;
            }
            let x = ((col as f32 + 0.5) * w / side as f32).floor();
            let y = ((row as f32 + 0.5) * h / side as f32).floor();
            let camera_point = projection.depth_to_camera(x, y, CALIBRATION_DEPTH_MM);
            record.add_point(CalibrationPoint {
                depth_point: DepthSpacePoint { x, y },
                depth: CALIBRATION_DEPTH_MM,
                camera_point,
                color_point: projection.camera_to_color(camera_point),
            });
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_count_and_range() {
        let record = mock_calibration(SensorGeometry::KINECT_V2, 10);
        assert_eq!(record.points().len(), 10);
        for p in record.points() {
            assert!(p.depth_point.x >= 0.0 && p.depth_point.x < 512.0);
            assert!(p.depth_point.y >= 0.0 && p.depth_point.y < 424.0);
            assert_eq!(p.camera_point.z, 2.0);
        }
    }

    #[test]
    fn test_zero_points() {
        assert!(mock_calibration(SensorGeometry::KINECT_V2, 0).points().is_empty());
    }

    #[test]
    fn test_text_form() {
        let record = mock_calibration(SensorGeometry::KINECT_V2, 4);
        let mut out = Vec::new();
        record.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.starts_with(CalibrationRecord::HEADER));
    }
}
