//! Mock RGB-D sensor.
//!
//! Produces every channel the capture pipeline understands without hardware:
//!
//! - [`MockSensor`] renders deterministic frames for a seed and frame number
//!   and drives a fixed-rate producer loop
//! - [`mock_calibration`] builds a calibration record from the same projection
//!   model the sensor uses for its depth mapping
//!
//! ```
//! use rgbd_core::{Resolution, SensorGeometry};
//! use rgbd_driver_mock::MockSensor;
//!
//! let geometry = SensorGeometry::new(Resolution::new(64, 48), Resolution::new(32, 24));
//! let mut sensor = MockSensor::new(geometry, 7);
//! let frame = sensor.render(0);
//! assert_eq!(frame.depth.unwrap().data.len(), 32 * 24);
//! ```

mod calibration;
mod pattern;
mod projection;
mod sensor;

pub use calibration::mock_calibration;
pub use pattern::{frame_rng, BodyDisc};
pub use projection::Projection;
pub use sensor::MockSensor;
