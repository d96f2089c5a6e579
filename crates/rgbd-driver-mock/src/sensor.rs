//! Mock sensor: frame rendering and the fixed-rate producer loop.

use rgbd_core::{
    Body, CameraSpacePoint, ColorSpacePoint, DepthMappingSamples, Joint, JointType, SensorFrame,
    SensorGeometry, SkeletonFrame, Timed, TrackingState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::pattern::{
    fill_body_index, fill_color, fill_depth, fill_infrared, frame_rng, BodyDisc, BODY_MM,
};
use crate::projection::Projection;

/// Body slots reported per frame, as on a Kinect v2.
const BODY_SLOTS: usize = 6;
/// Vertical spacing between consecutive joints of the mock body, meters.
const JOINT_SPACING_M: f32 = 0.06;

/// Deterministic sensor with owned sample buffers.
///
/// [`render`](Self::render) overwrites the buffers for a frame number and
/// returns a [`SensorFrame`] borrowing them, so a frame is valid until the
/// next render.
pub struct MockSensor {
    geometry: SensorGeometry,
    seed: u64,
    projection: Projection,
    color: Vec<u8>,
    depth: Vec<u16>,
    infrared: Vec<u16>,
    body_index: Vec<u8>,
    color_points: Vec<ColorSpacePoint>,
    camera_points: Vec<CameraSpacePoint>,
    skeleton: SkeletonFrame,
    relative_time: Duration,
}

impl MockSensor {
    /// Sensor producing `geometry`-sized frames; equal seeds render equal frames.
    #[must_use]
    pub fn new(geometry: SensorGeometry, seed: u64) -> Self {
        let color_px = geometry.color.pixel_count();
        let depth_px = geometry.depth.pixel_count();
        Self {
            geometry,
            seed,
            projection: Projection::new(geometry),
            color: vec![0; color_px * 4],
            depth: vec![0; depth_px],
            infrared: vec![0; depth_px],
            body_index: vec![0; depth_px],
            color_points: vec![ColorSpacePoint::default(); depth_px],
            camera_points: vec![CameraSpacePoint::default(); depth_px],
            skeleton: SkeletonFrame::default(),
            relative_time: Duration::ZERO,
        }
    }

    /// Geometry of rendered frames.
    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    /// Projection used for the depth mapping.
    #[must_use]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Render frame `frame_number`, timestamped at 30 Hz.
    pub fn render(&mut self, frame_number: u64) -> SensorFrame<'_> {
        self.render_at(frame_number, Duration::from_nanos(frame_number * 33_333_333))
    }

    /// Render frame `frame_number` with an explicit relative time.
    pub fn render_at(&mut self, frame_number: u64, relative_time: Duration) -> SensorFrame<'_> {
        let depth_res = self.geometry.depth;
        let color_res = self.geometry.color;
        let disc = BodyDisc::at(depth_res.width, depth_res.height, frame_number);
        let mut rng = frame_rng(self.seed, frame_number);

        fill_depth(&mut self.depth, depth_res.width, &disc, &mut rng);
        fill_infrared(&mut self.infrared, &self.depth, &mut rng);
        fill_body_index(&mut self.body_index, depth_res.width, &disc);
        fill_color(&mut self.color, color_res.width, color_res.height, frame_number);
        self.map_depth();
        self.skeleton = self.mock_skeleton(&disc, frame_number);
        self.relative_time = relative_time;

        self.frame()
    }

    /// The most recently rendered frame.
    #[must_use]
    pub fn frame(&self) -> SensorFrame<'_> {
        let t = self.relative_time;
        SensorFrame {
            relative_time: t,
            color: Some(Timed::new(&self.color, t)),
            depth: Some(Timed::new(&self.depth, t)),
            infrared: Some(Timed::new(&self.infrared, t)),
            body_index: Some(Timed::new(&self.body_index, t)),
            depth_mapping: Some(Timed::new(
                DepthMappingSamples {
                    color_points: &self.color_points,
                    camera_points: &self.camera_points,
                },
                t,
            )),
            skeleton: Some(Timed::new(&self.skeleton, t)),
        }
    }

    /// Deliver `frames` frames (0 = until `stop`) at `frame_rate_hz` on the
    /// calling thread.
    ///
    /// Frames are scheduled against absolute deadlines so a slow callback
    /// does not shift later frames. Returns the number delivered.
    pub fn run<F>(
        &mut self,
        frame_rate_hz: f64,
        frames: u64,
        stop: Option<&AtomicBool>,
        mut callback: F,
    ) -> u64
    where
        F: FnMut(&SensorFrame<'_>),
    {
        let interval = if frame_rate_hz.is_finite() && frame_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / frame_rate_hz)
        } else {
            Duration::ZERO
        };
        info!(frame_rate_hz, frames, "Mock sensor streaming");

        let start = Instant::now();
        let mut delivered = 0u64;
        while frames == 0 || delivered < frames {
            if stop.is_some_and(|s| s.load(Ordering::Acquire)) {
                debug!(delivered, "Mock sensor stopped");
                break;
            }

            let deadline = start + interval.mul_f64(delivered as f64);
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }

            let frame = self.render_at(delivered, start.elapsed());
            callback(&frame);
            delivered += 1;
        }
        delivered
    }

    fn map_depth(&mut self) {
        let w = usize::from(self.geometry.depth.width).max(1);
        for (i, &d) in self.depth.iter().enumerate() {
            let camera = self
                .projection
                .depth_to_camera((i % w) as f32, (i / w) as f32, d);
            self.camera_points[i] = camera;
            self.color_points[i] = self.projection.camera_to_color(camera);
        }
    }

    fn mock_skeleton(&self, disc: &BodyDisc, frame_number: u64) -> SkeletonFrame {
        let center = self.projection.depth_to_camera(disc.cx, disc.cy, BODY_MM);
        let top = JOINT_SPACING_M * (JointType::ALL.len() as f32) / 2.0;
        let joints = JointType::ALL
            .iter()
            .enumerate()
            .map(|(i, &joint_type)| Joint {
                joint_type,
                tracking_state: TrackingState::Tracked,
                position: CameraSpacePoint {
                    x: center.x,
                    y: center.y + top - JOINT_SPACING_M * i as f32,
                    z: center.z,
                },
                orientation: [0.0, 0.0, 0.0, 1.0],
            })
            .collect();

        let mut bodies = Vec::with_capacity(BODY_SLOTS);
        bodies.push(Body {
            tracking_id: 72_057_594_037_928_000 + self.seed,
            is_tracked: true,
            clipped_edges: 0,
            lean: [((frame_number as f32) * 0.05).sin() * 0.2, 0.0],
            joints,
        });
        bodies.extend((1..BODY_SLOTS).map(|_| Body {
            tracking_id: 0,
            is_tracked: false,
            clipped_edges: 0,
            lean: [0.0, 0.0],
            joints: Vec::new(),
        }));

        SkeletonFrame {
            floor_clip_plane: [0.0, 1.0, 0.0, 0.8],
            bodies,
        }
    }
}

impl std::fmt::Debug for MockSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSensor")
            .field("geometry", &self.geometry)
            .field("seed", &self.seed)
            .field("relative_time", &self.relative_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgbd_core::{ChannelKind, Resolution};

    fn geometry() -> SensorGeometry {
        SensorGeometry::new(Resolution::new(64, 48), Resolution::new(32, 24))
    }

    #[test]
    fn test_frame_sizes_match_geometry() {
        let g = geometry();
        let mut sensor = MockSensor::new(g, 1);
        let frame = sensor.render(0);
        assert_eq!(frame.color.unwrap().data.len(), g.region_len(ChannelKind::Color));
        assert_eq!(frame.depth.unwrap().data.len(), g.depth.pixel_count());
        assert_eq!(frame.infrared.unwrap().data.len(), g.depth.pixel_count());
        assert_eq!(frame.body_index.unwrap().data.len(), g.depth.pixel_count());
        let mapping = frame.depth_mapping.unwrap().data;
        assert_eq!(mapping.color_points.len(), g.depth.pixel_count());
        assert_eq!(mapping.camera_points.len(), g.depth.pixel_count());
        assert_eq!(frame.skeleton.unwrap().data.tracked_count(), 1);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut a = MockSensor::new(geometry(), 42);
        let mut b = MockSensor::new(geometry(), 42);
        a.render(5);
        let depth_a = a.frame().depth.unwrap().data.to_vec();
        b.render(2);
        b.render(5);
        assert_eq!(b.frame().depth.unwrap().data, depth_a.as_slice());
    }

    #[test]
    fn test_border_pixels_are_unmapped() {
        let mut sensor = MockSensor::new(geometry(), 3);
        let frame = sensor.render(0);
        let mapping = frame.depth_mapping.unwrap().data;
        assert!(mapping.camera_points[0].z.is_infinite());
        assert!(mapping.color_points[0].x.is_infinite());
    }

    #[test]
    fn test_run_delivers_requested_frames() {
        let mut sensor = MockSensor::new(geometry(), 0);
        let mut seen = Vec::new();
        let delivered = sensor.run(1000.0, 5, None, |frame| seen.push(frame.relative_time));
        assert_eq!(delivered, 5);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_run_honours_stop_flag() {
        let mut sensor = MockSensor::new(geometry(), 0);
        let stop = AtomicBool::new(false);
        let mut count = 0;
        let delivered = sensor.run(0.0, 0, Some(&stop), |_| {
            count += 1;
            if count == 3 {
                stop.store(true, Ordering::Release);
            }
        });
        assert_eq!(delivered, 3);
    }
}
