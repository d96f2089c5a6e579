//! Channel capture: sensor samples into a frame buffer's fixed regions.
//!
//! Each channel is captured independently and validated twice: the
//! destination region and the source sample count must both match
//! `width * height * bytes_per_pixel` for the channel. A mismatch means the
//! pool and the sensor disagree on geometry and fails the frame.

use rgbd_core::{
    CameraSpacePoint, CaptureError, CaptureResult, ChannelKind, ColorSpacePoint,
    DepthMappingSamples, SensorFrame, SensorGeometry, SerializationFlags, SkeletonFrame, Timed,
};
use rgbd_pool::FrameBuffer;

/// Left shift applied to depth samples so 16-bit previews are not black.
pub const DEPTH_PREVIEW_SHIFT: u32 = 3;

/// Fills frame buffers from [`SensorFrame`]s for one sensor geometry.
#[derive(Debug, Clone, Copy)]
pub struct ChannelCapture {
    geometry: SensorGeometry,
}

impl ChannelCapture {
    /// Capture adapter for `geometry`.
    #[must_use]
    pub fn new(geometry: SensorGeometry) -> Self {
        Self { geometry }
    }

    /// Geometry frames are validated against.
    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    /// Capture every channel enabled in `flags`.
    ///
    /// Disabled channels are skipped and stay unwritten. An enabled channel
    /// absent from `sensor` fails with [`CaptureError::ChannelMissing`].
    pub fn capture(
        &self,
        frame: &mut FrameBuffer,
        sensor: &SensorFrame<'_>,
        flags: &SerializationFlags,
    ) -> CaptureResult<()> {
        for channel in flags.enabled_channels() {
            match channel {
                ChannelKind::Color => {
                    let samples = sensor.color.ok_or(CaptureError::ChannelMissing(channel))?;
                    self.capture_color(frame, samples)?;
                }
                ChannelKind::Depth => {
                    let samples = sensor.depth.ok_or(CaptureError::ChannelMissing(channel))?;
                    self.capture_depth(frame, samples)?;
                }
                ChannelKind::Infrared => {
                    let samples = sensor
                        .infrared
                        .ok_or(CaptureError::ChannelMissing(channel))?;
                    self.capture_infrared(frame, samples)?;
                }
                ChannelKind::BodyIndex => {
                    let samples = sensor
                        .body_index
                        .ok_or(CaptureError::ChannelMissing(channel))?;
                    self.capture_body_index(frame, samples)?;
                }
                ChannelKind::DepthMapping => {
                    let samples = sensor
                        .depth_mapping
                        .ok_or(CaptureError::ChannelMissing(channel))?;
                    self.capture_depth_mapping(frame, samples)?;
                }
                ChannelKind::Skeleton => {
                    let samples = sensor
                        .skeleton
                        .ok_or(CaptureError::ChannelMissing(channel))?;
                    self.capture_skeleton(frame, samples);
                }
            }
        }
        Ok(())
    }

    /// Copy BGRA pixels.
    pub fn capture_color(&self, frame: &mut FrameBuffer, samples: Timed<&[u8]>) -> CaptureResult<()> {
        let region = self.checked_region(frame, ChannelKind::Color, samples.data.len())?;
        region.copy_from_slice(samples.data);
        frame.mark_written(ChannelKind::Color, samples.timestamp);
        Ok(())
    }

    /// Copy depth samples shifted by [`DEPTH_PREVIEW_SHIFT`], little-endian.
    pub fn capture_depth(&self, frame: &mut FrameBuffer, samples: Timed<&[u16]>) -> CaptureResult<()> {
        let region = self.checked_region(frame, ChannelKind::Depth, samples.data.len() * 2)?;
        for (dst, &sample) in region.chunks_exact_mut(2).zip(samples.data) {
            dst.copy_from_slice(&(sample << DEPTH_PREVIEW_SHIFT).to_le_bytes());
        }
        frame.mark_written(ChannelKind::Depth, samples.timestamp);
        Ok(())
    }

    /// Copy infrared intensities, little-endian.
    pub fn capture_infrared(
        &self,
        frame: &mut FrameBuffer,
        samples: Timed<&[u16]>,
    ) -> CaptureResult<()> {
        let region = self.checked_region(frame, ChannelKind::Infrared, samples.data.len() * 2)?;
        for (dst, &sample) in region.chunks_exact_mut(2).zip(samples.data) {
            dst.copy_from_slice(&sample.to_le_bytes());
        }
        frame.mark_written(ChannelKind::Infrared, samples.timestamp);
        Ok(())
    }

    /// Copy body-index bytes.
    pub fn capture_body_index(
        &self,
        frame: &mut FrameBuffer,
        samples: Timed<&[u8]>,
    ) -> CaptureResult<()> {
        let region = self.checked_region(frame, ChannelKind::BodyIndex, samples.data.len())?;
        region.copy_from_slice(samples.data);
        frame.mark_written(ChannelKind::BodyIndex, samples.timestamp);
        Ok(())
    }

    /// Pack the depth-to-color/camera mapping, 16 bytes per depth pixel.
    ///
    /// Per pixel: color X and Y as `i16` (rounded half up, both `-1` when the
    /// point falls outside the color frame or is not finite), then camera
    /// X, Y, Z as `f32`, all little-endian.
    pub fn capture_depth_mapping(
        &self,
        frame: &mut FrameBuffer,
        samples: Timed<DepthMappingSamples<'_>>,
    ) -> CaptureResult<()> {
        let DepthMappingSamples {
            color_points,
            camera_points,
        } = samples.data;

        let pixels = self.geometry.depth.pixel_count();
        let bpp = ChannelKind::DepthMapping.bytes_per_pixel().unwrap_or(16);
        if camera_points.len() != color_points.len() {
            return Err(CaptureError::ChannelSizeMismatch {
                channel: ChannelKind::DepthMapping,
                expected: color_points.len() * bpp,
                actual: camera_points.len() * bpp,
            });
        }

        let color = self.geometry.color;
        let region = self.checked_region(frame, ChannelKind::DepthMapping, color_points.len() * bpp)?;
        debug_assert_eq!(region.len(), pixels * bpp);

        for ((dst, color_point), camera_point) in region
            .chunks_exact_mut(bpp)
            .zip(color_points)
            .zip(camera_points)
        {
            let (x, y) = map_to_color_pixel(*color_point, color.width, color.height);
            encode_mapping(dst, x, y, *camera_point);
        }

        frame.mark_written(ChannelKind::DepthMapping, samples.timestamp);
        Ok(())
    }

    /// Store tracked bodies.
    pub fn capture_skeleton(&self, frame: &mut FrameBuffer, samples: Timed<&SkeletonFrame>) {
        frame.set_skeleton(samples.data.clone(), samples.timestamp);
    }

    fn checked_region<'f>(
        &self,
        frame: &'f mut FrameBuffer,
        channel: ChannelKind,
        source_len: usize,
    ) -> CaptureResult<&'f mut [u8]> {
        let expected = self.geometry.region_len(channel);
        let region = frame.region_mut(channel);
        if region.len() != expected {
            return Err(CaptureError::ChannelSizeMismatch {
                channel,
                expected,
                actual: region.len(),
            });
        }
        if source_len != expected {
            return Err(CaptureError::ChannelSizeMismatch {
                channel,
                expected,
                actual: source_len,
            });
        }
        Ok(region)
    }
}

/// Round a color-space point to a pixel, or `(-1, -1)` if it has none.
fn map_to_color_pixel(point: ColorSpacePoint, width: u16, height: u16) -> (i16, i16) {
    let x = (point.x + 0.5).floor();
    let y = (point.y + 0.5).floor();
    if !(x >= 0.0 && x < f32::from(width) && y >= 0.0 && y < f32::from(height)) {
        return (-1, -1);
    }
    // Columns past i16::MAX have no encoding either
    match (i16::try_from(x as i32), i16::try_from(y as i32)) {
        (Ok(x), Ok(y)) => (x, y),
        _ => (-1, -1),
    }
}

fn encode_mapping(dst: &mut [u8], x: i16, y: i16, camera: CameraSpacePoint) {
    dst[0..2].copy_from_slice(&x.to_le_bytes());
    dst[2..4].copy_from_slice(&y.to_le_bytes());
    dst[4..8].copy_from_slice(&camera.x.to_le_bytes());
    dst[8..12].copy_from_slice(&camera.y.to_le_bytes());
    dst[12..16].copy_from_slice(&camera.z.to_le_bytes());
}
