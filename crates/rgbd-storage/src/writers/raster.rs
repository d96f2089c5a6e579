//! Image-channel writers: JPEG for color, PNG for the depth-resolution channels.

use super::FrameWriter;
use crate::error::StorageError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageBuffer, Luma};
use rgbd_core::{ChannelKind, SavedItemType};
use rgbd_pool::FrameBuffer;
use std::io::Write;
use std::time::Duration;

fn dimensions(frame: &FrameBuffer, channel: ChannelKind) -> Result<(u32, u32), StorageError> {
    frame
        .geometry()
        .resolution(channel)
        .map(|r| (u32::from(r.width), u32::from(r.height)))
        .ok_or_else(|| StorageError::Encode(format!("{channel} has no image resolution")))
}

/// Encode a region of little-endian u16 samples as a 16-bit grayscale PNG.
fn write_gray16(
    frame: &FrameBuffer,
    channel: ChannelKind,
    out: &mut dyn Write,
) -> Result<(), StorageError> {
    let (width, height) = dimensions(frame, channel)?;
    let samples: Vec<u16> = frame
        .region(channel)
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();

    let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(width, height, samples)
        .ok_or_else(|| {
            StorageError::Encode(format!("{channel} region does not fill {width}x{height}"))
        })?;
    img.write_with_encoder(PngEncoder::new(out))?;
    Ok(())
}

/// Color frame as JPEG (BGRA converted to RGB).
pub struct ColorWriter<'a> {
    frame: &'a FrameBuffer,
    quality: u8,
}

impl<'a> ColorWriter<'a> {
    /// Bind to a frame with the given JPEG quality.
    #[must_use]
    pub fn new(frame: &'a FrameBuffer, quality: u8) -> Self {
        Self { frame, quality }
    }
}

impl FrameWriter for ColorWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::Color
    }

    fn file_extension(&self) -> &'static str {
        ".jpg"
    }

    fn timestamp(&self) -> Option<Duration> {
        self.frame.channel_timestamp(ChannelKind::Color)
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        let (width, height) = dimensions(self.frame, ChannelKind::Color)?;
        let rgb: Vec<u8> = self
            .frame
            .region(ChannelKind::Color)
            .chunks_exact(4)
            .flat_map(|bgra| [bgra[2], bgra[1], bgra[0]])
            .collect();

        let mut encoder = JpegEncoder::new_with_quality(out, self.quality);
        encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?;
        Ok(())
    }
}

/// Depth frame as 16-bit PNG (samples pre-shifted at capture for previewing).
pub struct DepthWriter<'a> {
    frame: &'a FrameBuffer,
}

impl<'a> DepthWriter<'a> {
    /// Bind to a frame.
    #[must_use]
    pub fn new(frame: &'a FrameBuffer) -> Self {
        Self { frame }
    }
}

impl FrameWriter for DepthWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::Depth
    }

    fn file_extension(&self) -> &'static str {
        ".png"
    }

    fn timestamp(&self) -> Option<Duration> {
        self.frame.channel_timestamp(ChannelKind::Depth)
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        write_gray16(self.frame, ChannelKind::Depth, out)
    }
}

/// Infrared frame as 16-bit PNG.
pub struct InfraredWriter<'a> {
    frame: &'a FrameBuffer,
}

impl<'a> InfraredWriter<'a> {
    /// Bind to a frame.
    #[must_use]
    pub fn new(frame: &'a FrameBuffer) -> Self {
        Self { frame }
    }
}

impl FrameWriter for InfraredWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::Infrared
    }

    fn file_extension(&self) -> &'static str {
        ".png"
    }

    fn timestamp(&self) -> Option<Duration> {
        self.frame.channel_timestamp(ChannelKind::Infrared)
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        write_gray16(self.frame, ChannelKind::Infrared, out)
    }
}

/// Body-index map as 8-bit PNG.
pub struct BodyIndexWriter<'a> {
    frame: &'a FrameBuffer,
}

impl<'a> BodyIndexWriter<'a> {
    /// Bind to a frame.
    #[must_use]
    pub fn new(frame: &'a FrameBuffer) -> Self {
        Self { frame }
    }
}

impl FrameWriter for BodyIndexWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::BodyIndex
    }

    fn file_extension(&self) -> &'static str {
        ".png"
    }

    fn timestamp(&self) -> Option<Duration> {
        self.frame.channel_timestamp(ChannelKind::BodyIndex)
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        let (width, height) = dimensions(self.frame, ChannelKind::BodyIndex)?;
        let img: ImageBuffer<Luma<u8>, &[u8]> =
            ImageBuffer::from_raw(width, height, self.frame.region(ChannelKind::BodyIndex))
                .ok_or_else(|| {
                    StorageError::Encode(format!(
                        "BodyIndex region does not fill {width}x{height}"
                    ))
                })?;
        img.write_with_encoder(PngEncoder::new(out))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::filled_frame;
    use super::*;
    use image::ImageFormat;

    fn encode(writer: &dyn FrameWriter) -> Vec<u8> {
        let mut out = Vec::new();
        writer.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_depth_png_round_trip() {
        let frame = filled_frame();
        let bytes = encode(&DepthWriter::new(&frame));

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .into_luma16();
        assert_eq!(decoded.dimensions(), (3, 2));

        let region = frame.region(ChannelKind::Depth);
        let first = u16::from_le_bytes([region[0], region[1]]);
        assert_eq!(decoded.get_pixel(0, 0).0[0], first);
    }

    #[test]
    fn test_body_index_png_is_8bit() {
        let frame = filled_frame();
        let bytes = encode(&BodyIndexWriter::new(&frame));
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!(
            decoded.into_luma8().into_raw(),
            frame.region(ChannelKind::BodyIndex)
        );
    }

    #[test]
    fn test_color_jpeg_has_color_dimensions() {
        let frame = filled_frame();
        let bytes = encode(&ColorWriter::new(&frame, 95));
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }
}
