//! Per-channel serializers.
//!
//! Every writer is bound to one channel of one [`FrameBuffer`] (or, for the
//! calibration writer, one record) and self-describes what it produces. The
//! worker pool asks [`writers_for`] for the enabled subset of a buffer and
//! calls [`FrameWriter::write`] once per writer against a freshly created file.

mod calibration;
mod mapping;
mod raster;
mod skeleton;

pub use self::calibration::CalibrationWriter;
pub use self::raster::{BodyIndexWriter, ColorWriter, DepthWriter, InfraredWriter};
pub use self::mapping::DepthMappingWriter;
pub use self::skeleton::SkeletonWriter;

use crate::error::StorageError;
use rgbd_core::{ChannelKind, SavedItemType, SerializationFlags};
use rgbd_pool::FrameBuffer;
use std::io::Write;
use std::time::Duration;

/// A serializer for one logical output item.
pub trait FrameWriter {
    /// Logical item type (also the output folder name).
    fn item_type(&self) -> SavedItemType;

    /// Recommended file extension, including the leading dot.
    fn file_extension(&self) -> &'static str;

    /// Sensor timestamp of the serialized data, if it has one.
    fn timestamp(&self) -> Option<Duration>;

    /// Encode the item onto `out`.
    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError>;
}

/// Encoder options shared by all writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSettings {
    /// JPEG quality for color frames (1-100)
    pub jpeg_quality: u8,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self { jpeg_quality: 90 }
    }
}

/// Writer for one channel of `frame`.
#[must_use]
pub fn writer_for<'a>(
    channel: ChannelKind,
    frame: &'a FrameBuffer,
    settings: WriterSettings,
) -> Box<dyn FrameWriter + 'a> {
    match channel {
        ChannelKind::Color => Box::new(ColorWriter::new(frame, settings.jpeg_quality)),
        ChannelKind::Depth => Box::new(DepthWriter::new(frame)),
        ChannelKind::Infrared => Box::new(InfraredWriter::new(frame)),
        ChannelKind::BodyIndex => Box::new(BodyIndexWriter::new(frame)),
        ChannelKind::DepthMapping => Box::new(DepthMappingWriter::new(frame)),
        ChannelKind::Skeleton => Box::new(SkeletonWriter::new(frame)),
    }
}

/// Writers for every channel that is both enabled and captured in `frame`.
///
/// A disabled channel never yields a writer, so it never produces a file.
#[must_use]
pub fn writers_for<'a>(
    frame: &'a FrameBuffer,
    flags: &SerializationFlags,
    settings: WriterSettings,
) -> Vec<Box<dyn FrameWriter + 'a>> {
    flags
        .enabled_channels()
        .filter(|&channel| frame.is_written(channel))
        .map(|channel| writer_for(channel, frame, settings))
        .collect()
}
