use super::FrameWriter;
use crate::blkd::BlkdHeader;
use crate::error::StorageError;
use rgbd_core::{ChannelKind, SavedItemType};
use rgbd_pool::FrameBuffer;
use std::io::Write;
use std::time::Duration;

/// Depth-to-color/camera mapping as a version 2 BLKD raster at depth
/// resolution, 16 bytes per pixel.
pub struct DepthMappingWriter<'a> {
    frame: &'a FrameBuffer,
}

impl<'a> DepthMappingWriter<'a> {
    /// Bind to a frame.
    #[must_use]
    pub fn new(frame: &'a FrameBuffer) -> Self {
        Self { frame }
    }
}

impl FrameWriter for DepthMappingWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::DepthMapping
    }

    fn file_extension(&self) -> &'static str {
        ".blkd"
    }

    fn timestamp(&self) -> Option<Duration> {
        self.frame.channel_timestamp(ChannelKind::DepthMapping)
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        let depth = self.frame.geometry().depth;
        let bpp = ChannelKind::DepthMapping.bytes_per_pixel().unwrap_or(16) as u8;
        BlkdHeader::new(depth.width, depth.height, bpp)
            .write_with(out, self.frame.region(ChannelKind::DepthMapping))?;
        Ok(())
    }
}
