use super::FrameWriter;
use crate::error::StorageError;
use rgbd_core::{ChannelKind, SavedItemType};
use rgbd_pool::FrameBuffer;
use std::io::Write;
use std::time::Duration;

/// Tracked bodies as indented JSON.
pub struct SkeletonWriter<'a> {
    frame: &'a FrameBuffer,
}

impl<'a> SkeletonWriter<'a> {
    /// Bind to a frame.
    #[must_use]
    pub fn new(frame: &'a FrameBuffer) -> Self {
        Self { frame }
    }
}

impl FrameWriter for SkeletonWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::Skeleton
    }

    fn file_extension(&self) -> &'static str {
        ".json"
    }

    fn timestamp(&self) -> Option<Duration> {
        self.frame.channel_timestamp(ChannelKind::Skeleton)
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        let skeleton = self
            .frame
            .skeleton()
            .ok_or_else(|| StorageError::Encode("frame has no skeleton data".to_string()))?;
        serde_json::to_writer_pretty(&mut *out, skeleton)?;
        out.flush()?;
        Ok(())
    }
}
