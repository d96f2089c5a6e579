use super::FrameWriter;
use crate::error::StorageError;
use rgbd_core::{CalibrationRecord, SavedItemType};
use std::io::Write;
use std::time::Duration;

/// Calibration record as text. Written once per shot, not per frame.
pub struct CalibrationWriter<'a> {
    record: &'a CalibrationRecord,
}

impl<'a> CalibrationWriter<'a> {
    /// Bind to a record.
    #[must_use]
    pub fn new(record: &'a CalibrationRecord) -> Self {
        Self { record }
    }
}

impl FrameWriter for CalibrationWriter<'_> {
    fn item_type(&self) -> SavedItemType {
        SavedItemType::Calibration
    }

    fn file_extension(&self) -> &'static str {
        ".txt"
    }

    fn timestamp(&self) -> Option<Duration> {
        None
    }

    fn write(&self, out: &mut dyn Write) -> Result<(), StorageError> {
        self.record.write_to(out)?;
        Ok(())
    }
}
