//! Where serialized buffers go.
//!
//! Workers only know the [`FrameSink`] trait. [`DiskSink`] is the production
//! sink: one file per enabled channel at a caller-supplied relative path, each
//! recorded as a [`SavedItem`] for later metadata persistence.

use crate::error::StorageError;
use crate::writers::{writers_for, FrameWriter, WriterSettings};
use parking_lot::Mutex;
use rgbd_core::{SavedItemType, SerializationFlags};
use rgbd_pool::FrameBuffer;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serializes one pending buffer. Called concurrently from every worker.
pub trait FrameSink: Send + Sync {
    /// Persist `frame`. Errors are isolated to this buffer.
    fn serialize(&self, frame: &FrameBuffer) -> Result<(), StorageError>;

    /// Take the items written since the last call. Sinks that keep no
    /// record return nothing.
    fn take_saved_items(&self) -> Vec<SavedItem> {
        Vec::new()
    }
}

/// One file written for a shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    /// Logical type
    pub item_type: SavedItemType,
    /// Sensor timestamp of the data, if any
    pub timestamp: Option<Duration>,
    /// Path relative to the session root
    pub path: PathBuf,
}

/// Maps `(sequence, writer)` to a path relative to the sink root.
pub type PathGenerator = Arc<dyn Fn(u64, &dyn FrameWriter) -> PathBuf + Send + Sync>;

/// Write one item to `root/relative`, creating parent directories.
pub fn write_item(
    root: &Path,
    relative: &Path,
    writer: &dyn FrameWriter,
) -> Result<SavedItem, StorageError> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = BufWriter::new(File::create(&path)?);
    writer.write(&mut out)?;
    out.flush()?;

    debug!(path = ?path, item_type = %writer.item_type(), "Wrote item");
    Ok(SavedItem {
        item_type: writer.item_type(),
        timestamp: writer.timestamp(),
        path: relative.to_path_buf(),
    })
}

/// File-per-channel sink rooted at a session directory.
pub struct DiskSink {
    root: PathBuf,
    flags: SerializationFlags,
    settings: WriterSettings,
    path_for: PathGenerator,
    saved: Arc<Mutex<Vec<SavedItem>>>,
}

impl DiskSink {
    /// Sink writing the channels in `flags` under `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        flags: SerializationFlags,
        settings: WriterSettings,
        path_for: PathGenerator,
    ) -> Self {
        Self {
            root: root.into(),
            flags,
            settings,
            path_for,
            saved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the saved-item list.
    #[must_use]
    pub fn saved_items(&self) -> Arc<Mutex<Vec<SavedItem>>> {
        Arc::clone(&self.saved)
    }

    /// Session root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FrameSink for DiskSink {
    fn serialize(&self, frame: &FrameBuffer) -> Result<(), StorageError> {
        let sequence = frame
            .sequence()
            .ok_or_else(|| StorageError::Encode("buffer has no sequence index".to_string()))?;

        let mut first_error = None;
        for writer in writers_for(frame, &self.flags, self.settings) {
            let relative = (self.path_for)(sequence, writer.as_ref());
            match write_item(&self.root, &relative, writer.as_ref()) {
                Ok(item) => self.saved.lock().push(item),
                Err(e) => {
                    warn!(
                        sequence,
                        item_type = %writer.item_type(),
                        path = ?relative,
                        error = %e,
                        "Failed to write item"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn take_saved_items(&self) -> Vec<SavedItem> {
        std::mem::take(&mut *self.saved.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::test_support::{filled_frame, filled_job, tiny_geometry};
    use crate::writers::CalibrationWriter;
    use rgbd_core::CalibrationRecord;

    fn flat_paths() -> PathGenerator {
        Arc::new(|sequence, writer: &dyn FrameWriter| {
            PathBuf::from(writer.item_type().name())
                .join(format!("{sequence:05}{}", writer.file_extension()))
        })
    }

    #[test]
    fn test_disk_sink_writes_enabled_channels() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiskSink::new(
            dir.path(),
            SerializationFlags::default(),
            WriterSettings::default(),
            flat_paths(),
        );

        let pool = rgbd_pool::BufferPool::new(1, tiny_geometry()).unwrap();
        for _ in 0..4 {
            pool.release(filled_job(&pool));
        }
        let job = filled_job(&pool);
        assert_eq!(job.sequence(), Some(4));
        sink.serialize(&job).unwrap();

        let items = sink.take_saved_items();
        assert_eq!(items.len(), 4);
        for item in &items {
            assert!(dir.path().join(&item.path).is_file(), "{:?}", item.path);
        }
        assert!(dir.path().join("Depth/00004.png").is_file());
        assert!(!dir.path().join("DepthMapping").exists());
        assert!(!dir.path().join("BodyIndex").exists());
        assert!(sink.take_saved_items().is_empty());
    }

    #[test]
    fn test_unsequenced_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiskSink::new(
            dir.path(),
            SerializationFlags::all(),
            WriterSettings::default(),
            flat_paths(),
        );
        assert!(sink.serialize(&filled_frame()).is_err());
    }

    #[test]
    fn test_write_item_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let record = CalibrationRecord::new();
        let item = write_item(
            dir.path(),
            Path::new("nested/deeper/Calibration.txt"),
            &CalibrationWriter::new(&record),
        )
        .unwrap();

        assert_eq!(item.item_type, SavedItemType::Calibration);
        assert!(item.timestamp.is_none());
        let text = fs::read_to_string(dir.path().join(&item.path)).unwrap();
        assert!(text.starts_with("#XYZ"));
    }
}
