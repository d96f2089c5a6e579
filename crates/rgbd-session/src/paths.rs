//! Relative path scheme for saved items.
//!
//! Frame items live under one folder per item type:
//! `Depth/Shot_002_Frame_017.png` is the 17th frame of the second shot.
//! Shot and frame numbers are 1-based and zero-padded to three digits.

use rgbd_core::SavedItemType;
use rgbd_storage::{FrameWriter, PathGenerator};
use std::path::PathBuf;
use std::sync::Arc;

/// `Shot_NNN` for a 0-based shot index.
#[must_use]
pub fn shot_name(shot_index: usize) -> String {
    format!("Shot_{:03}", shot_index + 1)
}

/// Path of one frame item relative to the session root.
#[must_use]
pub fn frame_item_path(
    shot_index: usize,
    sequence: u64,
    item_type: SavedItemType,
    extension: &str,
) -> PathBuf {
    PathBuf::from(item_type.name()).join(format!(
        "{}_Frame_{:03}{extension}",
        shot_name(shot_index),
        sequence.saturating_add(1)
    ))
}

/// Path of a session-level item such as `Calibration.txt`.
#[must_use]
pub fn session_item_path(writer: &dyn FrameWriter) -> PathBuf {
    PathBuf::from(format!(
        "{}{}",
        writer.item_type().name(),
        writer.file_extension()
    ))
}

/// Path generator for a disk sink serializing shot `shot_index`.
#[must_use]
pub fn frame_path_generator(shot_index: usize) -> PathGenerator {
    Arc::new(move |sequence, writer: &dyn FrameWriter| {
        frame_item_path(
            shot_index,
            sequence,
            writer.item_type(),
            writer.file_extension(),
        )
    })
}
