//! Runs the shots of a session against one buffer pool.
//!
//! The pool is allocated once, at the largest buffer count of any shot, and
//! resized per shot by [`ShotRecorder::start`]. A shot's files are only
//! recorded in the session after its drain barrier completed, so metadata
//! never references a file still being written.

use parking_lot::Mutex;
use rgbd_core::{
    CalibrationRecord, CaptureConfig, CaptureError, CaptureResult, SensorGeometry,
};
use rgbd_pool::BufferPool;
use rgbd_storage::writers::CalibrationWriter;
use rgbd_storage::{sink::write_item, DiskSink, FrameSink, WriterSettings};
use std::fs;
use std::io;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::paths::{frame_path_generator, session_item_path};
use crate::recorder::{RecorderSettings, ShotRecorder, ShotReport};
use crate::session::Session;

/// Everything a session needs besides its shots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Worker and barrier settings
    pub recorder: RecorderSettings,
    /// Encoder settings
    pub writer: WriterSettings,
}

impl SessionSettings {
    /// Settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            recorder: RecorderSettings::from_storage_config(&config.storage),
            writer: WriterSettings {
                jpeg_quality: config.storage.jpeg_quality,
            },
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

/// Owns a [`Session`] and the pool its shots are captured into.
#[derive(Debug)]
pub struct SessionManager {
    session: Session,
    pool: BufferPool,
    settings: SessionSettings,
    calibration: Option<CalibrationRecord>,
    active: Mutex<Option<usize>>,
}

impl SessionManager {
    /// Allocate the pool for `session`.
    pub fn new(session: Session, settings: SessionSettings) -> CaptureResult<Self> {
        let pool = BufferPool::new(session.maximum_buffer_count(), session.geometry())?;
        info!(
            root = ?session.root(),
            shots = session.shots().len(),
            pool_size = pool.capacity(),
            "Session ready"
        );
        Ok(Self {
            session,
            pool,
            settings,
            calibration: None,
            active: Mutex::new(None),
        })
    }

    /// The managed session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The shared buffer pool.
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Geometry of every buffer.
    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.pool.geometry()
    }

    /// Calibration written with every subsequently completed shot.
    pub fn set_calibration(&mut self, record: CalibrationRecord) {
        self.calibration = Some(record);
    }

    /// Start recording shot `index`, or the next incomplete shot if `None`.
    ///
    /// Only one shot may be recording at a time.
    #[instrument(skip(self), err)]
    pub fn begin_shot(&self, index: Option<usize>) -> CaptureResult<ShotRecorder> {
        let mut active = self.active.lock();
        if let Some(current) = *active {
            return Err(CaptureError::ShotState(format!(
                "shot {current} is still recording"
            )));
        }

        let index = match index {
            Some(i) => i,
            None => self
                .session
                .next_incomplete()
                .ok_or_else(|| CaptureError::ShotState("every shot is completed".to_string()))?,
        };
        let shot = self.session.shot(index)?;
        if shot.completed {
            return Err(CaptureError::ShotState(format!(
                "shot {index} is already completed"
            )));
        }

        let sink: Arc<dyn FrameSink> = Arc::new(DiskSink::new(
            self.session.root(),
            shot.definition.channels,
            self.settings.writer,
            frame_path_generator(index),
        ));
        let recorder = ShotRecorder::start(
            index,
            shot.definition,
            self.pool.clone(),
            sink,
            self.settings.recorder,
        )?;
        *active = Some(index);
        Ok(recorder)
    }

    /// Drain `recorder`, record its items and persist metadata.
    ///
    /// The calibration record, if set, is written first and listed as the
    /// shot's first item. The shot is marked completed even if individual
    /// buffers failed; the report says which.
    #[instrument(skip(self, recorder), fields(shot = recorder.shot_index()), err)]
    pub fn complete_shot(&mut self, recorder: ShotRecorder) -> CaptureResult<ShotReport> {
        let index = recorder.shot_index();
        let finished = recorder.finish();
        *self.active.lock() = None;
        let report = finished?;

        let mut items = Vec::with_capacity(report.saved_items.len() + 1);
        if let Some(record) = &self.calibration {
            let writer = CalibrationWriter::new(record);
            items.push(write_item(
                self.session.root(),
                &session_item_path(&writer),
                &writer,
            )?);
        }
        items.extend(report.saved_items.iter().cloned());

        let shot = self.session.shot_mut(index)?;
        shot.saved_items.extend(items);
        shot.completed = true;
        if report.failed > 0 {
            warn!(shot = index, failed = report.failed, "Shot completed with failed buffers");
        }

        self.session.write_metadata()?;
        Ok(report)
    }

    /// Drain `recorder` and discard everything it wrote.
    pub fn abort_shot(&mut self, recorder: ShotRecorder) -> CaptureResult<ShotReport> {
        recorder.cancel();
        let index = recorder.shot_index();
        let finished = recorder.finish();
        *self.active.lock() = None;
        let report = finished?;

        for item in &report.saved_items {
            remove_file_if_present(&self.session.root().join(&item.path))?;
        }
        info!(shot = index, removed = report.saved_items.len(), "Shot aborted");
        Ok(report)
    }

    /// Remove a shot's files and mark it incomplete so it can be retaken.
    ///
    /// Files another shot still lists (the shared calibration file) are kept.
    #[instrument(skip(self), err)]
    pub fn delete_shot(&mut self, index: usize) -> CaptureResult<()> {
        if *self.active.lock() == Some(index) {
            return Err(CaptureError::ShotState(format!(
                "shot {index} is still recording"
            )));
        }

        let items = std::mem::take(&mut self.session.shot_mut(index)?.saved_items);
        let mut removed = 0usize;
        for item in &items {
            if self.session.is_referenced_elsewhere(index, &item.path) {
                continue;
            }
            remove_file_if_present(&self.session.root().join(&item.path))?;
            removed += 1;
        }
        self.session.shot_mut(index)?.completed = false;
        self.session.write_metadata()?;

        info!(shot = index, removed, "Shot deleted");
        Ok(())
    }
}

fn remove_file_if_present(path: &std::path::Path) -> CaptureResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
