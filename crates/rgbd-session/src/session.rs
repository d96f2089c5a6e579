//! Shots, saved items and the `Info.json` metadata file.

use chrono::{DateTime, Utc};
use rgbd_core::{CaptureError, CaptureResult, SensorGeometry, ShotDefinition};
use rgbd_storage::SavedItem;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata file name at the session root.
pub const METADATA_FILE: &str = "Info.json";

/// One shot of a session and the files written for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// Pool size, frame budget and channels
    pub definition: ShotDefinition,
    /// Set once the shot drained and its metadata was persisted
    pub completed: bool,
    /// Items written for this shot, paths relative to the session root
    pub saved_items: Vec<SavedItem>,
}

impl Shot {
    /// A shot not yet captured.
    #[must_use]
    pub fn new(definition: ShotDefinition) -> Self {
        Self {
            definition,
            completed: false,
            saved_items: Vec::new(),
        }
    }
}

/// Contents of `Info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Geometry every frame of the session was captured with
    pub geometry: SensorGeometry,
    /// Shots in capture order
    pub shots: Vec<Shot>,
}

/// A capture session rooted at one directory.
#[derive(Debug, Clone)]
pub struct Session {
    root: PathBuf,
    created_at: DateTime<Utc>,
    geometry: SensorGeometry,
    shots: Vec<Shot>,
}

impl Session {
    /// New session with one incomplete shot per definition.
    pub fn new(
        root: impl Into<PathBuf>,
        geometry: SensorGeometry,
        definitions: impl IntoIterator<Item = ShotDefinition>,
    ) -> Self {
        Self {
            root: root.into(),
            created_at: Utc::now(),
            geometry,
            shots: definitions.into_iter().map(Shot::new).collect(),
        }
    }

    /// Reopen a session from its `Info.json`, e.g. to resume incomplete shots.
    pub fn open(root: impl Into<PathBuf>) -> CaptureResult<Self> {
        let root = root.into();
        let file = File::open(root.join(METADATA_FILE))?;
        let metadata: SessionMetadata = serde_json::from_reader(BufReader::new(file))?;
        info!(
            root = ?root,
            shots = metadata.shots.len(),
            completed = metadata.shots.iter().filter(|s| s.completed).count(),
            "Reopened session"
        );
        Ok(Self {
            root,
            created_at: metadata.created_at,
            geometry: metadata.geometry,
            shots: metadata.shots,
        })
    }

    /// Session root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sensor geometry of the session.
    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    /// All shots in order.
    #[must_use]
    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    /// Shot at `index`.
    pub fn shot(&self, index: usize) -> CaptureResult<&Shot> {
        self.shots.get(index).ok_or_else(|| no_such_shot(index, self.shots.len()))
    }

    /// Mutable shot at `index`.
    pub fn shot_mut(&mut self, index: usize) -> CaptureResult<&mut Shot> {
        let len = self.shots.len();
        self.shots.get_mut(index).ok_or_else(|| no_such_shot(index, len))
    }

    /// Append a shot; returns its index.
    pub fn add_shot(&mut self, definition: ShotDefinition) -> usize {
        self.shots.push(Shot::new(definition));
        self.shots.len() - 1
    }

    /// First shot not yet completed.
    #[must_use]
    pub fn next_incomplete(&self) -> Option<usize> {
        self.shots.iter().position(|s| !s.completed)
    }

    /// Largest buffer count over all shots, or the default for an empty session.
    #[must_use]
    pub fn maximum_buffer_count(&self) -> usize {
        self.shots
            .iter()
            .map(|s| s.definition.buffer_count)
            .max()
            .unwrap_or_else(|| ShotDefinition::default().buffer_count)
    }

    /// Snapshot of the persisted metadata.
    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            created_at: self.created_at,
            geometry: self.geometry,
            shots: self.shots.clone(),
        }
    }

    /// Write `Info.json` at the session root (pretty JSON).
    pub fn write_metadata(&self) -> CaptureResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(METADATA_FILE);
        let mut out = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut out, &self.metadata())?;
        out.flush()?;
        debug!(path = ?path, "Wrote session metadata");
        Ok(path)
    }

    /// Whether any other shot still references `path`.
    pub(crate) fn is_referenced_elsewhere(&self, index: usize, path: &Path) -> bool {
        self.shots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .any(|(_, shot)| shot.saved_items.iter().any(|item| item.path == path))
    }
}

fn no_such_shot(index: usize, len: usize) -> CaptureError {
    CaptureError::ShotState(format!("no shot {index} (session has {len})"))
}
