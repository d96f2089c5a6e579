//! Producer side and bookkeeping of a capture session.
//!
//! - [`capture`]: copies sensor samples into pooled frame buffers
//! - [`recorder`]: one shot's producer path, worker pool and drain barrier
//! - [`session`]: shots, saved items and `Info.json` metadata
//! - [`manager`]: runs shots in order against one resizable buffer pool

pub mod capture;
pub mod manager;
pub mod paths;
pub mod recorder;
pub mod session;

pub use capture::ChannelCapture;
pub use manager::{SessionManager, SessionSettings};
pub use recorder::{FrameOutcome, RecorderSettings, ShotRecorder, ShotReport};
pub use session::{Session, SessionMetadata, Shot};

pub use rgbd_core::ShotDefinition;
pub use rgbd_storage::SavedItem;
