//! End-to-end shot behaviour: producer, pool, workers and disk output together.

use parking_lot::Mutex;
use rgbd_core::{
    ChannelKind, Resolution, SavedItemType, SensorGeometry, SerializationFlags, ShotDefinition,
};
use rgbd_driver_mock::{mock_calibration, MockSensor};
use rgbd_pool::{BufferPool, FrameBuffer};
use rgbd_session::{
    FrameOutcome, RecorderSettings, Session, SessionManager, SessionSettings, ShotRecorder,
};
use rgbd_storage::{Blkd, DiskSink, FrameSink, SavedItem, StorageError, WriterSettings};
use std::collections::HashSet;
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn geometry() -> SensorGeometry {
    SensorGeometry::new(Resolution::new(8, 6), Resolution::new(8, 6))
}

fn recorder_settings(workers: usize) -> RecorderSettings {
    RecorderSettings {
        workers,
        idle_wait: Duration::from_millis(1),
        drain_timeout: Duration::from_secs(30),
    }
}

fn session_settings(workers: usize) -> SessionSettings {
    SessionSettings {
        recorder: recorder_settings(workers),
        writer: WriterSettings::default(),
    }
}

/// Delegates to an inner sink after a fixed delay.
struct SlowSink<S> {
    inner: S,
    delay: Duration,
}

impl<S: FrameSink> FrameSink for SlowSink<S> {
    fn serialize(&self, frame: &FrameBuffer) -> Result<(), StorageError> {
        std::thread::sleep(self.delay);
        self.inner.serialize(frame)
    }

    fn take_saved_items(&self) -> Vec<SavedItem> {
        self.inner.take_saved_items()
    }
}

/// Each serialize call waits for one token from the test.
struct GatedSink {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl FrameSink for GatedSink {
    fn serialize(&self, _frame: &FrameBuffer) -> Result<(), StorageError> {
        self.gate.lock().recv().ok();
        Ok(())
    }
}

fn depth_only() -> SerializationFlags {
    let mut flags = SerializationFlags::none();
    flags.depth = true;
    flags
}

#[test]
fn overload_accounts_for_every_arrival() {
    let dir = tempfile::tempdir().unwrap();
    let pool = BufferPool::new(2, geometry()).unwrap();
    let sink = Arc::new(SlowSink {
        inner: DiskSink::new(
            dir.path(),
            depth_only(),
            WriterSettings::default(),
            rgbd_session::paths::frame_path_generator(0),
        ),
        delay: Duration::from_millis(5),
    });
    let definition = ShotDefinition {
        buffer_count: 2,
        frames_to_capture: 40,
        channels: depth_only(),
    };
    let recorder =
        ShotRecorder::start(0, definition, pool.clone(), sink, recorder_settings(1)).unwrap();

    let mut sensor = MockSensor::new(geometry(), 11);
    for n in 0..40 {
        let frame = sensor.render(n);
        recorder.on_frame(&frame);
    }
    let report = recorder.finish().unwrap();

    assert_eq!(pool.free_count(), pool.capacity());
    assert_eq!(report.arrived, 40);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.failed, 0);
    assert!(report.dropped > 0, "producer should have outrun one slow worker");
    assert_eq!(report.serialized + report.dropped, report.arrived);
    assert_eq!(report.saved_items.len() as u64, report.serialized);
}

#[test]
fn capacity_three_two_workers_five_back_to_back() {
    let (tx, rx) = mpsc::channel();
    let sink = Arc::new(GatedSink {
        gate: Mutex::new(rx),
    });
    let pool = BufferPool::new(3, geometry()).unwrap();
    let definition = ShotDefinition {
        buffer_count: 3,
        frames_to_capture: 0,
        channels: depth_only(),
    };
    let recorder =
        ShotRecorder::start(0, definition, pool.clone(), sink, recorder_settings(2)).unwrap();

    let mut sensor = MockSensor::new(geometry(), 0);
    let outcomes: Vec<_> = (0..5)
        .map(|n| {
            let frame = sensor.render(n);
            recorder.on_frame(&frame)
        })
        .collect();

    let accepted: Vec<u64> = outcomes
        .iter()
        .filter_map(|o| match o {
            FrameOutcome::Accepted(seq) => Some(*seq),
            _ => None,
        })
        .collect();
    assert_eq!(accepted, vec![0, 1, 2]);
    assert_eq!(&outcomes[3..], &[FrameOutcome::Dropped, FrameOutcome::Dropped]);
    assert_eq!(pool.free_count(), 0);

    for _ in 0..3 {
        tx.send(()).unwrap();
    }
    let report = recorder.finish().unwrap();
    assert_eq!(report.serialized, 3);
    assert_eq!(report.dropped, 2);
    assert_eq!(pool.free_count(), 3);
    assert_eq!(pool.pending_count(), 0);
    assert_eq!(pool.in_flight_count(), 0);
}

#[test]
fn disabled_channels_produce_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut channels = SerializationFlags::none();
    channels.depth = true;
    channels.skeleton = true;
    let definition = ShotDefinition {
        buffer_count: 8,
        frames_to_capture: 3,
        channels,
    };
    let session = Session::new(dir.path(), geometry(), vec![definition]);
    let mut manager = SessionManager::new(session, session_settings(2)).unwrap();

    let recorder = manager.begin_shot(None).unwrap();
    let mut sensor = MockSensor::new(geometry(), 5);
    sensor.run(0.0, 3, None, |frame| {
        recorder.on_frame(frame);
    });
    let report = manager.complete_shot(recorder).unwrap();
    assert!(report.is_clean());

    let types: HashSet<_> = report.saved_items.iter().map(|i| i.item_type).collect();
    assert_eq!(
        types,
        HashSet::from([SavedItemType::Depth, SavedItemType::Skeleton])
    );
    assert_eq!(report.saved_items.len(), 6);

    for disabled in [
        ChannelKind::Color,
        ChannelKind::Infrared,
        ChannelKind::BodyIndex,
        ChannelKind::DepthMapping,
    ] {
        assert!(
            !dir.path().join(disabled.item_type().name()).exists(),
            "{disabled} should not have been written"
        );
    }
    assert!(dir.path().join("Depth/Shot_001_Frame_003.png").exists());
    assert!(dir.path().join("Skeleton/Shot_001_Frame_001.json").exists());
}

#[test]
fn resize_from_fifty_to_ten_between_shots() {
    let dir = tempfile::tempdir().unwrap();
    let first = ShotDefinition {
        buffer_count: 50,
        frames_to_capture: 20,
        channels: depth_only(),
    };
    let second = ShotDefinition {
        buffer_count: 10,
        ..first
    };
    let session = Session::new(dir.path(), geometry(), vec![first, second]);
    let mut manager = SessionManager::new(session, session_settings(4)).unwrap();
    assert_eq!(manager.pool().capacity(), 50);

    let mut sensor = MockSensor::new(geometry(), 1);
    let recorder = manager.begin_shot(None).unwrap();
    assert_eq!(manager.pool().capacity(), 50);
    sensor.run(0.0, 20, None, |frame| {
        recorder.on_frame(frame);
    });
    manager.complete_shot(recorder).unwrap();

    let recorder = manager.begin_shot(None).unwrap();
    let stats = manager.pool().stats();
    assert_eq!(stats.capacity, 10);
    assert_eq!(stats.free, 10);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.in_flight(), 0);
    manager.complete_shot(recorder).unwrap();
    assert_eq!(manager.session().next_incomplete(), None);
}

#[test]
fn full_session_writes_every_channel_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let definition = ShotDefinition {
        buffer_count: 16,
        frames_to_capture: 4,
        channels: SerializationFlags::all(),
    };
    let session = Session::new(dir.path(), geometry(), vec![definition]);
    let mut manager = SessionManager::new(session, session_settings(3)).unwrap();
    manager.set_calibration(mock_calibration(geometry(), 9));

    let recorder = manager.begin_shot(None).unwrap();
    let mut sensor = MockSensor::new(geometry(), 2);
    for n in 0..6 {
        let frame = sensor.render(n);
        recorder.on_frame(&frame);
    }
    let report = manager.complete_shot(recorder).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.accepted, 4);
    // six frame channels per frame
    assert_eq!(report.saved_items.len(), 24);

    let shot = &manager.session().shots()[0];
    assert!(shot.completed);
    assert_eq!(shot.saved_items[0].item_type, SavedItemType::Calibration);
    assert_eq!(shot.saved_items.len(), 25);

    let blkd = Blkd::load_path(dir.path().join("DepthMapping/Shot_001_Frame_004.blkd")).unwrap();
    assert_eq!(blkd.header.version, 2);
    assert_eq!((blkd.header.width, blkd.header.height), (8, 6));
    assert_eq!(blkd.header.bytes_per_pixel, 16);
    // corner pixel is in the zero-depth border: unmapped
    assert_eq!(&blkd.data[0..4], &[0xFF, 0xFF, 0xFF, 0xFF]);

    let reopened = Session::open(dir.path()).unwrap();
    assert_eq!(reopened.shots()[0].saved_items, shot.saved_items);
}
