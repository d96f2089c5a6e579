//! Reusable container for one captured frame.
//!
//! A `FrameBuffer` owns one fixed-size byte region per image channel, sized
//! once from the pool's [`SensorGeometry`] and reused for every frame that
//! passes through it. Only metadata is cleared between uses: every capture
//! fully overwrites the region it writes and marks the channel as written,
//! and readers only look at channels written for the current frame.

use chrono::{DateTime, Utc};
use rgbd_core::{ChannelKind, SensorGeometry, SkeletonFrame};
use std::time::Duration;

const CHANNEL_SLOTS: usize = 6;

const fn channel_index(channel: ChannelKind) -> usize {
    match channel {
        ChannelKind::Color => 0,
        ChannelKind::Depth => 1,
        ChannelKind::Infrared => 2,
        ChannelKind::BodyIndex => 3,
        ChannelKind::DepthMapping => 4,
        ChannelKind::Skeleton => 5,
    }
}

/// One pooled frame: per-channel regions plus metadata.
///
/// Identity is the arena `slot` assigned by the pool; it never changes for the
/// buffer's lifetime.
#[derive(Debug)]
pub struct FrameBuffer {
    slot: usize,
    geometry: SensorGeometry,
    /// `None` while free or being filled (the unassigned state)
    sequence: Option<u64>,
    arrived_at: Option<DateTime<Utc>>,
    relative_time: Option<Duration>,
    regions: [Vec<u8>; CHANNEL_SLOTS],
    timestamps: [Option<Duration>; CHANNEL_SLOTS],
    written: [bool; CHANNEL_SLOTS],
    skeleton: Option<SkeletonFrame>,
}

impl FrameBuffer {
    /// Allocate a buffer for `geometry` at arena index `slot`.
    ///
    /// Normally only called by the pool.
    #[must_use]
    pub fn new(slot: usize, geometry: SensorGeometry) -> Self {
        let regions = [
            vec![0u8; geometry.region_len(ChannelKind::Color)],
            vec![0u8; geometry.region_len(ChannelKind::Depth)],
            vec![0u8; geometry.region_len(ChannelKind::Infrared)],
            vec![0u8; geometry.region_len(ChannelKind::BodyIndex)],
            vec![0u8; geometry.region_len(ChannelKind::DepthMapping)],
            Vec::new(),
        ];

        Self {
            slot,
            geometry,
            sequence: None,
            arrived_at: None,
            relative_time: None,
            regions,
            timestamps: [None; CHANNEL_SLOTS],
            written: [false; CHANNEL_SLOTS],
            skeleton: None,
        }
    }

    /// Arena index.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Geometry the regions were sized for.
    #[must_use]
    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    /// Sequence index assigned at enqueue, `None` while unassigned.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Wall-clock arrival time recorded by the producer.
    #[must_use]
    pub fn arrived_at(&self) -> Option<DateTime<Utc>> {
        self.arrived_at
    }

    /// Sensor-relative frame time.
    #[must_use]
    pub fn relative_time(&self) -> Option<Duration> {
        self.relative_time
    }

    /// Byte region of a channel (empty for skeleton data).
    #[must_use]
    pub fn region(&self, channel: ChannelKind) -> &[u8] {
        &self.regions[channel_index(channel)]
    }

    /// Mutable byte region of a channel.
    ///
    /// Only reachable through a producer lease, so regions are never written
    /// while pending or serializing.
    pub fn region_mut(&mut self, channel: ChannelKind) -> &mut [u8] {
        &mut self.regions[channel_index(channel)]
    }

    /// Sensor timestamp of the channel for the current frame.
    #[must_use]
    pub fn channel_timestamp(&self, channel: ChannelKind) -> Option<Duration> {
        self.timestamps[channel_index(channel)]
    }

    /// Whether the channel was captured for the current frame.
    #[must_use]
    pub fn is_written(&self, channel: ChannelKind) -> bool {
        self.written[channel_index(channel)]
    }

    /// Record that a channel's region now holds current data.
    pub fn mark_written(&mut self, channel: ChannelKind, timestamp: Duration) {
        let idx = channel_index(channel);
        self.written[idx] = true;
        self.timestamps[idx] = Some(timestamp);
    }

    /// Tracked bodies captured for this frame.
    #[must_use]
    pub fn skeleton(&self) -> Option<&SkeletonFrame> {
        self.skeleton.as_ref()
    }

    /// Store tracked bodies for this frame.
    pub fn set_skeleton(&mut self, skeleton: SkeletonFrame, timestamp: Duration) {
        self.skeleton = Some(skeleton);
        self.mark_written(ChannelKind::Skeleton, timestamp);
    }

    /// Record arrival metadata.
    pub fn set_arrival(&mut self, arrived_at: DateTime<Utc>, relative_time: Duration) {
        self.arrived_at = Some(arrived_at);
        self.relative_time = Some(relative_time);
    }

    pub(crate) fn assign_sequence(&mut self, sequence: u64) {
        self.sequence = Some(sequence);
    }

    /// Clear per-frame metadata before the buffer returns to the free set.
    ///
    /// Regions keep their bytes; the written marks are what gate reads.
    pub(crate) fn reset(&mut self) {
        self.sequence = None;
        self.arrived_at = None;
        self.relative_time = None;
        self.timestamps = [None; CHANNEL_SLOTS];
        self.written = [false; CHANNEL_SLOTS];
        self.skeleton = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgbd_core::Resolution;

    fn tiny() -> SensorGeometry {
        SensorGeometry::new(Resolution::new(4, 2), Resolution::new(3, 2))
    }

    #[test]
    fn test_regions_sized_from_geometry() {
        let buf = FrameBuffer::new(7, tiny());
        assert_eq!(buf.slot(), 7);
        assert_eq!(buf.region(ChannelKind::Color).len(), 4 * 2 * 4);
        assert_eq!(buf.region(ChannelKind::Depth).len(), 3 * 2 * 2);
        assert_eq!(buf.region(ChannelKind::BodyIndex).len(), 6);
        assert_eq!(buf.region(ChannelKind::DepthMapping).len(), 6 * 16);
        assert!(buf.region(ChannelKind::Skeleton).is_empty());
        assert_eq!(buf.sequence(), None);
    }

    #[test]
    fn test_reset_clears_metadata_only() {
        let mut buf = FrameBuffer::new(0, tiny());
        buf.region_mut(ChannelKind::Depth)[0] = 0xAB;
        buf.mark_written(ChannelKind::Depth, Duration::from_millis(33));
        buf.set_skeleton(SkeletonFrame::default(), Duration::from_millis(34));
        buf.set_arrival(Utc::now(), Duration::from_millis(33));
        buf.assign_sequence(12);

        buf.reset();

        assert_eq!(buf.sequence(), None);
        assert!(buf.arrived_at().is_none());
        assert!(!buf.is_written(ChannelKind::Depth));
        assert!(!buf.is_written(ChannelKind::Skeleton));
        assert!(buf.channel_timestamp(ChannelKind::Depth).is_none());
        assert!(buf.skeleton().is_none());
        assert_eq!(buf.region(ChannelKind::Depth)[0], 0xAB);
    }
}
