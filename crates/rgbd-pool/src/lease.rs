//! Typed leases for buffers checked out of a [`BufferPool`](crate::BufferPool).

use crate::buffer_pool::BufferPoolInner;
use crate::frame_buffer::FrameBuffer;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A free buffer held by the producer while it is being filled.
///
/// Dereferences mutably to [`FrameBuffer`]. Pass it to
/// [`BufferPool::enqueue_pending`](crate::BufferPool::enqueue_pending) to hand
/// it to the workers; dropping it instead abandons the frame and returns the
/// buffer to the free set.
#[must_use = "dropping a WritableBuffer abandons the frame"]
pub struct WritableBuffer {
    pub(crate) frame: Option<FrameBuffer>,
    pub(crate) pool: Arc<BufferPoolInner>,
}

impl WritableBuffer {
    pub(crate) fn take(mut self) -> (FrameBuffer, Arc<BufferPoolInner>) {
        // Only None after take(), which consumes self
        #[allow(clippy::expect_used)]
        let frame = self.frame.take().expect("lease already consumed");
        (frame, Arc::clone(&self.pool))
    }
}

impl Deref for WritableBuffer {
    type Target = FrameBuffer;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &FrameBuffer {
        self.frame.as_ref().expect("lease already consumed")
    }
}

impl DerefMut for WritableBuffer {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut FrameBuffer {
        self.frame.as_mut().expect("lease already consumed")
    }
}

impl Drop for WritableBuffer {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.pool.return_abandoned(frame);
        }
    }
}

impl std::fmt::Debug for WritableBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritableBuffer")
            .field("slot", &self.frame.as_ref().map(FrameBuffer::slot))
            .finish()
    }
}

/// A pending buffer held by a worker while it is being serialized.
///
/// Read-only: dereferences to `&FrameBuffer`. Dropping it releases the buffer
/// back to the free set, which makes release the guaranteed exit path for a
/// worker whatever the outcome of serialization.
#[must_use = "dropping a SerializableBuffer releases it immediately"]
pub struct SerializableBuffer {
    pub(crate) frame: Option<FrameBuffer>,
    pub(crate) pool: Arc<BufferPoolInner>,
}

impl Deref for SerializableBuffer {
    type Target = FrameBuffer;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &FrameBuffer {
        self.frame.as_ref().expect("lease already released")
    }
}

impl Drop for SerializableBuffer {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.pool.return_serialized(frame);
        }
    }
}

impl std::fmt::Debug for SerializableBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializableBuffer")
            .field("slot", &self.frame.as_ref().map(FrameBuffer::slot))
            .field("sequence", &self.frame.as_ref().and_then(FrameBuffer::sequence))
            .finish()
    }
}
