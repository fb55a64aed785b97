//! Reusable device-format buffers.
//!
//! Buffers travel writer → handoff slot → callback → free list → writer.
//! They are moved at every step, so a buffer can only ever be returned once.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::DeviceBuffer;
use crate::PlaybackError;

/// Creates a pool of buffers of `samples_per_buffer` samples each.
///
/// `prefill` buffers are allocated immediately; the pool grows on demand up to
/// `max_buffers` and never beyond.
pub(crate) fn buffer_pool(
    samples_per_buffer: usize,
    prefill: usize,
    max_buffers: usize,
) -> (BufferPool, BufferRecycler) {
    // The free list can hold every buffer the pool will ever allocate, so a
    // return from the realtime side never fails.
    let (mut producer, consumer) = HeapRb::<DeviceBuffer>::new(max_buffers).split();
    let prefill = prefill.min(max_buffers);
    for _ in 0..prefill {
        let _ = producer.try_push(zeroed(samples_per_buffer));
    }

    let pool = BufferPool {
        free: consumer,
        spare: None,
        allocated: prefill,
        max_buffers,
        samples_per_buffer,
    };
    (pool, BufferRecycler { free: producer })
}

fn zeroed(samples: usize) -> DeviceBuffer {
    vec![0.0; samples].into_boxed_slice()
}

/// Writer-side half of the pool.
pub(crate) struct BufferPool {
    free: HeapCons<DeviceBuffer>,
    spare: Option<DeviceBuffer>,
    allocated: usize,
    max_buffers: usize,
    samples_per_buffer: usize,
}

impl BufferPool {
    /// Takes a free buffer, allocating one if the pool has not reached its cap.
    pub(crate) fn take(&mut self) -> Result<DeviceBuffer, PlaybackError> {
        if let Some(buffer) = self.spare.take().or_else(|| self.free.try_pop()) {
            return Ok(buffer);
        }
        if self.allocated < self.max_buffers {
            self.allocated += 1;
            tracing::debug!(
                allocated = self.allocated,
                max = self.max_buffers,
                "buffer pool grew"
            );
            return Ok(zeroed(self.samples_per_buffer));
        }
        Err(PlaybackError::sink_write(format!(
            "buffer pool exhausted ({} buffers in flight)",
            self.allocated
        )))
    }

    /// Returns a buffer the writer took but could not hand off.
    pub(crate) fn put_back(&mut self, buffer: DeviceBuffer) {
        self.spare = Some(buffer);
    }

    /// Buffers allocated so far.
    pub(crate) fn allocated(&self) -> usize {
        self.allocated
    }
}

/// Realtime-side half of the pool. Never allocates or frees.
pub(crate) struct BufferRecycler {
    free: HeapProd<DeviceBuffer>,
}

impl BufferRecycler {
    /// Returns a played buffer to the writer.
    #[inline]
    pub(crate) fn recycle(&mut self, buffer: DeviceBuffer) {
        let _ = self.free.try_push(buffer);
    }
}
