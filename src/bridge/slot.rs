//! Single-buffer handoff between the writer and the realtime callback.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::DeviceBuffer;

/// Creates a capacity-1 handoff slot.
///
/// The slot is the only data path between the two sides: at most one filled
/// buffer waits in it at any time.
pub(crate) fn handoff_slot() -> (SlotSender, SlotReceiver) {
    let (producer, consumer) = HeapRb::<DeviceBuffer>::new(1).split();
    (
        SlotSender { producer },
        SlotReceiver { consumer },
    )
}

/// Writer side of the slot.
pub(crate) struct SlotSender {
    producer: HeapProd<DeviceBuffer>,
}

impl SlotSender {
    /// Publishes `buffer`, or gives it back if the previous one is still
    /// waiting.
    pub(crate) fn try_send(&mut self, buffer: DeviceBuffer) -> Result<(), DeviceBuffer> {
        self.producer.try_push(buffer)
    }

    /// Returns `true` while a buffer is waiting to be played.
    pub(crate) fn is_occupied(&self) -> bool {
        self.producer.is_full()
    }
}

/// Realtime side of the slot. Never blocks.
pub(crate) struct SlotReceiver {
    consumer: HeapCons<DeviceBuffer>,
}

impl SlotReceiver {
    /// Takes the waiting buffer, if any.
    #[inline]
    pub(crate) fn try_take(&mut self) -> Option<DeviceBuffer> {
        self.consumer.try_pop()
    }
}
