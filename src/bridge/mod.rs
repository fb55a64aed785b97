//! Realtime-safe handoff from a blocking writer to a hardware callback.
//!
//! ```text
//! writer thread                              realtime thread
//! ─────────────                              ───────────────
//! BufferPool::take ──► convert ──► HandoffSlot ──► BridgeCallback ──► DAC
//!        ▲                                               │
//!        └──────────────── BufferRecycler ◄──────────────┘
//! ```
//!
//! Both the slot and the free list are lock-free SPSC rings. The writer blocks
//! (polls) while the slot is occupied, which keeps the pipeline at most one
//! buffer ahead of playback. The callback never waits: if no buffer is ready
//! it plays silence and counts an underrun.
//!
//! State the two sides share lives in atomics. The callback never locks,
//! allocates or frees.

mod callback;
mod pool;
mod slot;
mod writer;

pub use callback::BridgeCallback;
pub use writer::BridgeWriter;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{PlaybackError, SinkOptions, StreamConfig};

/// One device-format buffer of `frames_per_buffer × channels` samples.
pub(crate) type DeviceBuffer = Box<[f32]>;

/// Bounds on the writer's backpressure poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_micros(500);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(10);

const FAULT_NONE: u8 = 0;
const FAULT_MISALIGNED: u8 = 1;
const FAULT_BACKEND: u8 = 2;

/// Counters describing a playback stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Buffers accepted by `write`.
    pub buffers_written: u64,
    /// Buffers fully played by the hardware callback.
    pub buffers_played: u64,
    /// Callback periods that had to be padded with silence.
    pub underruns: u64,
    /// Periods the backend itself flagged as output underflow.
    pub backend_underflows: u64,
    /// Device buffers the pool has allocated.
    pub pool_buffers: usize,
}

/// State shared between the writer and the callback.
#[derive(Default)]
pub(crate) struct BridgeShared {
    closed: AtomicBool,
    fault: AtomicU8,
    misaligned_len: AtomicUsize,
    backend_fault: Mutex<Option<String>>,
    underruns: AtomicU64,
    buffers_played: AtomicU64,
    backend_underflows: AtomicU64,
}

impl BridgeShared {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Realtime-safe: records an output region that is not a whole number
    /// of frames.
    #[inline]
    fn fault_misaligned(&self, len: usize) {
        if self
            .fault
            .compare_exchange(FAULT_NONE, FAULT_MISALIGNED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.misaligned_len.store(len, Ordering::Release);
        }
    }

    fn fault_backend(&self, reason: String) {
        let mut slot = self.backend_fault.lock();
        if self
            .fault
            .compare_exchange(FAULT_NONE, FAULT_BACKEND, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *slot = Some(reason);
        }
    }

    /// The stream fault, if one was recorded. Faults are sticky.
    fn fault(&self, channels: u16) -> Option<PlaybackError> {
        match self.fault.load(Ordering::Acquire) {
            FAULT_NONE => None,
            FAULT_MISALIGNED => Some(PlaybackError::stream_fault(format!(
                "output region of {} samples is not a whole number of {channels}-channel frames",
                self.misaligned_len.load(Ordering::Acquire)
            ))),
            _ => Some(PlaybackError::stream_fault(
                self.backend_fault
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "backend error".to_string()),
            )),
        }
    }
}

/// Records backend-reported stream errors as a fault on the bridge.
///
/// Handed to the backend's error callback. Not for use on the data path.
#[derive(Clone)]
pub struct FaultReporter {
    shared: Arc<BridgeShared>,
}

impl FaultReporter {
    /// Marks the stream as faulted. Only the first fault is kept.
    pub fn report(&self, reason: impl Into<String>) {
        self.shared.fault_backend(reason.into());
    }
}

/// Builds the two halves of a bridge for one stream.
///
/// The writer stays on the pipeline thread; the callback is moved into the
/// backend's data callback.
///
/// # Errors
///
/// Returns `InvalidConfig` if `options` are inconsistent.
pub fn realtime_bridge(
    config: &StreamConfig,
    options: &SinkOptions,
) -> Result<(BridgeWriter, BridgeCallback), PlaybackError> {
    options.validate()?;

    let shared = Arc::new(BridgeShared::default());
    let (sender, receiver) = slot::handoff_slot();
    let (pool, recycler) = pool::buffer_pool(
        config.samples_per_buffer(),
        options.prefill_buffers,
        options.max_buffers,
    );

    let writer = BridgeWriter::new(
        pool,
        sender,
        Arc::clone(&shared),
        config.channel_count,
        config.buffer_period(),
        poll_interval(config.buffer_period()),
        options.write_timeout,
    );
    let callback = BridgeCallback::new(receiver, recycler, shared, config.channel_count);
    Ok((writer, callback))
}

/// A quarter of the buffer period, clamped to a sane range.
fn poll_interval(buffer_period: Duration) -> Duration {
    (buffer_period / 4).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CallbackInfo;
    use crate::{DeviceDescriptor, SignalBuffer, SignalProperties};

    fn config(frames: usize, channels: u16) -> StreamConfig {
        StreamConfig::new(
            frames,
            SignalProperties::new(channels, 48000),
            DeviceDescriptor::default_output(),
        )
        .unwrap()
    }

    #[test]
    fn test_poll_interval_clamped() {
        assert_eq!(poll_interval(Duration::from_millis(20)), Duration::from_millis(5));
        assert_eq!(poll_interval(Duration::from_micros(100)), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval(Duration::from_secs(1)), MAX_POLL_INTERVAL);
    }

    #[test]
    fn test_rejects_invalid_options() {
        let options = SinkOptions {
            max_buffers: 1,
            ..Default::default()
        };
        assert!(realtime_bridge(&config(4, 2), &options).is_err());
    }

    #[test]
    fn test_round_trip_within_f32_precision() {
        let (mut writer, mut callback) =
            realtime_bridge(&config(4, 2), &SinkOptions::default()).unwrap();
        let input = SignalBuffer::from_interleaved(
            2,
            vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3, 0.123_456_789, -1.0],
        );
        writer.write(&input).unwrap();

        let mut out = [0.0f32; 8];
        callback.render(&mut out, &CallbackInfo::default());
        for (&played, &written) in out.iter().zip(input.samples()) {
            assert!((f64::from(played) - written).abs() < 1e-7);
        }
        assert_eq!(writer.stats().buffers_played, 1);
        assert_eq!(writer.stats().underruns, 0);
    }

    #[test]
    fn test_pool_converges() {
        let (mut writer, mut callback) =
            realtime_bridge(&config(8, 1), &SinkOptions::default()).unwrap();
        let input = SignalBuffer::silence(1, 8);
        let mut out = [0.0f32; 8];

        for _ in 0..1000 {
            writer.write(&input).unwrap();
            callback.render(&mut out, &CallbackInfo::default());
        }

        let stats = writer.stats();
        assert_eq!(stats.buffers_written, 1000);
        assert_eq!(stats.buffers_played, 1000);
        assert!(stats.pool_buffers <= SinkOptions::default().max_buffers);
    }

    #[test]
    fn test_fault_is_sticky_and_first_wins() {
        let (writer, _callback) = realtime_bridge(&config(4, 2), &SinkOptions::default()).unwrap();
        let reporter = writer.fault_reporter();
        reporter.report("device unplugged");
        reporter.report("second");

        let err = writer.fault().unwrap();
        assert!(err.to_string().contains("device unplugged"));
        assert!(writer.fault().is_some());
    }
}
