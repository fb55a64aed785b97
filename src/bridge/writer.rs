//! Pipeline-side half of the bridge.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::pool::BufferPool;
use super::slot::SlotSender;
use super::{BridgeShared, DeviceBuffer, FaultReporter, SinkStats};
use crate::format::interleave_into;
use crate::{PlaybackError, SignalBuffer};

/// Converts pipeline buffers and hands them to the realtime callback.
///
/// [`write`](Self::write) blocks while the previous buffer is still waiting to
/// be played.
pub struct BridgeWriter {
    pool: BufferPool,
    slot: SlotSender,
    shared: Arc<BridgeShared>,
    channels: u16,
    buffer_period: Duration,
    poll_interval: Duration,
    write_timeout: Option<Duration>,
    buffers_written: u64,
    reported_underruns: u64,
}

impl BridgeWriter {
    pub(crate) fn new(
        pool: BufferPool,
        slot: SlotSender,
        shared: Arc<BridgeShared>,
        channels: u16,
        buffer_period: Duration,
        poll_interval: Duration,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            pool,
            slot,
            shared,
            channels,
            buffer_period,
            poll_interval,
            write_timeout,
            buffers_written: 0,
            reported_underruns: 0,
        }
    }

    /// Accepts one buffer for playback.
    ///
    /// Returns once the buffer sits in the handoff slot, not once it has
    /// been played.
    ///
    /// # Errors
    ///
    /// - `SinkWrite` if the bridge is closed, the buffer does not fit the
    ///   stream, or `write_timeout` elapses
    /// - `StreamFault` if the stream faulted since the last call
    pub fn write(&mut self, buffer: &SignalBuffer) -> Result<(), PlaybackError> {
        if self.is_closed() {
            return Err(PlaybackError::sink_write("sink is closed"));
        }
        if let Some(fault) = self.fault() {
            return Err(fault);
        }

        let mut device_buffer = self.pool.take()?;
        if let Err(err) = interleave_into(buffer, self.channels, &mut device_buffer) {
            self.pool.put_back(device_buffer);
            return Err(err);
        }
        self.hand_off(device_buffer)
    }

    fn hand_off(&mut self, buffer: DeviceBuffer) -> Result<(), PlaybackError> {
        let deadline = self.write_timeout.map(|timeout| Instant::now() + timeout);
        let mut pending = buffer;
        loop {
            match self.slot.try_send(pending) {
                Ok(()) => {
                    self.buffers_written += 1;
                    return Ok(());
                }
                Err(rejected) => pending = rejected,
            }

            let failure = if self.is_closed() {
                Some(PlaybackError::sink_write("sink closed while waiting for playback"))
            } else if let Some(fault) = self.fault() {
                Some(fault)
            } else {
                deadline.filter(|d| Instant::now() >= *d).map(|_| {
                    PlaybackError::sink_write(format!(
                        "timed out after {:?} waiting for playback",
                        self.write_timeout.unwrap_or_default()
                    ))
                })
            };
            if let Some(err) = failure {
                self.pool.put_back(pending);
                return Err(err);
            }

            std::thread::sleep(self.poll_interval);
        }
    }

    /// Waits up to two buffer periods for the callback to take the buffer
    /// still sitting in the slot.
    ///
    /// Returns `true` if the slot is empty afterwards.
    pub fn drain(&self) -> bool {
        let deadline = Instant::now() + self.buffer_period * 2;
        while self.has_pending() {
            if self.is_closed() || self.fault().is_some() || Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval);
        }
        true
    }

    /// Marks the bridge closed. The callback plays silence from now on and
    /// further writes fail.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// The stream fault, if the callback or backend recorded one.
    pub fn fault(&self) -> Option<PlaybackError> {
        self.shared.fault(self.channels)
    }

    /// Handle for recording backend errors from the backend's error callback.
    pub fn fault_reporter(&self) -> FaultReporter {
        FaultReporter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Underruns since the previous call, with the running total.
    ///
    /// Returns `None` if there were none.
    pub fn take_underruns(&mut self) -> Option<(u64, u64)> {
        let total = self.shared.underruns.load(Ordering::Relaxed);
        let new = total.saturating_sub(self.reported_underruns);
        if new == 0 {
            return None;
        }
        self.reported_underruns = total;
        Some((new, total))
    }

    /// Current counters.
    pub fn stats(&self) -> SinkStats {
        SinkStats {
            buffers_written: self.buffers_written,
            buffers_played: self.shared.buffers_played.load(Ordering::Relaxed),
            underruns: self.shared.underruns.load(Ordering::Relaxed),
            backend_underflows: self.shared.backend_underflows.load(Ordering::Relaxed),
            pool_buffers: self.pool.allocated(),
        }
    }

    /// Returns `true` while a written buffer is still waiting in the slot.
    pub fn has_pending(&self) -> bool {
        self.slot.is_occupied()
    }
}

impl std::fmt::Debug for BridgeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeWriter")
            .field("channels", &self.channels)
            .field("poll_interval", &self.poll_interval)
            .field("write_timeout", &self.write_timeout)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
