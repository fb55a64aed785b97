//! A sink playing to one hardware stream.

use crate::backend::AudioBackend;
use crate::bridge::{BridgeWriter, SinkStats};
use crate::error::accumulate;
use crate::lifecycle::{StreamLifecycle, StreamState};
use crate::sink::Sink;
use crate::{DeviceDescriptor, EventCallback, PlaybackError, PlaybackEvent, SignalBuffer};

/// A started hardware stream fed by a [`BridgeWriter`].
///
/// Created by [`DeviceSink`](crate::DeviceSink). Owns its stream exclusively;
/// dropping an unflushed sink flushes it and logs any failure.
pub struct PlaybackSink<B: AudioBackend> {
    lifecycle: StreamLifecycle<B>,
    writer: BridgeWriter,
    event_callback: Option<EventCallback>,
    flushed: bool,
}

impl<B: AudioBackend> PlaybackSink<B> {
    pub(crate) fn new(
        lifecycle: StreamLifecycle<B>,
        writer: BridgeWriter,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            lifecycle,
            writer,
            event_callback,
            flushed: false,
        }
    }

    /// Device the stream is playing on.
    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.lifecycle.device()
    }

    /// Lifecycle state of the underlying stream.
    pub fn state(&self) -> StreamState {
        self.lifecycle.state()
    }

    /// Current playback counters.
    pub fn stats(&self) -> SinkStats {
        self.writer.stats()
    }

    /// Returns `true` once the sink has been flushed.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    fn report_underruns(&mut self) {
        let Some((count, total)) = self.writer.take_underruns() else {
            return;
        };
        tracing::debug!(count, total, "playback underrun");
        if let Some(callback) = &self.event_callback {
            callback(PlaybackEvent::Underrun { count, total });
        }
    }
}

impl<B: AudioBackend> Sink for PlaybackSink<B> {
    /// Blocks until the previous buffer has been taken by the hardware, then
    /// hands this one over.
    fn write(&mut self, buffer: &SignalBuffer) -> Result<(), PlaybackError> {
        if self.flushed {
            return Err(PlaybackError::sink_write("sink has been flushed"));
        }
        let result = self.writer.write(buffer);
        self.report_underruns();
        result
    }

    /// Closes the handoff slot, then stops, closes and terminates the stream.
    ///
    /// Every step is attempted. A stream fault recorded since the last write
    /// comes first, followed by any teardown failures. Flushing twice is a
    /// no-op.
    fn flush(&mut self) -> Result<(), PlaybackError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let mut pending = self.writer.fault();
        if pending.is_none() && !self.writer.drain() {
            tracing::debug!("pending buffer not played before flush");
        }
        self.writer.close();
        self.report_underruns();

        if let Err(err) = self.lifecycle.shutdown() {
            accumulate(&mut pending, err);
        }

        let stats = self.writer.stats();
        tracing::info!(
            buffers_written = stats.buffers_written,
            buffers_played = stats.buffers_played,
            underruns = stats.underruns,
            "playback sink flushed"
        );
        pending.map_or(Ok(()), Err)
    }
}

impl<B: AudioBackend> Drop for PlaybackSink<B> {
    fn drop(&mut self) {
        if self.flushed {
            return;
        }
        tracing::warn!("playback sink dropped without flush");
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, "implicit flush failed");
        }
    }
}

impl<B: AudioBackend> std::fmt::Debug for PlaybackSink<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSink")
            .field("device", &self.device())
            .field("state", &self.state())
            .field("writer", &self.writer)
            .field("flushed", &self.flushed)
            .finish_non_exhaustive()
    }
}
