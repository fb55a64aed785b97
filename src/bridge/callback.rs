//! Realtime-side half of the bridge.
//!
//! Everything here runs on the backend's audio thread: no locks, no
//! allocation, no logging.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::pool::BufferRecycler;
use super::slot::SlotReceiver;
use super::{BridgeShared, DeviceBuffer};
use crate::backend::{CallbackInfo, OutputCallback};

/// Fills hardware output regions from the handoff slot.
///
/// Keeps a cursor into the buffer it is playing, so a backend whose period
/// differs from the pipeline buffer size is still served sample-exactly.
pub struct BridgeCallback {
    slot: SlotReceiver,
    recycler: BufferRecycler,
    shared: Arc<BridgeShared>,
    channels: usize,
    current: Option<DeviceBuffer>,
    cursor: usize,
    primed: bool,
}

impl BridgeCallback {
    pub(crate) fn new(
        slot: SlotReceiver,
        recycler: BufferRecycler,
        shared: Arc<BridgeShared>,
        channels: u16,
    ) -> Self {
        Self {
            slot,
            recycler,
            shared,
            channels: usize::from(channels),
            current: None,
            cursor: 0,
            primed: false,
        }
    }

    /// Fills `out` with the next samples, padding with silence if the
    /// writer is late.
    ///
    /// Periods before the first buffer arrives are silent but are not
    /// counted as underruns. After the bridge is closed every period is
    /// silent.
    pub fn render(&mut self, out: &mut [f32], info: &CallbackInfo) {
        if info.output_underflow {
            self.shared.backend_underflows.fetch_add(1, Ordering::Relaxed);
        }
        if out.len() % self.channels != 0 {
            self.shared.fault_misaligned(out.len());
            out.fill(0.0);
            return;
        }
        if self.shared.is_closed() {
            out.fill(0.0);
            return;
        }

        let mut written = 0;
        while written < out.len() {
            if self.current.is_none() {
                match self.slot.try_take() {
                    Some(next) => {
                        self.current = Some(next);
                        self.cursor = 0;
                        self.primed = true;
                    }
                    None => break,
                }
            }
            let Some(buffer) = self.current.as_deref() else {
                break;
            };

            let n = (out.len() - written).min(buffer.len() - self.cursor);
            out[written..written + n].copy_from_slice(&buffer[self.cursor..self.cursor + n]);
            written += n;
            self.cursor += n;

            if self.cursor == buffer.len() {
                if let Some(done) = self.current.take() {
                    self.recycler.recycle(done);
                }
                self.shared.buffers_played.fetch_add(1, Ordering::Relaxed);
            }
        }

        if written < out.len() {
            out[written..].fill(0.0);
            if self.primed {
                self.shared.underruns.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Boxes the callback for [`AudioBackend::open_stream`](crate::AudioBackend::open_stream).
    pub fn into_output_callback(mut self) -> OutputCallback {
        Box::new(move |out: &mut [f32], info: &CallbackInfo| self.render(out, info))
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::CallbackInfo;
    use crate::bridge::realtime_bridge;
    use crate::{DeviceDescriptor, SignalBuffer, SignalProperties, SinkOptions, StreamConfig};

    fn config(frames: usize, channels: u16) -> StreamConfig {
        StreamConfig::new(
            frames,
            SignalProperties::new(channels, 48000),
            DeviceDescriptor::default_output(),
        )
        .unwrap()
    }

    fn ramp(frames: usize) -> SignalBuffer {
        SignalBuffer::from_interleaved(1, (1..=frames).map(|i| i as f64 / 16.0).collect())
    }

    #[test]
    fn test_empty_slot_outputs_silence() {
        let (_writer, mut callback) = realtime_bridge(&config(4, 2), &SinkOptions::default()).unwrap();
        let mut out = [0.7f32; 8];
        callback.render(&mut out, &CallbackInfo::default());
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_startup_silence_is_not_an_underrun() {
        let (writer, mut callback) = realtime_bridge(&config(4, 2), &SinkOptions::default()).unwrap();
        let mut out = [0.0f32; 8];
        for _ in 0..5 {
            callback.render(&mut out, &CallbackInfo::default());
        }
        assert_eq!(writer.stats().underruns, 0);
    }

    #[test]
    fn test_starved_period_counts_one_underrun() {
        let (mut writer, mut callback) = realtime_bridge(&config(4, 1), &SinkOptions::default()).unwrap();
        writer.write(&ramp(4)).unwrap();

        // Period of 6 frames: 4 from the buffer, 2 of padding.
        let mut out = [9.0f32; 6];
        callback.render(&mut out, &CallbackInfo::default());
        assert_eq!(out, [0.0625, 0.125, 0.1875, 0.25, 0.0, 0.0]);
        assert_eq!(writer.stats().underruns, 1);
        assert_eq!(writer.stats().buffers_played, 1);
    }

    #[test]
    fn test_small_periods_walk_through_buffer() {
        let (mut writer, mut callback) = realtime_bridge(&config(4, 1), &SinkOptions::default()).unwrap();
        writer.write(&ramp(4)).unwrap();

        let mut first = [0.0f32; 3];
        let mut second = [0.0f32; 1];
        callback.render(&mut first, &CallbackInfo::default());
        assert_eq!(writer.stats().buffers_played, 0);
        callback.render(&mut second, &CallbackInfo::default());

        assert_eq!(first, [0.0625, 0.125, 0.1875]);
        assert_eq!(second, [0.25]);
        assert_eq!(writer.stats().buffers_played, 1);
        assert_eq!(writer.stats().underruns, 0);
    }

    #[test]
    fn test_large_period_spans_buffers() {
        let (mut writer, mut callback) = realtime_bridge(&config(2, 1), &SinkOptions::default()).unwrap();
        writer.write(&ramp(2)).unwrap();
        let mut out = [0.0f32; 4];
        callback.render(&mut out, &CallbackInfo::default());
        writer.write(&ramp(2)).unwrap();

        assert_eq!(out, [0.0625, 0.125, 0.0, 0.0]);
        assert_eq!(writer.stats().underruns, 1);
    }

    #[test]
    fn test_misaligned_region_faults() {
        let (mut writer, mut callback) = realtime_bridge(&config(4, 2), &SinkOptions::default()).unwrap();
        let mut out = [0.5f32; 7];
        callback.render(&mut out, &CallbackInfo::default());

        assert!(out.iter().all(|&s| s == 0.0));
        let err = writer.write(&SignalBuffer::silence(2, 4)).unwrap_err();
        assert!(err.to_string().contains("7 samples"));
    }

    #[test]
    fn test_closed_bridge_is_silent() {
        let (mut writer, mut callback) = realtime_bridge(&config(4, 1), &SinkOptions::default()).unwrap();
        writer.write(&ramp(4)).unwrap();
        writer.close();

        let mut out = [1.0f32; 4];
        callback.render(&mut out, &CallbackInfo::default());
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(writer.stats().underruns, 0);
    }

    #[test]
    fn test_backend_underflow_counted() {
        let (writer, mut callback) = realtime_bridge(&config(4, 1), &SinkOptions::default()).unwrap();
        let info = CallbackInfo {
            output_underflow: true,
            ..Default::default()
        };
        let mut out = [0.0f32; 4];
        callback.render(&mut out, &info);
        assert_eq!(writer.stats().backend_underflows, 1);
    }

    #[test]
    fn test_boxed_callback_renders() {
        let (mut writer, callback) = realtime_bridge(&config(4, 1), &SinkOptions::default()).unwrap();
        let mut boxed = callback.into_output_callback();
        writer.write(&ramp(4)).unwrap();
        let mut out = [0.0f32; 4];
        boxed(&mut out, &CallbackInfo::default());
        assert_eq!(out[3], 0.25);
    }
}
