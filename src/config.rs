//! Configuration types for playback streams.

use std::time::Duration;

use crate::{DeviceDescriptor, PlaybackError, SignalProperties};

/// Smallest pool that can never run dry: one buffer being filled by the
/// writer, one waiting in the handoff slot, one being played.
pub const MIN_POOL_BUFFERS: usize = 3;

/// Which of the device's suggested latencies to open the stream with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyPreference {
    /// The device's default low output latency, for interactive playback.
    #[default]
    Low,
    /// The device's default high output latency, for robust playback.
    High,
}

/// Parameters of one hardware stream.
///
/// Immutable for the lifetime of the stream. Changing the frame or channel
/// count means opening a new stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Interleaved channel count.
    pub channel_count: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per pipeline buffer and per requested hardware period.
    pub frames_per_buffer: usize,
    /// Device to play on.
    pub device: DeviceDescriptor,
}

impl StreamConfig {
    /// Builds and validates a stream configuration from pipeline parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the buffer size, channel count or sample
    /// rate is zero.
    pub fn new(
        buffer_size: usize,
        properties: SignalProperties,
        device: DeviceDescriptor,
    ) -> Result<Self, PlaybackError> {
        if properties.channels == 0 {
            return Err(PlaybackError::invalid_config("channel count must be positive"));
        }
        if buffer_size == 0 {
            return Err(PlaybackError::invalid_config("buffer size must be positive"));
        }
        if properties.sample_rate == 0 {
            return Err(PlaybackError::invalid_config("sample rate must be positive"));
        }
        Ok(Self {
            channel_count: properties.channels,
            sample_rate: properties.sample_rate,
            frames_per_buffer: buffer_size,
            device,
        })
    }

    /// Interleaved samples in one buffer.
    pub fn samples_per_buffer(&self) -> usize {
        self.frames_per_buffer * self.channel_count as usize
    }

    /// Playback duration of one buffer.
    pub fn buffer_period(&self) -> Duration {
        Duration::from_secs_f64(self.frames_per_buffer as f64 / f64::from(self.sample_rate))
    }
}

/// Tuning for sinks created by [`DeviceSink`](crate::DeviceSink).
///
/// Use [`SinkOptions::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_playback::{LatencyPreference, SinkOptions};
/// use std::time::Duration;
///
/// let options = SinkOptions {
///     latency: LatencyPreference::High,
///     write_timeout: Some(Duration::from_secs(2)),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOptions {
    /// Which suggested device latency to request.
    ///
    /// Default: [`LatencyPreference::Low`]
    pub latency: LatencyPreference,

    /// Buffers allocated up front when the stream opens.
    ///
    /// Default: 2
    pub prefill_buffers: usize,

    /// Upper bound on buffers the pool will ever allocate.
    ///
    /// Must be at least [`MIN_POOL_BUFFERS`]. Default: 3
    pub max_buffers: usize,

    /// How long a write may wait for the hardware to free the handoff slot.
    ///
    /// `None` blocks until the slot frees or the sink is closed.
    /// Default: `None`
    pub write_timeout: Option<Duration>,
}

impl SinkOptions {
    /// Checks the options for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the pool bounds are unusable.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.max_buffers < MIN_POOL_BUFFERS {
            return Err(PlaybackError::invalid_config(format!(
                "max_buffers must be at least {MIN_POOL_BUFFERS}, got {}",
                self.max_buffers
            )));
        }
        if self.prefill_buffers > self.max_buffers {
            return Err(PlaybackError::invalid_config(format!(
                "prefill_buffers ({}) exceeds max_buffers ({})",
                self.prefill_buffers, self.max_buffers
            )));
        }
        Ok(())
    }
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            latency: LatencyPreference::Low,
            prefill_buffers: 2,
            max_buffers: MIN_POOL_BUFFERS,
            write_timeout: None,
        }
    }
}
