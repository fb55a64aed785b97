//! The pipeline's sample container.

use std::time::Duration;

use crate::PlaybackError;

/// Channel count and sample rate of a pipeline signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalProperties {
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl SignalProperties {
    /// Creates signal properties.
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }
}

/// A buffer of interleaved 64-bit float samples as produced by the pipeline.
///
/// This is the internal representation. The bridge narrows it to the device
/// wire format when it is written to a sink.
///
/// # Example
///
/// ```
/// use stream_playback::SignalBuffer;
///
/// let buffer = SignalBuffer::from_channels(vec![vec![0.1, 0.2], vec![-0.1, -0.2]]).unwrap();
/// assert_eq!(buffer.samples(), &[0.1, -0.1, 0.2, -0.2]);
/// assert_eq!(buffer.frames(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    channels: u16,
    samples: Vec<f64>,
}

impl SignalBuffer {
    /// Wraps already-interleaved samples.
    ///
    /// A trailing partial frame is kept as-is and rejected when the buffer
    /// is written.
    pub fn from_interleaved(channels: u16, samples: Vec<f64>) -> Self {
        Self { channels, samples }
    }

    /// Interleaves one vector per channel.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if there are no channels, more than
    /// `u16::MAX` channels, or the channels differ in length.
    pub fn from_channels(channels: Vec<Vec<f64>>) -> Result<Self, PlaybackError> {
        let count = u16::try_from(channels.len())
            .map_err(|_| PlaybackError::invalid_config("too many channels"))?;
        let Some(frames) = channels.first().map(Vec::len) else {
            return Err(PlaybackError::invalid_config("channel count must be positive"));
        };
        if channels.iter().any(|c| c.len() != frames) {
            return Err(PlaybackError::invalid_config("channels differ in length"));
        }

        let mut samples = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            samples.extend(channels.iter().map(|c| c[frame]));
        }
        Ok(Self {
            channels: count,
            samples,
        })
    }

    /// A buffer of `frames` frames of silence.
    pub fn silence(channels: u16, frames: usize) -> Self {
        Self {
            channels,
            samples: vec![0.0; frames * channels as usize],
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of complete frames.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Mutable interleaved samples.
    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Returns `true` if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration at `sample_rate`.
    pub fn duration(&self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_interleaves() {
        let buffer = SignalBuffer::from_channels(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.samples(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let err = SignalBuffer::from_channels(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_channels_rejects_empty() {
        assert!(SignalBuffer::from_channels(vec![]).is_err());
    }

    #[test]
    fn test_silence() {
        let buffer = SignalBuffer::silence(2, 512);
        assert_eq!(buffer.samples().len(), 1024);
        assert!(buffer.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_duration_stereo_48khz() {
        let buffer = SignalBuffer::silence(2, 4800);
        assert_eq!(buffer.duration(48000), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_channels() {
        let buffer = SignalBuffer::from_interleaved(0, vec![0.0; 10]);
        assert_eq!(buffer.frames(), 0);
        assert_eq!(buffer.duration(0), Duration::ZERO);
    }
}
