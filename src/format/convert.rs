//! Sample format conversion.

use crate::{PlaybackError, SignalBuffer};

/// Converts f32 samples to i16.
///
/// Input should be in the range [-1.0, 1.0].
/// Values outside this range are clamped.
///
/// Uses × 32767 (not 32768) for symmetric scaling. This means -1.0 maps
/// to -32767 rather than -32768, losing 1 LSB at the negative extreme.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Narrows an f64 pipeline sample to the f32 device format.
#[inline]
pub fn f64_to_f32(sample: f64) -> f32 {
    sample as f32
}

/// Writes `buffer` into a device-format buffer of `out.len()` samples.
///
/// Samples are narrowed from f64 to f32. A buffer shorter than `out` is
/// zero-padded to the end.
///
/// # Errors
///
/// Returns `SinkWrite` if the buffer's channel count is not `channels`, if it
/// holds a partial frame, or if it is longer than `out`.
pub fn interleave_into(
    buffer: &SignalBuffer,
    channels: u16,
    out: &mut [f32],
) -> Result<(), PlaybackError> {
    if buffer.channels() != channels {
        return Err(PlaybackError::sink_write(format!(
            "buffer has {} channels, stream has {channels}",
            buffer.channels()
        )));
    }
    let samples = buffer.samples();
    if samples.len() % channels as usize != 0 {
        return Err(PlaybackError::sink_write(format!(
            "{} samples is not a whole number of {channels}-channel frames",
            samples.len()
        )));
    }
    if samples.len() > out.len() {
        return Err(PlaybackError::sink_write(format!(
            "buffer of {} samples exceeds stream buffer of {}",
            samples.len(),
            out.len()
        )));
    }

    let (filled, padding) = out.split_at_mut(samples.len());
    for (dst, &src) in filled.iter_mut().zip(samples) {
        *dst = f64_to_f32(src);
    }
    padding.fill(0.0);
    Ok(())
}
