//! Sink facade: the contract a pipeline consumes.
//!
//! A pipeline asks a [`SinkAllocator`] for a [`Sink`] once it knows its buffer
//! size and signal properties, writes buffers into it, and flushes it on
//! shutdown. The crate provides one allocator:
//!
//! - [`DeviceSink`]: plays to a hardware output device, producing a
//!   [`PlaybackSink`]
//!
//! You can implement both traits for other destinations (files, network,
//! test doubles) and use them interchangeably.

mod device;
mod playback;

pub use device::DeviceSink;
pub use playback::PlaybackSink;

use crate::{PlaybackError, SignalBuffer, SignalProperties};

/// A destination that accepts pipeline buffers.
///
/// # Implementation Notes
///
/// - `write` is called on the pipeline's own thread and may block to apply
///   backpressure
/// - `flush` is called once when the pipeline shuts down; it should release
///   every resource and report every failure it hit while doing so
/// - calls after `flush` should fail rather than panic
///
/// # Example
///
/// ```
/// use stream_playback::{PlaybackError, SignalBuffer, Sink};
///
/// #[derive(Default)]
/// struct CountingSink {
///     frames: usize,
/// }
///
/// impl Sink for CountingSink {
///     fn write(&mut self, buffer: &SignalBuffer) -> Result<(), PlaybackError> {
///         self.frames += buffer.frames();
///         Ok(())
///     }
///
///     fn flush(&mut self) -> Result<(), PlaybackError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Sink {
    /// Accepts one buffer.
    ///
    /// Success means "accepted", not "delivered": playback is asynchronous.
    fn write(&mut self, buffer: &SignalBuffer) -> Result<(), PlaybackError>;

    /// Tears the sink down, composing every failure encountered.
    fn flush(&mut self) -> Result<(), PlaybackError>;
}

/// Creates sinks for a given buffer size and signal format.
pub trait SinkAllocator {
    /// The sink this allocator produces.
    type Sink: Sink;

    /// Allocates a ready-to-write sink.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `buffer_size` or `properties` are unusable, and
    /// any resolution or stream lifecycle failure otherwise.
    fn allocate(
        &self,
        buffer_size: usize,
        properties: SignalProperties,
    ) -> Result<Self::Sink, PlaybackError>;
}
