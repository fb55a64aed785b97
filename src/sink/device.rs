//! Allocator that plays to a hardware output device.

use std::sync::Arc;

use crate::backend::{AudioBackend, ErrorCallback};
use crate::bridge::{realtime_bridge, FaultReporter};
use crate::lifecycle::{StreamLifecycle, Subsystem};
use crate::sink::{PlaybackSink, SinkAllocator};
use crate::{
    event_callback, BackendError, DeviceDescriptor, EventCallback, PlaybackError, PlaybackEvent,
    SignalProperties, SinkOptions, StreamConfig,
};

/// Allocates [`PlaybackSink`]s on one output device.
///
/// Each allocation resolves the device afresh, so a descriptor chosen from an
/// earlier [`devices`](crate::devices) listing stays usable across subsystem
/// restarts.
///
/// # Example
///
/// ```
/// use stream_playback::{
///     DeviceDescriptor, DeviceSink, MockBackend, SignalBuffer, SignalProperties, Sink,
///     SinkAllocator,
/// };
///
/// # fn main() -> Result<(), stream_playback::PlaybackError> {
/// let allocator = DeviceSink::new(MockBackend::speakers(), DeviceDescriptor::default_output());
/// let mut sink = allocator.allocate(512, SignalProperties::new(2, 44100))?;
///
/// sink.write(&SignalBuffer::silence(2, 512))?;
/// sink.flush()?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceSink<B: AudioBackend> {
    subsystem: Arc<Subsystem<B>>,
    device: DeviceDescriptor,
    options: SinkOptions,
    event_callback: Option<EventCallback>,
}

impl<B: AudioBackend> DeviceSink<B> {
    /// Creates an allocator with its own subsystem owner.
    pub fn new(backend: B, device: DeviceDescriptor) -> Self {
        Self::with_subsystem(Subsystem::new(backend), device)
    }

    /// Creates an allocator sharing an existing subsystem owner.
    ///
    /// Use this when several sinks or a [`DeviceRegistry`](crate::DeviceRegistry)
    /// run against the same backend.
    pub fn with_subsystem(subsystem: Arc<Subsystem<B>>, device: DeviceDescriptor) -> Self {
        Self {
            subsystem,
            device,
            options: SinkOptions::default(),
            event_callback: None,
        }
    }

    /// Sets the sink options.
    #[must_use]
    pub fn options(mut self, options: SinkOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets a callback for runtime events (underruns, backend errors).
    #[must_use]
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(PlaybackEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(f));
        self
    }

    /// The shared subsystem owner.
    pub fn subsystem(&self) -> &Arc<Subsystem<B>> {
        &self.subsystem
    }

    /// The device sinks are allocated on.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    fn error_callback(&self, faults: FaultReporter) -> ErrorCallback {
        let events = self.event_callback.clone();
        Box::new(move |err: BackendError| {
            tracing::error!(error = %err, "output stream error");
            faults.report(err.to_string());
            if let Some(callback) = &events {
                callback(PlaybackEvent::BackendError {
                    reason: err.to_string(),
                });
            }
        })
    }
}

#[cfg(feature = "cpal-backend")]
impl DeviceSink<crate::backend::CpalBackend> {
    /// Allocator on a cpal device, sharing the process-wide cpal subsystem.
    pub fn cpal(device: DeviceDescriptor) -> Self {
        Self::with_subsystem(crate::backend::CpalBackend::shared(), device)
    }
}

impl<B: AudioBackend> SinkAllocator for DeviceSink<B> {
    type Sink = PlaybackSink<B>;

    /// Validates the format, then initializes, opens and starts a stream.
    ///
    /// Any failure after initialize rolls the lifecycle back, composing
    /// teardown failures onto the start failure.
    fn allocate(
        &self,
        buffer_size: usize,
        properties: SignalProperties,
    ) -> Result<PlaybackSink<B>, PlaybackError> {
        let config = StreamConfig::new(buffer_size, properties, self.device.clone())?;
        let (writer, callback) = realtime_bridge(&config, &self.options)?;

        let mut lifecycle = StreamLifecycle::new(Arc::clone(&self.subsystem));
        lifecycle.initialize()?;
        lifecycle.open(
            &config,
            self.options.latency,
            callback.into_output_callback(),
            self.error_callback(writer.fault_reporter()),
        )?;
        if let Err(err) = lifecycle.start() {
            tracing::warn!(error = %err, "stream start failed, rolling back");
            return Err(match lifecycle.shutdown() {
                Ok(()) => err,
                Err(teardown) => err.then(teardown),
            });
        }

        tracing::info!(
            device = %lifecycle.device().unwrap_or(&config.device),
            frames_per_buffer = config.frames_per_buffer,
            channels = config.channel_count,
            sample_rate = config.sample_rate,
            "playback sink allocated"
        );
        Ok(PlaybackSink::new(lifecycle, writer, self.event_callback.clone()))
    }
}
