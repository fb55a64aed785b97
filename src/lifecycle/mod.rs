//! Stream lifecycle: global subsystem bracket plus per-stream open/start/stop/close.
//!
//! ```text
//! Uninitialized → Initialized → Opened → Started ⇄ Stopped → Closed → Terminated
//! ```
//!
//! Every exit path releases the subsystem reference taken by `initialize`,
//! and every teardown failure is composed onto the failures before it.

mod subsystem;

pub use subsystem::Subsystem;

use std::fmt;
use std::sync::Arc;

use crate::backend::{AudioBackend, ErrorCallback, OutputCallback, OutputStreamParams};
use crate::error::accumulate;
use crate::{DeviceDescriptor, DeviceRegistry, LatencyPreference, PlaybackError, StreamConfig};

/// Lifecycle state of one hardware stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No subsystem reference held.
    Uninitialized,
    /// Subsystem reference held, no stream.
    Initialized,
    /// Stream opened but not playing.
    Opened,
    /// Hardware is pulling buffers.
    Started,
    /// Playback stopped, stream still open.
    Stopped,
    /// Stream closed, subsystem reference still held.
    Closed,
    /// Subsystem reference released. Final.
    Terminated,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Opened => "opened",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Owns one hardware stream and the subsystem reference it runs under.
///
/// Dropping a lifecycle that was not shut down runs [`shutdown`](Self::shutdown)
/// and logs any failure.
pub struct StreamLifecycle<B: AudioBackend> {
    subsystem: Arc<Subsystem<B>>,
    state: StreamState,
    stream: Option<B::Stream>,
    device: Option<DeviceDescriptor>,
}

impl<B: AudioBackend> StreamLifecycle<B> {
    /// Creates a lifecycle in [`StreamState::Uninitialized`].
    pub fn new(subsystem: Arc<Subsystem<B>>) -> Self {
        Self {
            subsystem,
            state: StreamState::Uninitialized,
            stream: None,
            device: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The device the stream was opened on, once resolved.
    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    /// Takes a subsystem reference.
    pub fn initialize(&mut self) -> Result<(), PlaybackError> {
        self.require_state("initialize", &[StreamState::Uninitialized])?;
        self.subsystem.acquire()?;
        self.state = StreamState::Initialized;
        Ok(())
    }

    /// Resolves the device and opens a stream that pulls from `callback`.
    ///
    /// On failure the subsystem reference is released; a terminate failure
    /// is composed onto the open failure.
    pub fn open(
        &mut self,
        config: &StreamConfig,
        latency: LatencyPreference,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<(), PlaybackError> {
        self.require_state("open", &[StreamState::Initialized])?;
        match self.open_stream(config, latency, callback, error_callback) {
            Ok((stream, device)) => {
                self.stream = Some(stream);
                self.device = Some(device);
                self.state = StreamState::Opened;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "stream open failed, releasing subsystem");
                match self.terminate() {
                    Ok(()) => Err(err),
                    Err(terminate) => Err(err.then(terminate)),
                }
            }
        }
    }

    fn open_stream(
        &self,
        config: &StreamConfig,
        latency: LatencyPreference,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<(B::Stream, DeviceDescriptor), PlaybackError> {
        let registry = DeviceRegistry::new(Arc::clone(&self.subsystem));
        let resolved = registry.resolve(&config.device)?;
        let params = OutputStreamParams {
            channels: config.channel_count,
            sample_rate: config.sample_rate,
            frames_per_buffer: config.frames_per_buffer,
            latency: resolved.output_latency(latency, config.buffer_period()),
        };

        let stream = self
            .subsystem
            .backend()
            .open_stream(&resolved.handle, &params, callback, error_callback)
            .map_err(|source| PlaybackError::StreamOpen {
                device: resolved.descriptor.clone(),
                source,
            })?;

        tracing::info!(
            device = %resolved.descriptor,
            channels = params.channels,
            sample_rate = params.sample_rate,
            frames_per_buffer = params.frames_per_buffer,
            latency_ms = params.latency.as_millis() as u64,
            "opened output stream"
        );
        Ok((stream, resolved.descriptor))
    }

    /// Starts hardware playback.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        self.require_state("start", &[StreamState::Opened, StreamState::Stopped])?;
        let stream = self.stream("start")?;
        self.subsystem
            .backend()
            .start(stream)
            .map_err(|source| PlaybackError::StreamStart { source })?;
        self.state = StreamState::Started;
        tracing::debug!("output stream started");
        Ok(())
    }

    /// Stops hardware playback.
    ///
    /// The state moves to `Stopped` even on failure so that `close` is still
    /// attempted.
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        self.require_state("stop", &[StreamState::Started])?;
        let result = self
            .subsystem
            .backend()
            .stop(self.stream("stop")?)
            .map_err(|source| PlaybackError::StreamStop { source });
        self.state = StreamState::Stopped;
        result
    }

    /// Closes the stream.
    pub fn close(&mut self) -> Result<(), PlaybackError> {
        self.require_state(
            "close",
            &[StreamState::Opened, StreamState::Started, StreamState::Stopped],
        )?;
        let stream = self.stream.take().ok_or(PlaybackError::InvalidState {
            operation: "close",
            state: self.state,
        })?;
        self.state = StreamState::Closed;
        self.subsystem
            .backend()
            .close(stream)
            .map_err(|source| PlaybackError::StreamClose { source })
    }

    /// Releases the subsystem reference. Only valid once no stream is open.
    pub fn terminate(&mut self) -> Result<(), PlaybackError> {
        self.require_state(
            "terminate",
            &[StreamState::Initialized, StreamState::Closed],
        )?;
        self.state = StreamState::Terminated;
        self.subsystem.release()
    }

    /// Runs stop → close → terminate, skipping steps the current state does
    /// not need and attempting every remaining step even after a failure.
    ///
    /// All failures are composed in order, first cause preserved.
    pub fn shutdown(&mut self) -> Result<(), PlaybackError> {
        let mut pending = None;

        if self.state == StreamState::Started {
            if let Err(err) = self.stop() {
                tracing::warn!(error = %err, "stream stop failed, still closing");
                accumulate(&mut pending, err);
            }
        }
        if self.stream.is_some() {
            if let Err(err) = self.close() {
                tracing::warn!(error = %err, "stream close failed, still terminating");
                accumulate(&mut pending, err);
            }
        }
        if matches!(self.state, StreamState::Initialized | StreamState::Closed) {
            if let Err(err) = self.terminate() {
                tracing::warn!(error = %err, "subsystem terminate failed");
                accumulate(&mut pending, err);
            }
        }

        pending.map_or(Ok(()), Err)
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[StreamState],
    ) -> Result<(), PlaybackError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PlaybackError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn stream(&self, operation: &'static str) -> Result<&B::Stream, PlaybackError> {
        self.stream.as_ref().ok_or(PlaybackError::InvalidState {
            operation,
            state: self.state,
        })
    }
}

impl<B: AudioBackend> Drop for StreamLifecycle<B> {
    fn drop(&mut self) {
        if matches!(
            self.state,
            StreamState::Uninitialized | StreamState::Terminated
        ) {
            return;
        }
        if let Err(err) = self.shutdown() {
            tracing::warn!(error = %err, "stream teardown on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CallbackInfo, MockBackend, MockOperation};
    use crate::SignalProperties;

    fn config(device: DeviceDescriptor) -> StreamConfig {
        StreamConfig::new(
            256,
            SignalProperties {
                channels: 2,
                sample_rate: 48000,
            },
            device,
        )
        .unwrap()
    }

    fn silent() -> OutputCallback {
        Box::new(|out: &mut [f32], _: &CallbackInfo| out.fill(0.0))
    }

    fn ignore_errors() -> ErrorCallback {
        Box::new(|_| {})
    }

    fn opened(subsystem: &Arc<Subsystem<MockBackend>>) -> StreamLifecycle<MockBackend> {
        let mut lifecycle = StreamLifecycle::new(Arc::clone(subsystem));
        lifecycle.initialize().unwrap();
        lifecycle
            .open(
                &config(DeviceDescriptor::default_output()),
                LatencyPreference::Low,
                silent(),
                ignore_errors(),
            )
            .unwrap();
        lifecycle
    }

    #[test]
    fn test_full_lifecycle() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let mut lifecycle = opened(&subsystem);
        assert_eq!(lifecycle.state(), StreamState::Opened);
        assert_eq!(
            lifecycle.device(),
            Some(&DeviceDescriptor::new("CoreAudio", "Speakers", 0, 2))
        );

        lifecycle.start().unwrap();
        assert_eq!(lifecycle.state(), StreamState::Started);
        assert!(subsystem.backend().last_stream().unwrap().is_running());

        lifecycle.shutdown().unwrap();
        assert_eq!(lifecycle.state(), StreamState::Terminated);
        assert_eq!(subsystem.ref_count(), 0);
        assert!(subsystem.backend().last_stream().unwrap().is_closed());
    }

    #[test]
    fn test_open_uses_device_latency() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let _lifecycle = opened(&subsystem);
        let params = subsystem.backend().last_stream().unwrap().params().clone();
        assert_eq!(params.latency, std::time::Duration::from_millis(10));
        assert_eq!(params.frames_per_buffer, 256);
    }

    #[test]
    fn test_open_failure_releases_subsystem() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        subsystem.backend().fail(MockOperation::Open);

        let mut lifecycle = StreamLifecycle::new(Arc::clone(&subsystem));
        lifecycle.initialize().unwrap();
        let err = lifecycle
            .open(
                &config(DeviceDescriptor::default_output()),
                LatencyPreference::Low,
                silent(),
                ignore_errors(),
            )
            .unwrap_err();

        assert!(matches!(err, PlaybackError::StreamOpen { .. }));
        assert_eq!(lifecycle.state(), StreamState::Terminated);
        assert_eq!(subsystem.ref_count(), 0);
        assert_eq!(subsystem.backend().active_initializations(), 0);
    }

    #[test]
    fn test_open_failure_composes_terminate_failure() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        subsystem.backend().fail(MockOperation::Open);
        subsystem.backend().fail(MockOperation::Terminate);

        let mut lifecycle = StreamLifecycle::new(Arc::clone(&subsystem));
        lifecycle.initialize().unwrap();
        let err = lifecycle
            .open(
                &config(DeviceDescriptor::default_output()),
                LatencyPreference::Low,
                silent(),
                ignore_errors(),
            )
            .unwrap_err();

        let causes = err.causes();
        assert_eq!(causes.len(), 2);
        assert!(matches!(causes[0], PlaybackError::StreamOpen { .. }));
        assert!(matches!(causes[1], PlaybackError::SubsystemTerminate { .. }));
        assert_eq!(subsystem.ref_count(), 0);
    }

    #[test]
    fn test_open_unknown_device() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let mut lifecycle = StreamLifecycle::new(Arc::clone(&subsystem));
        lifecycle.initialize().unwrap();
        let err = lifecycle
            .open(
                &config(DeviceDescriptor::new("CoreAudio", "Missing", 0, 2)),
                LatencyPreference::Low,
                silent(),
                ignore_errors(),
            )
            .unwrap_err();

        assert!(err.is_device_not_found());
        assert_eq!(subsystem.ref_count(), 0);
    }

    #[test]
    fn test_stop_failure_still_closes_and_terminates() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let mut lifecycle = opened(&subsystem);
        lifecycle.start().unwrap();

        subsystem.backend().fail(MockOperation::Stop);
        subsystem.backend().fail(MockOperation::Terminate);
        let err = lifecycle.shutdown().unwrap_err();

        let causes = err.causes();
        assert_eq!(causes.len(), 2);
        assert!(matches!(causes[0], PlaybackError::StreamStop { .. }));
        assert!(matches!(causes[1], PlaybackError::SubsystemTerminate { .. }));
        assert!(subsystem.backend().last_stream().unwrap().is_closed());
        assert_eq!(subsystem.ref_count(), 0);
    }

    #[test]
    fn test_stop_and_close_failures_both_reported() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let mut lifecycle = opened(&subsystem);
        lifecycle.start().unwrap();

        subsystem.backend().fail(MockOperation::Stop);
        subsystem.backend().fail(MockOperation::Close);
        let err = lifecycle.shutdown().unwrap_err();

        let causes = err.causes();
        assert_eq!(causes.len(), 2);
        assert!(matches!(causes[0], PlaybackError::StreamStop { .. }));
        assert!(matches!(causes[1], PlaybackError::StreamClose { .. }));
        assert_eq!(subsystem.ref_count(), 0);
    }

    #[test]
    fn test_restart_after_stop() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let mut lifecycle = opened(&subsystem);
        lifecycle.start().unwrap();
        lifecycle.stop().unwrap();
        assert_eq!(lifecycle.state(), StreamState::Stopped);
        lifecycle.start().unwrap();
        assert_eq!(lifecycle.state(), StreamState::Started);
    }

    #[test]
    fn test_invalid_transitions() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let mut lifecycle = StreamLifecycle::new(Arc::clone(&subsystem));

        assert!(matches!(
            lifecycle.start(),
            Err(PlaybackError::InvalidState {
                operation: "start",
                state: StreamState::Uninitialized
            })
        ));

        lifecycle.initialize().unwrap();
        assert!(lifecycle.initialize().is_err());
        assert_eq!(subsystem.ref_count(), 1);
        assert!(lifecycle.stop().is_err());
    }

    #[test]
    fn test_drop_releases_subsystem() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        {
            let mut lifecycle = opened(&subsystem);
            lifecycle.start().unwrap();
        }
        assert_eq!(subsystem.ref_count(), 0);
        assert!(subsystem.backend().last_stream().unwrap().is_closed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(StreamState::Started.to_string(), "started");
        assert_eq!(StreamState::Terminated.to_string(), "terminated");
    }
}
