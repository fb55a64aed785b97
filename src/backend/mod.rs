//! Native audio subsystem abstraction.
//!
//! The rest of the crate talks to hardware only through [`AudioBackend`]. The
//! trait mirrors the shape of a callback-driven native API: a global
//! initialize/terminate pair, a host API/device query, and stream
//! open/start/stop/close with a data callback invoked on the driver's realtime
//! thread.
//!
//! Two implementations ship with the crate:
//! - [`CpalBackend`] (feature `cpal-backend`): real hardware via cpal
//! - [`MockBackend`]: deterministic in-process backend for tests and CI

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
pub mod mock;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalBackend;
pub use mock::{MockBackend, MockDevice, MockOperation, MockStream, MockStreamController};

use std::time::Duration;

use crate::BackendError;

/// Timing and status information passed to every callback invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackInfo {
    /// Estimated time until the first sample of this buffer reaches the DAC,
    /// if the backend reports it.
    pub playback_delay: Option<Duration>,
    /// The backend reported that output ran dry before this invocation.
    pub output_underflow: bool,
}

/// Data callback invoked on the backend's realtime thread.
///
/// Receives the interleaved output region to fill. Implementations must not
/// block, sleep, lock or allocate.
pub type OutputCallback = Box<dyn FnMut(&mut [f32], &CallbackInfo) + Send>;

/// Called when the backend reports an error on a running stream.
///
/// Invoked off the data path, so it may log or lock.
pub type ErrorCallback = Box<dyn FnMut(BackendError) + Send>;

/// Parameters for opening an output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputStreamParams {
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames the backend should request per callback.
    pub frames_per_buffer: usize,
    /// Suggested output latency.
    pub latency: Duration,
}

/// A device as reported by one host API.
#[derive(Debug, Clone)]
pub struct DeviceInfo<D> {
    /// Live handle, valid until the subsystem is terminated.
    pub handle: D,
    /// Device name.
    pub name: String,
    /// Maximum input channels (0 for output-only devices).
    pub max_input_channels: u16,
    /// Maximum output channels (0 for input-only devices).
    pub max_output_channels: u16,
    /// Suggested latency for interactive playback. Zero if unknown.
    pub default_low_output_latency: Duration,
    /// Suggested latency for robust non-interactive playback. Zero if unknown.
    pub default_high_output_latency: Duration,
}

/// A host API (driver family) and the devices it exposes.
#[derive(Debug, Clone)]
pub struct HostApiInfo<D> {
    /// Host API name, e.g. "CoreAudio" or "ALSA".
    pub name: String,
    /// Devices exposed by this host API.
    pub devices: Vec<DeviceInfo<D>>,
}

/// A device together with the host API it belongs to.
#[derive(Debug, Clone)]
pub struct HostDevice<D> {
    /// Host API name.
    pub host_api: String,
    /// The device.
    pub info: DeviceInfo<D>,
}

/// Boundary to a native, callback-driven audio subsystem.
///
/// `initialize` and `terminate` are global and must be paired; use
/// [`Subsystem`](crate::Subsystem) rather than calling them directly so the
/// pairing is reference counted. Device handles returned by
/// [`host_apis`](AudioBackend::host_apis) are only valid until the next
/// `terminate`.
pub trait AudioBackend: Send + Sync + 'static {
    /// Live device handle.
    type Device;
    /// Open hardware stream.
    type Stream;

    /// Backend name for logging and error messages.
    fn name(&self) -> &'static str;

    /// Brings the native subsystem up.
    fn initialize(&self) -> Result<(), BackendError>;

    /// Releases the native subsystem.
    fn terminate(&self) -> Result<(), BackendError>;

    /// Queries every host API and its devices.
    fn host_apis(&self) -> Result<Vec<HostApiInfo<Self::Device>>, BackendError>;

    /// Returns the current system default output device, if any.
    fn default_output_device(&self) -> Result<Option<HostDevice<Self::Device>>, BackendError>;

    /// Opens an output stream on `device` that pulls samples from `callback`.
    fn open_stream(
        &self,
        device: &Self::Device,
        params: &OutputStreamParams,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<Self::Stream, BackendError>;

    /// Starts hardware playback.
    fn start(&self, stream: &Self::Stream) -> Result<(), BackendError>;

    /// Stops hardware playback. The callback is not invoked after this returns.
    fn stop(&self, stream: &Self::Stream) -> Result<(), BackendError>;

    /// Closes the stream and releases its resources.
    fn close(&self, stream: Self::Stream) -> Result<(), BackendError>;
}
