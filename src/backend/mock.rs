//! Mock audio backend for testing.
//!
//! Provides a fake native subsystem with configurable host APIs and devices,
//! per-operation failure injection, and stream controllers that let a test
//! play the role of the hardware clock. No audio hardware or OS permissions
//! are needed, so everything built on it runs in CI.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    AudioBackend, CallbackInfo, DeviceInfo, ErrorCallback, HostApiInfo, HostDevice,
    OutputCallback, OutputStreamParams,
};
use crate::BackendError;

const BACKEND_NAME: &str = "mock";

/// Default low output latency reported for mock devices.
const MOCK_LOW_LATENCY: Duration = Duration::from_millis(10);
/// Default high output latency reported for mock devices.
const MOCK_HIGH_LATENCY: Duration = Duration::from_millis(100);

/// Backend operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `initialize`
    Initialize,
    /// `terminate`
    Terminate,
    /// `host_apis` and `default_output_device`
    Query,
    /// `open_stream`
    Open,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `close`
    Close,
}

/// Live handle to a mock device.
///
/// Carries the subsystem generation it was created in, so a handle kept past
/// a terminate is detected as stale when a stream is opened with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    /// Host API the device belongs to.
    pub host_api: String,
    /// Device name.
    pub name: String,
    /// Initialize cycle this handle was issued in.
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct DeviceSpec {
    name: String,
    max_input_channels: u16,
    max_output_channels: u16,
}

#[derive(Debug, Clone)]
struct HostApiSpec {
    name: String,
    devices: Vec<DeviceSpec>,
}

#[derive(Default)]
struct MockState {
    host_apis: Vec<HostApiSpec>,
    default_output: Option<(String, String)>,
    failures: HashSet<MockOperation>,
    init_depth: usize,
    initialize_calls: usize,
    terminate_calls: usize,
    generation: u64,
    streams: Vec<MockStreamController>,
}

impl MockState {
    fn check(&self, op: MockOperation) -> Result<(), BackendError> {
        if self.failures.contains(&op) {
            return Err(BackendError::new(
                BACKEND_NAME,
                format!("injected {op:?} failure"),
            ));
        }
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), BackendError> {
        if self.init_depth == 0 {
            return Err(BackendError::new(BACKEND_NAME, "subsystem not initialized"));
        }
        Ok(())
    }

    fn device_info(&self, host_api: &str, spec: &DeviceSpec) -> DeviceInfo<MockDevice> {
        DeviceInfo {
            handle: MockDevice {
                host_api: host_api.to_string(),
                name: spec.name.clone(),
                generation: self.generation,
            },
            name: spec.name.clone(),
            max_input_channels: spec.max_input_channels,
            max_output_channels: spec.max_output_channels,
            default_low_output_latency: MOCK_LOW_LATENCY,
            default_high_output_latency: MOCK_HIGH_LATENCY,
        }
    }

    fn find(&self, host_api: &str, name: &str) -> Option<&DeviceSpec> {
        self.host_apis
            .iter()
            .filter(|api| api.name == host_api)
            .flat_map(|api| api.devices.iter())
            .find(|d| d.name == name)
    }
}

/// In-process stand-in for a native audio subsystem.
///
/// # Example
///
/// ```
/// use stream_playback::{MockBackend, MockOperation};
///
/// let backend = MockBackend::new()
///     .with_device("CoreAudio", "Speakers", 0, 2)
///     .with_default_output("CoreAudio", "Speakers");
///
/// // Make stream start fail to exercise rollback paths.
/// backend.fail(MockOperation::Start);
/// ```
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a backend with no host APIs and no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single output-only "Speakers" device under "CoreAudio", set as default.
    pub fn speakers() -> Self {
        Self::new()
            .with_device("CoreAudio", "Speakers", 0, 2)
            .with_default_output("CoreAudio", "Speakers")
    }

    /// Adds a host API with no devices.
    #[must_use]
    pub fn with_host_api(self, name: impl Into<String>) -> Self {
        let name = name.into();
        {
            let mut state = self.state.lock();
            if !state.host_apis.iter().any(|api| api.name == name) {
                state.host_apis.push(HostApiSpec {
                    name,
                    devices: Vec::new(),
                });
            }
        }
        self
    }

    /// Adds a device, creating its host API if needed.
    #[must_use]
    pub fn with_device(
        self,
        host_api: impl Into<String>,
        name: impl Into<String>,
        max_input_channels: u16,
        max_output_channels: u16,
    ) -> Self {
        self.add_device(host_api, name, max_input_channels, max_output_channels);
        self
    }

    /// Sets the system default output device.
    #[must_use]
    pub fn with_default_output(self, host_api: impl Into<String>, name: impl Into<String>) -> Self {
        self.set_default_output(host_api, name);
        self
    }

    /// Adds a device at runtime (e.g. a USB device being plugged in).
    pub fn add_device(
        &self,
        host_api: impl Into<String>,
        name: impl Into<String>,
        max_input_channels: u16,
        max_output_channels: u16,
    ) {
        let host_api = host_api.into();
        let spec = DeviceSpec {
            name: name.into(),
            max_input_channels,
            max_output_channels,
        };
        let mut state = self.state.lock();
        if let Some(api) = state.host_apis.iter_mut().find(|api| api.name == host_api) {
            api.devices.push(spec);
        } else {
            state.host_apis.push(HostApiSpec {
                name: host_api,
                devices: vec![spec],
            });
        }
    }

    /// Removes a device at runtime (e.g. a USB device being unplugged).
    pub fn remove_device(&self, host_api: &str, name: &str) {
        let mut state = self.state.lock();
        for api in state.host_apis.iter_mut().filter(|api| api.name == host_api) {
            api.devices.retain(|d| d.name != name);
        }
    }

    /// Changes the system default output device.
    pub fn set_default_output(&self, host_api: impl Into<String>, name: impl Into<String>) {
        self.state.lock().default_output = Some((host_api.into(), name.into()));
    }

    /// Clears the system default output device.
    pub fn clear_default_output(&self) {
        self.state.lock().default_output = None;
    }

    /// Makes `op` fail until [`succeed`](Self::succeed) is called.
    pub fn fail(&self, op: MockOperation) {
        self.state.lock().failures.insert(op);
    }

    /// Stops injecting failures for `op`.
    pub fn succeed(&self, op: MockOperation) {
        self.state.lock().failures.remove(&op);
    }

    /// Number of successful `initialize` calls not yet matched by `terminate`.
    pub fn active_initializations(&self) -> usize {
        self.state.lock().init_depth
    }

    /// Total successful `initialize` calls.
    pub fn initialize_calls(&self) -> usize {
        self.state.lock().initialize_calls
    }

    /// Total successful `terminate` calls.
    pub fn terminate_calls(&self) -> usize {
        self.state.lock().terminate_calls
    }

    /// Controllers for every stream opened so far, oldest first.
    pub fn streams(&self) -> Vec<MockStreamController> {
        self.state.lock().streams.clone()
    }

    /// Controller for the most recently opened stream.
    pub fn last_stream(&self) -> Option<MockStreamController> {
        self.state.lock().streams.last().cloned()
    }
}

impl AudioBackend for MockBackend {
    type Device = MockDevice;
    type Stream = MockStream;

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn initialize(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check(MockOperation::Initialize)?;
        if state.init_depth == 0 {
            state.generation += 1;
        }
        state.init_depth += 1;
        state.initialize_calls += 1;
        Ok(())
    }

    fn terminate(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.require_initialized()?;
        // A failed terminate still releases the native reference, as a real
        // driver would after tearing down what it could.
        state.init_depth -= 1;
        state.check(MockOperation::Terminate)?;
        state.terminate_calls += 1;
        Ok(())
    }

    fn host_apis(&self) -> Result<Vec<HostApiInfo<MockDevice>>, BackendError> {
        let state = self.state.lock();
        state.require_initialized()?;
        state.check(MockOperation::Query)?;
        Ok(state
            .host_apis
            .iter()
            .map(|api| HostApiInfo {
                name: api.name.clone(),
                devices: api
                    .devices
                    .iter()
                    .map(|d| state.device_info(&api.name, d))
                    .collect(),
            })
            .collect())
    }

    fn default_output_device(&self) -> Result<Option<HostDevice<MockDevice>>, BackendError> {
        let state = self.state.lock();
        state.require_initialized()?;
        state.check(MockOperation::Query)?;
        let Some((host_api, name)) = &state.default_output else {
            return Ok(None);
        };
        Ok(state.find(host_api, name).map(|spec| HostDevice {
            host_api: host_api.clone(),
            info: state.device_info(host_api, spec),
        }))
    }

    fn open_stream(
        &self,
        device: &MockDevice,
        params: &OutputStreamParams,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<MockStream, BackendError> {
        let mut state = self.state.lock();
        state.require_initialized()?;
        state.check(MockOperation::Open)?;
        if device.generation != state.generation {
            return Err(BackendError::new(BACKEND_NAME, "stale device handle"));
        }
        let Some(spec) = state.find(&device.host_api, &device.name) else {
            return Err(BackendError::new(BACKEND_NAME, "device disappeared"));
        };
        if params.channels > spec.max_output_channels {
            return Err(BackendError::new(
                BACKEND_NAME,
                format!(
                    "{} output channels requested, device supports {}",
                    params.channels, spec.max_output_channels
                ),
            ));
        }

        let controller = MockStreamController {
            inner: Arc::new(StreamInner {
                device: device.clone(),
                params: params.clone(),
                callback: Mutex::new(Some(callback)),
                error_callback: Mutex::new(Some(error_callback)),
                running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        };
        state.streams.push(controller.clone());
        Ok(MockStream { controller })
    }

    fn start(&self, stream: &MockStream) -> Result<(), BackendError> {
        self.state.lock().check(MockOperation::Start)?;
        if stream.controller.is_closed() {
            return Err(BackendError::new(BACKEND_NAME, "stream closed"));
        }
        stream.controller.inner.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self, stream: &MockStream) -> Result<(), BackendError> {
        self.state.lock().check(MockOperation::Stop)?;
        stream.controller.inner.running.store(false, Ordering::SeqCst);
        // Wait out an in-flight callback so none runs after stop returns.
        drop(stream.controller.inner.callback.lock());
        Ok(())
    }

    fn close(&self, stream: MockStream) -> Result<(), BackendError> {
        let inner = &stream.controller.inner;
        inner.running.store(false, Ordering::SeqCst);
        inner.closed.store(true, Ordering::SeqCst);
        inner.callback.lock().take();
        inner.error_callback.lock().take();
        self.state.lock().check(MockOperation::Close)
    }
}

struct StreamInner {
    device: MockDevice,
    params: OutputStreamParams,
    callback: Mutex<Option<OutputCallback>>,
    error_callback: Mutex<Option<ErrorCallback>>,
    running: AtomicBool,
    closed: AtomicBool,
}

/// An open mock stream, owned by whoever opened it.
pub struct MockStream {
    controller: MockStreamController,
}

impl MockStream {
    /// Returns a controller for driving this stream.
    pub fn controller(&self) -> MockStreamController {
        self.controller.clone()
    }
}

/// Test-side handle that plays the role of the hardware for one stream.
#[derive(Clone)]
pub struct MockStreamController {
    inner: Arc<StreamInner>,
}

impl MockStreamController {
    /// Device the stream was opened on.
    pub fn device(&self) -> &MockDevice {
        &self.inner.device
    }

    /// Parameters the stream was opened with.
    pub fn params(&self) -> &OutputStreamParams {
        &self.inner.params
    }

    /// Returns `true` between a successful start and the next stop or close.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Returns `true` once the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Runs one hardware period: invokes the data callback with `out`.
    ///
    /// Returns `false` without touching `out` if the stream is not running.
    pub fn render(&self, out: &mut [f32]) -> bool {
        self.render_with(out, &CallbackInfo::default())
    }

    /// Like [`render`](Self::render) with explicit timing/status info.
    pub fn render_with(&self, out: &mut [f32], info: &CallbackInfo) -> bool {
        let mut callback = self.inner.callback.lock();
        if !self.is_running() {
            return false;
        }
        match callback.as_mut() {
            Some(cb) => {
                cb(out, info);
                true
            }
            None => false,
        }
    }

    /// Delivers a backend error to the stream's error callback.
    pub fn raise_error(&self, message: &str) -> bool {
        match self.inner.error_callback.lock().as_mut() {
            Some(cb) => {
                cb(BackendError::new(BACKEND_NAME, message));
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for MockStreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStreamController")
            .field("device", &self.inner.device)
            .field("params", &self.inner.params)
            .field("running", &self.is_running())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
