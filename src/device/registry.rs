//! Device enumeration and resolution by stable identity.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AudioBackend, DeviceInfo, HostApiInfo};
use crate::lifecycle::{StreamState, Subsystem};
use crate::{DeviceDescriptor, LatencyPreference, PlaybackError};

/// Every endpoint reported by the backend, partitioned by direction.
///
/// A device with both input and output channels appears in both `input` and
/// `output`. A device reporting zero channels in both directions is `inactive`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    /// Devices with at least one input channel.
    pub input: Vec<DeviceDescriptor>,
    /// Devices with at least one output channel.
    pub output: Vec<DeviceDescriptor>,
    /// Devices with no channels in either direction.
    pub inactive: Vec<DeviceDescriptor>,
}

impl DeviceList {
    /// Partitions a host API query result.
    pub fn from_host_apis<D>(host_apis: &[HostApiInfo<D>]) -> Self {
        let mut list = Self::default();
        for api in host_apis {
            for device in &api.devices {
                let descriptor = descriptor_for(&api.name, device);
                let has_input = device.max_input_channels > 0;
                let has_output = device.max_output_channels > 0;
                if has_input {
                    list.input.push(descriptor.clone());
                }
                if has_output {
                    list.output.push(descriptor.clone());
                }
                if !has_input && !has_output {
                    list.inactive.push(descriptor);
                }
            }
        }
        list
    }
}

/// A descriptor resolved to a live handle in the current subsystem bracket.
#[derive(Debug, Clone)]
pub struct ResolvedDevice<D> {
    /// Stable identity of the device that was found.
    pub descriptor: DeviceDescriptor,
    /// Live handle. Invalid once the subsystem is terminated.
    pub handle: D,
    /// Device-suggested latency for interactive playback. Zero if unknown.
    pub default_low_output_latency: Duration,
    /// Device-suggested latency for robust playback. Zero if unknown.
    pub default_high_output_latency: Duration,
}

impl<D> ResolvedDevice<D> {
    fn from_info(host_api: &str, info: DeviceInfo<D>) -> Self {
        Self {
            descriptor: descriptor_for(host_api, &info),
            default_low_output_latency: info.default_low_output_latency,
            default_high_output_latency: info.default_high_output_latency,
            handle: info.handle,
        }
    }

    /// Output latency to open the stream with.
    ///
    /// Devices that report no latency get `fallback`, usually one buffer period.
    pub fn output_latency(&self, preference: LatencyPreference, fallback: Duration) -> Duration {
        let suggested = match preference {
            LatencyPreference::Low => self.default_low_output_latency,
            LatencyPreference::High => self.default_high_output_latency,
        };
        if suggested.is_zero() {
            fallback
        } else {
            suggested
        }
    }
}

fn descriptor_for<D>(host_api: &str, info: &DeviceInfo<D>) -> DeviceDescriptor {
    DeviceDescriptor::new(
        host_api,
        info.name.clone(),
        info.max_input_channels,
        info.max_output_channels,
    )
}

/// Enumerates devices and turns descriptors back into live handles.
pub struct DeviceRegistry<B: AudioBackend> {
    subsystem: Arc<Subsystem<B>>,
}

impl<B: AudioBackend> DeviceRegistry<B> {
    /// Creates a registry over a shared subsystem.
    pub fn new(subsystem: Arc<Subsystem<B>>) -> Self {
        Self { subsystem }
    }

    /// Queries every host API once and partitions the devices by direction.
    ///
    /// Runs inside its own initialize/terminate bracket, so the subsystem is
    /// left as it was found on both success and failure.
    ///
    /// # Errors
    ///
    /// `SubsystemInit` if the backend cannot be brought up, `DeviceQuery` if
    /// the query fails, and a composed error if terminate fails as well.
    pub fn enumerate(&self) -> Result<DeviceList, PlaybackError> {
        self.subsystem.with_bracket(|backend| {
            let host_apis = backend
                .host_apis()
                .map_err(|source| PlaybackError::DeviceQuery { source })?;
            let list = DeviceList::from_host_apis(&host_apis);
            tracing::debug!(
                inputs = list.input.len(),
                outputs = list.output.len(),
                inactive = list.inactive.len(),
                "enumerated audio devices"
            );
            Ok(list)
        })
    }

    /// The current system default output device, in its own bracket.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if the system has no default output.
    pub fn default_output_device(&self) -> Result<DeviceDescriptor, PlaybackError> {
        self.subsystem
            .with_bracket(|_| self.resolve_default().map(|resolved| resolved.descriptor))
    }

    /// Resolves `descriptor` to a live handle.
    ///
    /// The default sentinel resolves to the current system default output.
    /// Anything else is matched by `(host_api, name)` with a linear scan over
    /// every host API. The subsystem must already be initialized by the
    /// caller; the handle is only valid until it is terminated.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside an initialize/terminate bracket, `DeviceQuery`
    /// if the query fails, and `DeviceNotFound` if nothing matches.
    pub fn resolve(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<ResolvedDevice<B::Device>, PlaybackError> {
        if !self.subsystem.is_initialized() {
            return Err(PlaybackError::InvalidState {
                operation: "resolve device",
                state: StreamState::Uninitialized,
            });
        }
        if descriptor.is_default() {
            return self.resolve_default();
        }

        let host_apis = self
            .subsystem
            .backend()
            .host_apis()
            .map_err(|source| PlaybackError::DeviceQuery { source })?;

        for api in host_apis {
            let host_api = api.name;
            for info in api.devices {
                if descriptor.matches(&host_api, &info.name) {
                    return Ok(ResolvedDevice::from_info(&host_api, info));
                }
            }
        }

        Err(PlaybackError::DeviceNotFound {
            device: descriptor.clone(),
        })
    }

    fn resolve_default(&self) -> Result<ResolvedDevice<B::Device>, PlaybackError> {
        let default = self
            .subsystem
            .backend()
            .default_output_device()
            .map_err(|source| PlaybackError::DeviceQuery { source })?;
        match default {
            Some(device) => Ok(ResolvedDevice::from_info(&device.host_api, device.info)),
            None => Err(PlaybackError::DeviceNotFound {
                device: DeviceDescriptor::default_output(),
            }),
        }
    }
}
