//! Device identity, enumeration and resolution.

mod descriptor;
mod registry;

pub use descriptor::DeviceDescriptor;
pub use registry::{DeviceList, DeviceRegistry, ResolvedDevice};

#[cfg(feature = "cpal-backend")]
use crate::{backend::CpalBackend, PlaybackError};

/// Lists every input, output and inactive device on this machine.
///
/// Brackets its own subsystem initialize/terminate.
///
/// # Errors
///
/// Returns an error if the audio subsystem cannot be initialized or queried.
#[cfg(feature = "cpal-backend")]
pub fn devices() -> Result<DeviceList, PlaybackError> {
    DeviceRegistry::new(CpalBackend::shared()).enumerate()
}

/// The system default output device.
///
/// # Errors
///
/// Returns `DeviceNotFound` if no default output device is configured.
#[cfg(feature = "cpal-backend")]
pub fn default_output_device() -> Result<DeviceDescriptor, PlaybackError> {
    DeviceRegistry::new(CpalBackend::shared()).default_output_device()
}
