//! Stable device identity.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Logical identity of a hardware endpoint.
///
/// Native device handles are only valid between one subsystem initialize and
/// the matching terminate. A `DeviceDescriptor` survives those cycles: it is
/// compared by `(host_api, name)` only, and is turned back into a live handle
/// with [`DeviceRegistry::resolve`](crate::DeviceRegistry::resolve).
///
/// The empty descriptor ([`DeviceDescriptor::default_output`]) is a sentinel
/// meaning "whatever the system default output is when the stream opens".
///
/// # Example
///
/// ```
/// use stream_playback::DeviceDescriptor;
///
/// let a = DeviceDescriptor::new("CoreAudio", "Speakers", 0, 2);
/// let b = DeviceDescriptor::new("CoreAudio", "Speakers", 0, 8);
///
/// // Channel counts are informational, identity is (host API, name).
/// assert_eq!(a, b);
/// assert!(DeviceDescriptor::default_output().is_default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceDescriptor {
    host_api: String,
    name: String,
    max_input_channels: u16,
    max_output_channels: u16,
}

impl DeviceDescriptor {
    /// Creates a descriptor for a named endpoint.
    pub fn new(
        host_api: impl Into<String>,
        name: impl Into<String>,
        max_input_channels: u16,
        max_output_channels: u16,
    ) -> Self {
        Self {
            host_api: host_api.into(),
            name: name.into(),
            max_input_channels,
            max_output_channels,
        }
    }

    /// The "system default output" sentinel.
    pub fn default_output() -> Self {
        Self::default()
    }

    /// Returns `true` for the default-output sentinel.
    pub fn is_default(&self) -> bool {
        self.host_api.is_empty() && self.name.is_empty()
    }

    /// Name of the host API (driver family) exposing this device.
    pub fn host_api(&self) -> &str {
        &self.host_api
    }

    /// Device name as reported by the host API.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum input channels reported at enumeration time.
    pub fn max_input_channels(&self) -> u16 {
        self.max_input_channels
    }

    /// Maximum output channels reported at enumeration time.
    pub fn max_output_channels(&self) -> u16 {
        self.max_output_channels
    }

    /// Returns `true` if `host_api` and `name` identify this endpoint.
    pub fn matches(&self, host_api: &str, name: &str) -> bool {
        self.host_api == host_api && self.name == name
    }
}

impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.host_api == other.host_api && self.name == other.name
    }
}

impl Eq for DeviceDescriptor {}

impl Hash for DeviceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host_api.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            write!(f, "default output device")
        } else {
            write!(f, "{} ({})", self.name, self.host_api)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_channel_counts() {
        let a = DeviceDescriptor::new("ALSA", "hw:0", 2, 2);
        let b = DeviceDescriptor::new("ALSA", "hw:0", 0, 6);
        let c = DeviceDescriptor::new("JACK", "hw:0", 2, 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_default_sentinel() {
        let d = DeviceDescriptor::default_output();
        assert!(d.is_default());
        assert_eq!(d, DeviceDescriptor::default());
        assert!(!DeviceDescriptor::new("ALSA", "default", 0, 2).is_default());
    }

    #[test]
    fn test_display() {
        let d = DeviceDescriptor::new("WASAPI", "Headphones", 0, 2);
        assert_eq!(format!("{d}"), "Headphones (WASAPI)");
        assert_eq!(
            DeviceDescriptor::default_output().to_string(),
            "default output device"
        );
    }

    #[test]
    fn test_hash_follows_identity() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DeviceDescriptor::new("CoreAudio", "Speakers", 0, 2));
        set.insert(DeviceDescriptor::new("CoreAudio", "Speakers", 0, 4));
        set.insert(DeviceDescriptor::new("CoreAudio", "AirPods", 1, 2));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_matches() {
        let d = DeviceDescriptor::new("CoreAudio", "Speakers", 0, 2);
        assert!(d.matches("CoreAudio", "Speakers"));
        assert!(!d.matches("CoreAudio", "speakers"));
    }
}
