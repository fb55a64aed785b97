//! Error types for stream-playback.
//!
//! Errors fall into two groups:
//! - **Synchronous failures** ([`PlaybackError`]): returned from sink allocation,
//!   `write`, `flush`, device enumeration and the stream lifecycle.
//! - **Realtime conditions**: underruns on the hardware callback are not errors.
//!   They are counted and reported via [`EventCallback`](crate::EventCallback).
//!
//! Teardown can fail more than once (stop fails, then terminate fails). Those
//! failures are composed with [`PlaybackError::then`] so that no cause is lost.

use crate::device::DeviceDescriptor;
use crate::lifecycle::StreamState;

/// A failure reported by the native audio subsystem.
///
/// Every lifecycle variant of [`PlaybackError`] carries one of these as its
/// source, so the backend's own message is never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{backend}: {message}")]
pub struct BackendError {
    backend: &'static str,
    message: String,
}

impl BackendError {
    /// Creates a backend error for the named backend.
    pub fn new(backend: &'static str, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
        }
    }

    /// Name of the backend that reported the failure.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// The backend's description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by device resolution, the stream lifecycle and the sink.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The native subsystem could not be brought up (e.g. no audio backend present).
    #[error("failed to initialize audio subsystem: {source}")]
    SubsystemInit {
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// The native subsystem could not be released.
    #[error("failed to terminate audio subsystem: {source}")]
    SubsystemTerminate {
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// No live endpoint matches the requested descriptor.
    #[error("device not found: {device}")]
    DeviceNotFound {
        /// The descriptor that could not be resolved.
        device: DeviceDescriptor,
    },

    /// Querying host APIs or devices failed.
    #[error("failed to query audio devices: {source}")]
    DeviceQuery {
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// The hardware stream could not be opened.
    #[error("failed to open stream on {device}: {source}")]
    StreamOpen {
        /// Device the stream was opened on.
        device: DeviceDescriptor,
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// The hardware stream could not be started.
    #[error("failed to start stream: {source}")]
    StreamStart {
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// The hardware stream could not be stopped.
    #[error("failed to stop stream: {source}")]
    StreamStop {
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// The hardware stream could not be closed.
    #[error("failed to close stream: {source}")]
    StreamClose {
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// Buffer size, channel count or sample rate is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// A buffer could not be accepted for playback.
    #[error("sink write failed: {reason}")]
    SinkWrite {
        /// Why the write was rejected.
        reason: String,
    },

    /// The stream faulted while playing. Reported on the next write or flush.
    #[error("stream fault: {reason}")]
    StreamFault {
        /// Description of the fault.
        reason: String,
    },

    /// A lifecycle operation was requested in a state that does not allow it.
    #[error("cannot {operation} stream in state {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the stream was in.
        state: StreamState,
    },

    /// A failure that happened while an earlier failure was already pending.
    ///
    /// `cause` is the first failure and is exposed as the error source.
    #[error("{followed_by} (after: {cause})")]
    Compound {
        /// The earlier failure.
        #[source]
        cause: Box<PlaybackError>,
        /// The failure that followed it.
        followed_by: Box<PlaybackError>,
    },
}

impl PlaybackError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a sink write error.
    pub fn sink_write(reason: impl Into<String>) -> Self {
        Self::SinkWrite {
            reason: reason.into(),
        }
    }

    /// Creates a stream fault error.
    pub fn stream_fault(reason: impl Into<String>) -> Self {
        Self::StreamFault {
            reason: reason.into(),
        }
    }

    /// Composes a later failure onto this one, keeping `self` as the cause.
    #[must_use]
    pub fn then(self, later: PlaybackError) -> Self {
        Self::Compound {
            cause: Box::new(self),
            followed_by: Box::new(later),
        }
    }

    /// Composes `next` onto an optional pending failure.
    pub fn chain(pending: Option<Self>, next: Self) -> Self {
        match pending {
            Some(cause) => cause.then(next),
            None => next,
        }
    }

    /// All individual failures in the order they happened.
    pub fn causes(&self) -> Vec<&PlaybackError> {
        match self {
            Self::Compound { cause, followed_by } => {
                let mut all = cause.causes();
                all.extend(followed_by.causes());
                all
            }
            other => vec![other],
        }
    }

    /// Returns `true` if any composed failure is [`PlaybackError::DeviceNotFound`].
    pub fn is_device_not_found(&self) -> bool {
        self.causes()
            .iter()
            .any(|e| matches!(e, Self::DeviceNotFound { .. }))
    }
}

/// Records `err` onto a pending failure slot.
pub(crate) fn accumulate(pending: &mut Option<PlaybackError>, err: PlaybackError) {
    *pending = Some(PlaybackError::chain(pending.take(), err));
}

#[cfg(feature = "cpal-backend")]
mod cpal_conversions {
    use super::BackendError;

    macro_rules! from_cpal {
        ($($ty:ty),* $(,)?) => {
            $(
                impl From<$ty> for BackendError {
                    fn from(err: $ty) -> Self {
                        BackendError::new("cpal", err.to_string())
                    }
                }
            )*
        };
    }

    from_cpal!(
        cpal::BuildStreamError,
        cpal::PlayStreamError,
        cpal::PauseStreamError,
        cpal::DevicesError,
        cpal::DeviceNameError,
        cpal::HostUnavailable,
        cpal::DefaultStreamConfigError,
        cpal::SupportedStreamConfigsError,
        cpal::StreamError,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(msg: &str) -> BackendError {
        BackendError::new("mock", msg)
    }

    #[test]
    fn test_device_not_found_display() {
        let err = PlaybackError::DeviceNotFound {
            device: DeviceDescriptor::new("CoreAudio", "USB DAC", 0, 2),
        };
        assert_eq!(err.to_string(), "device not found: USB DAC (CoreAudio)");
    }

    #[test]
    fn test_backend_error_display() {
        let err = PlaybackError::StreamStop {
            source: backend("device busy"),
        };
        assert_eq!(err.to_string(), "failed to stop stream: mock: device busy");
    }

    #[test]
    fn test_then_keeps_first_cause_as_source() {
        let stop = PlaybackError::StreamStop {
            source: backend("stop"),
        };
        let terminate = PlaybackError::SubsystemTerminate {
            source: backend("terminate"),
        };
        let composed = stop.then(terminate);

        let source = std::error::Error::source(&composed).unwrap();
        assert!(source.to_string().contains("failed to stop stream"));
        assert!(composed.to_string().contains("failed to terminate"));
    }

    #[test]
    fn test_causes_are_ordered() {
        let mut pending = None;
        accumulate(&mut pending, PlaybackError::sink_write("a"));
        accumulate(&mut pending, PlaybackError::sink_write("b"));
        accumulate(&mut pending, PlaybackError::sink_write("c"));

        let err = pending.unwrap();
        let reasons: Vec<String> = err.causes().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            reasons,
            vec![
                "sink write failed: a",
                "sink write failed: b",
                "sink write failed: c"
            ]
        );
    }

    #[test]
    fn test_chain_without_pending_is_identity() {
        let err = PlaybackError::chain(None, PlaybackError::invalid_config("channels"));
        assert!(matches!(err, PlaybackError::InvalidConfig { .. }));
    }

    #[test]
    fn test_is_device_not_found_looks_through_compound() {
        let err = PlaybackError::DeviceNotFound {
            device: DeviceDescriptor::default_output(),
        }
        .then(PlaybackError::SubsystemTerminate {
            source: backend("terminate"),
        });
        assert!(err.is_device_not_found());
        assert!(!PlaybackError::sink_write("x").is_device_not_found());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = PlaybackError::InvalidState {
            operation: "start",
            state: StreamState::Closed,
        };
        assert_eq!(err.to_string(), "cannot start stream in state closed");
    }
}
