//! Runtime events for monitoring playback health.
//!
//! Events are non-fatal notifications. Playback continues after an event is
//! emitted; they're for logging and metrics, not error handling. Events are
//! never emitted from the realtime callback: underruns are counted there and
//! reported from the writing thread on the next `write`.

use std::sync::Arc;

/// Runtime events emitted during playback.
///
/// # Example
///
/// ```
/// use stream_playback::PlaybackEvent;
///
/// fn handle_event(event: PlaybackEvent) {
///     match event {
///         PlaybackEvent::Underrun { count, total } => {
///             eprintln!("{} period(s) padded with silence ({} total)", count, total);
///         }
///         PlaybackEvent::BackendError { reason } => {
///             eprintln!("Backend error: {}", reason);
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The hardware asked for samples before the next buffer was written.
    ///
    /// The missing part of each affected period was played as silence.
    /// Occasional underruns at startup or under load are expected.
    Underrun {
        /// Underruns since the previous `Underrun` event.
        count: u64,
        /// Underruns since the stream started.
        total: u64,
    },

    /// The backend reported an error on the running stream.
    ///
    /// The stream is treated as faulted; the next `write` or `flush` fails.
    BackendError {
        /// The backend's description of the error.
        reason: String,
    },
}

/// Callback for receiving runtime events.
///
/// Called synchronously from the writing thread or the backend's error
/// thread. Keep it fast; long work should be handed off to another thread.
pub type EventCallback = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// This is a convenience function for creating event callbacks without
/// manually wrapping in `Arc`.
///
/// # Example
///
/// ```
/// use stream_playback::{event_callback, PlaybackEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PlaybackEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_event_debug() {
        let event = PlaybackEvent::Underrun { count: 2, total: 7 };
        let debug = format!("{:?}", event);
        assert!(debug.contains("Underrun"));
        assert!(debug.contains('7'));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let seen = Arc::new(AtomicU64::new(0));
        let seen_clone = seen.clone();

        let callback = event_callback(move |event| {
            if let PlaybackEvent::Underrun { total, .. } = event {
                seen_clone.store(total, Ordering::SeqCst);
            }
        });

        callback(PlaybackEvent::Underrun { count: 1, total: 3 });
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
