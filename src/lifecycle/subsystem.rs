//! Reference-counted ownership of the native subsystem.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::AudioBackend;
use crate::lifecycle::StreamState;
use crate::PlaybackError;

/// Single owner of a backend's global initialize/terminate pairing.
///
/// Every sink, enumeration or resolution that needs the native subsystem
/// calls [`acquire`](Subsystem::acquire) and later [`release`](Subsystem::release).
/// The backend is initialized on the first acquire and terminated on the last
/// release, so several sinks can share one process-wide subsystem without
/// double-terminating it.
pub struct Subsystem<B: AudioBackend> {
    backend: B,
    refs: Mutex<usize>,
}

impl<B: AudioBackend> Subsystem<B> {
    /// Wraps a backend. Nothing is initialized until the first acquire.
    pub fn new(backend: B) -> Arc<Self> {
        Arc::new(Self {
            backend,
            refs: Mutex::new(0),
        })
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of outstanding acquisitions.
    pub fn ref_count(&self) -> usize {
        *self.refs.lock()
    }

    /// Returns `true` while at least one acquisition is outstanding.
    pub fn is_initialized(&self) -> bool {
        self.ref_count() > 0
    }

    /// Takes a reference, initializing the backend if this is the first one.
    pub fn acquire(&self) -> Result<(), PlaybackError> {
        let mut refs = self.refs.lock();
        if *refs == 0 {
            self.backend
                .initialize()
                .map_err(|source| PlaybackError::SubsystemInit { source })?;
            tracing::debug!(backend = self.backend.name(), "audio subsystem initialized");
        }
        *refs += 1;
        Ok(())
    }

    /// Drops a reference, terminating the backend when it was the last one.
    ///
    /// The reference is released even if terminate fails, so each successful
    /// acquire is matched by exactly one decrement.
    pub fn release(&self) -> Result<(), PlaybackError> {
        let mut refs = self.refs.lock();
        match *refs {
            0 => Err(PlaybackError::InvalidState {
                operation: "terminate",
                state: StreamState::Uninitialized,
            }),
            1 => {
                *refs = 0;
                self.backend
                    .terminate()
                    .map_err(|source| PlaybackError::SubsystemTerminate { source })?;
                tracing::debug!(backend = self.backend.name(), "audio subsystem terminated");
                Ok(())
            }
            n => {
                *refs = n - 1;
                Ok(())
            }
        }
    }

    /// Runs `f` inside an acquire/release bracket.
    ///
    /// A release failure is composed onto a failure from `f`, or reported on
    /// its own if `f` succeeded.
    pub fn with_bracket<T>(
        &self,
        f: impl FnOnce(&B) -> Result<T, PlaybackError>,
    ) -> Result<T, PlaybackError> {
        self.acquire()?;
        let result = f(&self.backend);
        match (result, self.release()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release)) => Err(release),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release)) => Err(err.then(release)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockOperation};

    #[test]
    fn test_nested_acquire_initializes_once() {
        let subsystem = Subsystem::new(MockBackend::speakers());

        subsystem.acquire().unwrap();
        subsystem.acquire().unwrap();
        assert_eq!(subsystem.ref_count(), 2);
        assert_eq!(subsystem.backend().initialize_calls(), 1);

        subsystem.release().unwrap();
        assert_eq!(subsystem.backend().terminate_calls(), 0);
        subsystem.release().unwrap();
        assert_eq!(subsystem.backend().terminate_calls(), 1);
        assert_eq!(subsystem.ref_count(), 0);
    }

    #[test]
    fn test_release_without_acquire() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        let err = subsystem.release().unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidState { .. }));
    }

    #[test]
    fn test_failed_initialize_takes_no_reference() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        subsystem.backend().fail(MockOperation::Initialize);

        let err = subsystem.acquire().unwrap_err();
        assert!(matches!(err, PlaybackError::SubsystemInit { .. }));
        assert_eq!(subsystem.ref_count(), 0);
    }

    #[test]
    fn test_failed_terminate_still_decrements() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        subsystem.acquire().unwrap();
        subsystem.backend().fail(MockOperation::Terminate);

        let err = subsystem.release().unwrap_err();
        assert!(matches!(err, PlaybackError::SubsystemTerminate { .. }));
        assert_eq!(subsystem.ref_count(), 0);
        assert_eq!(subsystem.backend().active_initializations(), 0);
    }

    #[test]
    fn test_bracket_composes_release_failure() {
        let subsystem = Subsystem::new(MockBackend::speakers());
        subsystem.backend().fail(MockOperation::Terminate);

        let err = subsystem
            .with_bracket(|_| -> Result<(), PlaybackError> {
                Err(PlaybackError::sink_write("inner"))
            })
            .unwrap_err();

        let causes = err.causes();
        assert_eq!(causes.len(), 2);
        assert!(matches!(causes[0], PlaybackError::SinkWrite { .. }));
        assert!(matches!(causes[1], PlaybackError::SubsystemTerminate { .. }));
        assert_eq!(subsystem.ref_count(), 0);
    }
}
