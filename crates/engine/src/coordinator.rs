//! Coordination layer contract
//!
//! Imported transactions must not be served until startup recovery has
//! rebuilt every archived one, otherwise a remote coordinator could ask
//! about a branch this process has not reloaded yet. Startup recovery
//! signals the coordination layer once through
//! [`TransactionCoordinator::mark_participant_ready`].

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Receives the readiness signal from startup recovery
pub trait TransactionCoordinator: Send + Sync {
    /// The log has been drained; participant requests may be served
    fn mark_participant_ready(&self);
}

/// [`TransactionCoordinator`] that lets other threads block until ready
///
/// # Example
///
/// ```ignore
/// let gate = Arc::new(ReadinessGate::new());
/// // hand `gate.clone()` to TransactionRecovery, then elsewhere:
/// gate.wait_ready(Duration::from_secs(30));
/// ```
#[derive(Debug, Default)]
pub struct ReadinessGate {
    ready: Mutex<bool>,
    changed: Condvar,
}

impl ReadinessGate {
    /// Create a gate in the not-ready state
    pub fn new() -> Self {
        Self::default()
    }

    /// True once readiness has been signaled
    pub fn is_ready(&self) -> bool {
        *self.ready.lock()
    }

    /// Block until ready or until `timeout` elapses
    ///
    /// Returns whether the gate is ready.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.lock();
        while !*ready {
            if self.changed.wait_until(&mut ready, deadline).timed_out() {
                break;
            }
        }
        *ready
    }
}

impl TransactionCoordinator for ReadinessGate {
    fn mark_participant_ready(&self) {
        let mut ready = self.ready.lock();
        if !*ready {
            *ready = true;
            info!(target: "tandem::recovery", "Participant requests enabled");
        }
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_gate_starts_closed() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_ready());
        assert!(!gate.wait_ready(Duration::from_millis(10)));
    }

    #[test]
    fn test_waiters_released_on_signal() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_ready(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        gate.mark_participant_ready();
        assert!(waiter.join().unwrap());
        assert!(gate.is_ready());
    }
}
