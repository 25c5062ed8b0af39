//! Background recovery daemon
//!
//! Runs [`TransactionRecovery::timing_recover`] on a fixed interval in one
//! named thread. Shutdown wakes the thread immediately and joins it; a sweep
//! already in progress is allowed to finish.

use crate::config::RecoveryConfig;
use crate::recovery::TransactionRecovery;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tandem_core::Result;
use tracing::{debug, info};

/// Name of the daemon thread
pub const DAEMON_THREAD_NAME: &str = "tandem-recovery";

struct DaemonInner {
    shutdown: Mutex<bool>,
    wake: Condvar,
    sweeps: AtomicU64,
}

/// Periodic sweep driver
pub struct RecoveryDaemon {
    inner: Arc<DaemonInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RecoveryDaemon {
    /// Validate `config` and spawn the sweep thread
    pub fn start(recovery: Arc<TransactionRecovery>, config: &RecoveryConfig) -> Result<Self> {
        config.validate()?;
        let inner = Arc::new(DaemonInner {
            shutdown: Mutex::new(false),
            wake: Condvar::new(),
            sweeps: AtomicU64::new(0),
        });

        let interval = config.sweep_interval();
        let sweep_on_start = config.sweep_on_start;
        let thread_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(DAEMON_THREAD_NAME.to_string())
            .spawn(move || sweep_loop(&thread_inner, &recovery, interval, sweep_on_start))?;

        info!(
            target: "tandem::recovery",
            interval_ms = config.sweep_interval_ms,
            "Recovery daemon started"
        );
        Ok(Self {
            inner,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Number of sweeps completed so far
    pub fn sweeps(&self) -> u64 {
        self.inner.sweeps.load(Ordering::Acquire)
    }

    /// True until [`RecoveryDaemon::shutdown`] has joined the thread
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Stop the sweep thread and wait for it to exit
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        {
            let mut shutdown = self.inner.shutdown.lock();
            *shutdown = true;
            self.inner.wake.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
            info!(target: "tandem::recovery", sweeps = self.sweeps(), "Recovery daemon stopped");
        }
    }
}

impl Drop for RecoveryDaemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RecoveryDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryDaemon")
            .field("running", &self.is_running())
            .field("sweeps", &self.sweeps())
            .finish()
    }
}

fn sweep_loop(
    inner: &DaemonInner,
    recovery: &TransactionRecovery,
    interval: Duration,
    sweep_on_start: bool,
) {
    if sweep_on_start {
        sweep(inner, recovery);
    }
    loop {
        {
            let deadline = Instant::now() + interval;
            let mut shutdown = inner.shutdown.lock();
            while !*shutdown {
                if inner.wake.wait_until(&mut shutdown, deadline).timed_out() {
                    break;
                }
            }
            if *shutdown {
                return;
            }
        }
        sweep(inner, recovery);
    }
}

fn sweep(inner: &DaemonInner, recovery: &TransactionRecovery) {
    let report = recovery.timing_recover();
    let count = inner.sweeps.fetch_add(1, Ordering::AcqRel) + 1;
    debug!(
        target: "tandem::recovery",
        sweep = count,
        total = report.total,
        success = report.success,
        "Daemon sweep finished"
    );
}
