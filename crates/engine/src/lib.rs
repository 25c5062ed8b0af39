//! Recovery engine for tandem
//!
//! This crate ties the lower layers together:
//! - Reconstruction: archive -> live transaction
//! - Decision table: (role, status) -> recovery action
//! - Orchestration: startup recovery and periodic sweeps
//! - Readiness signaling to the coordination layer
//! - Background daemon and its configuration
//!
//! The engine decides *that* a transaction must be committed, rolled back or
//! forgotten; the transaction itself carries the action out against its
//! resources.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod decision;
pub mod reconstruct;
pub mod recovery;

pub use config::{RecoveryConfig, CONFIG_FILE_NAME, DEFAULT_SWEEP_INTERVAL_MS};
pub use coordinator::{ReadinessGate, TransactionCoordinator};
pub use daemon::{RecoveryDaemon, DAEMON_THREAD_NAME};
pub use decision::{decide, RecoveryAction};
pub use reconstruct::reconstruct_transaction;
pub use recovery::{
    StartupReport, SweepReport, TransactionRecovery, TransactionRecoveryListener,
};
