//! Transaction recovery orchestrator
//!
//! Two entry points drive recovery:
//!
//! 1. [`TransactionRecovery::start_recovery`] runs once at startup. It drains
//!    the durable log, rebuilds every archived transaction and registers it
//!    as both active and in need of recovery. Archives that can never be
//!    resumed are purged. When the log is drained the coordination layer is
//!    told that participant requests may be served.
//! 2. [`TransactionRecovery::timing_recover`] runs periodically. It walks the
//!    error registry and applies [`decide`] to each transaction. A failure
//!    on one transaction never stops the sweep; the transaction stays in the
//!    error registry and is retried on the next pass.
//!
//! Both entry points hold the same lock, so a sweep never observes a
//! half-populated registry.

use crate::coordinator::TransactionCoordinator;
use crate::decision::{decide, RecoveryAction};
use crate::reconstruct::reconstruct_transaction;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tandem_concurrency::{
    RoleBehavior, SharedTransaction, Transaction, TransactionRepository, TransactionServices,
};
use tandem_core::{Error, ErrorKind, Result, XidFactory};
use tracing::{debug, info, trace, warn};

/// Observer of transactions rebuilt during startup recovery
pub trait TransactionRecoveryListener: Send + Sync {
    /// Called once per reconstructed transaction, before it is registered
    fn on_recovery(&self, transaction: &Transaction);
}

/// Outcome of startup recovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Transactions rebuilt and registered
    pub recovered: usize,
    /// Unusable archives deleted from the log
    pub purged: usize,
    /// Archives left in the log after an unexpected failure
    pub skipped: usize,
}

/// Outcome of one periodic sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Transactions visited
    pub total: usize,
    /// Transactions processed without error
    pub success: usize,
}

impl SweepReport {
    /// Transactions that failed and remain for the next sweep
    pub fn failed(&self) -> usize {
        self.total - self.success
    }
}

/// Drives in-doubt transactions to a terminal outcome
pub struct TransactionRecovery {
    services: Arc<TransactionServices>,
    repository: Arc<TransactionRepository>,
    xid_factory: Arc<dyn XidFactory>,
    coordinator: Arc<dyn TransactionCoordinator>,
    listener: Option<Arc<dyn TransactionRecoveryListener>>,
    /// Serializes startup recovery and sweeps
    lock: Mutex<()>,
}

impl TransactionRecovery {
    /// Create an orchestrator over the given collaborators
    pub fn new(
        services: Arc<TransactionServices>,
        repository: Arc<TransactionRepository>,
        xid_factory: Arc<dyn XidFactory>,
        coordinator: Arc<dyn TransactionCoordinator>,
    ) -> Self {
        Self {
            services,
            repository,
            xid_factory,
            coordinator,
            listener: None,
            lock: Mutex::new(()),
        }
    }

    /// Builder: observe transactions rebuilt at startup
    pub fn with_listener(mut self, listener: Arc<dyn TransactionRecoveryListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Installed listener, if any
    pub fn listener(&self) -> Option<&Arc<dyn TransactionRecoveryListener>> {
        self.listener.as_ref()
    }

    /// Registries populated by startup recovery
    pub fn repository(&self) -> &Arc<TransactionRepository> {
        &self.repository
    }

    /// Shared log and resource resolver
    pub fn services(&self) -> &Arc<TransactionServices> {
        &self.services
    }

    /// Rebuild every archived transaction and register it
    ///
    /// # Errors
    ///
    /// Only a failure to read the log escapes; readiness is not signaled in
    /// that case. Failures of individual archives are logged and counted.
    pub fn start_recovery(&self) -> Result<StartupReport> {
        let _guard = self.lock.lock();
        let logger = Arc::clone(self.services.logger());
        let mut report = StartupReport::default();

        for archive in logger.archives()? {
            let rebuilt = reconstruct_transaction(
                &archive,
                self.xid_factory.as_ref(),
                Arc::clone(&self.services),
            );
            match rebuilt {
                Ok(transaction) => {
                    if let Some(listener) = &self.listener {
                        listener.on_recovery(&transaction);
                    }
                    let shared: SharedTransaction = Arc::new(Mutex::new(transaction));
                    self.repository.put_transaction(Arc::clone(&shared));
                    self.repository.put_error_transaction(shared);
                    report.recovered += 1;
                }
                Err(e) if e.kind() == ErrorKind::InvalidState => {
                    warn!(
                        target: "tandem::recovery",
                        gtrid = %archive.xid.global_hex(),
                        error = %e,
                        "Purging unrecoverable transaction record"
                    );
                    match logger.delete_transaction(&archive) {
                        Ok(()) => report.purged += 1,
                        Err(purge) => {
                            warn!(
                                target: "tandem::recovery",
                                gtrid = %archive.xid.global_hex(),
                                error = %purge,
                                "Failed to purge transaction record"
                            );
                            report.skipped += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        target: "tandem::recovery",
                        gtrid = %archive.xid.global_hex(),
                        error = %e,
                        "Failed to reconstruct transaction"
                    );
                    report.skipped += 1;
                }
            }
        }

        self.coordinator.mark_participant_ready();
        info!(
            target: "tandem::recovery",
            recovered = report.recovered,
            purged = report.purged,
            skipped = report.skipped,
            "Startup recovery complete"
        );
        Ok(report)
    }

    /// Run one pass over the error registry
    ///
    /// Every error, and any panic raised by a resource, is confined to the
    /// transaction it came from.
    pub fn timing_recover(&self) -> SweepReport {
        let _guard = self.lock.lock();
        let transactions = self.repository.error_transactions();
        let mut report = SweepReport {
            total: transactions.len(),
            success: 0,
        };

        for shared in transactions {
            let (gtrid, bqual) = {
                let transaction = shared.lock();
                (transaction.xid().global_hex(), transaction.xid().branch_hex())
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut transaction = shared.lock();
                if transaction.is_forgotten() {
                    return Ok(RecoveryAction::AlreadyCompleted);
                }
                self.recover_transaction(&mut transaction)
            }));

            match outcome {
                Ok(Ok(_)) => report.success += 1,
                Ok(Err(e)) => debug!(
                    target: "tandem::recovery",
                    gtrid = %gtrid,
                    bqual = %bqual,
                    kind = ?e.kind(),
                    error = %e,
                    "Recovery attempt failed"
                ),
                Err(payload) => debug!(
                    target: "tandem::recovery",
                    gtrid = %gtrid,
                    bqual = %bqual,
                    panic = panic_message(payload.as_ref()),
                    "Recovery attempt panicked"
                ),
            }
        }

        debug!(
            target: "tandem::recovery",
            total = report.total,
            success = report.success,
            "Recovery sweep complete"
        );
        report
    }

    /// Resume one transaction and apply the decision table to it
    ///
    /// Returns the action that was taken. No retries happen here; a failed
    /// transaction is left as it is for the next sweep.
    pub fn recover_transaction(&self, transaction: &mut Transaction) -> Result<RecoveryAction> {
        transaction.recover()?;

        let action = decide(transaction.role(), transaction.status());
        let gtrid = transaction.xid().global_hex();
        let status = transaction.status();

        match (action, transaction.behavior()) {
            (RecoveryAction::CommitAndForget, RoleBehavior::Coordinator(mut coordinator)) => {
                coordinator.recovery_commit()?;
                coordinator.forget_quietly(&self.repository);
            }
            (RecoveryAction::Forget, RoleBehavior::Coordinator(mut coordinator)) => {
                coordinator.forget_quietly(&self.repository);
            }
            (RecoveryAction::RollbackAndForget, RoleBehavior::Participant(mut participant)) => {
                participant.recovery_rollback()?;
                participant.forget_quietly(&self.repository);
            }
            (RecoveryAction::Wait, _) => {
                trace!(target: "tandem::recovery", gtrid = %gtrid, status = %status, "Nothing to do this pass");
            }
            (RecoveryAction::AlreadyCompleted, _) => {
                debug!(target: "tandem::recovery", gtrid = %gtrid, "Transaction already completed");
            }
            (action, _) => {
                return Err(Error::fault(format!(
                    "action {:?} does not apply to transaction {} in status {}",
                    action, gtrid, status
                )));
            }
        }
        Ok(action)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("(non-string panic)")
}

impl std::fmt::Debug for TransactionRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRecovery")
            .field("repository", &self.repository)
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}
