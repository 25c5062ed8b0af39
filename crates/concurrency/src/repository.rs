//! Registries of live transactions
//!
//! The active registry holds every transaction known to this process. The
//! error registry holds the subset that still needs recovery work; the
//! periodic sweep walks it and a transaction leaves it when it is forgotten.
//!
//! Both registries are keyed by global xid. The error registry is ordered so
//! that a sweep visits transactions in a deterministic order regardless of
//! the order in which they were registered.
//!
//! # Locking
//!
//! `put_transaction` and `put_error_transaction` briefly lock the transaction
//! to read its xid, so they must not be called while the caller holds that
//! lock. Removal and lookup never touch the transaction's lock.

use crate::transaction::Transaction;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tandem_core::TransactionXid;

/// A transaction shared between the registries and the recovery engine
pub type SharedTransaction = Arc<Mutex<Transaction>>;

/// Active and error registries
#[derive(Default)]
pub struct TransactionRepository {
    active: DashMap<TransactionXid, SharedTransaction>,
    errors: RwLock<BTreeMap<TransactionXid, SharedTransaction>>,
}

impl TransactionRepository {
    /// Create empty registries
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live transaction, returning any it replaced
    pub fn put_transaction(&self, transaction: SharedTransaction) -> Option<SharedTransaction> {
        let xid = key_of(&transaction);
        self.active.insert(xid, transaction)
    }

    /// Register a transaction as needing recovery, returning any it replaced
    pub fn put_error_transaction(&self, transaction: SharedTransaction) -> Option<SharedTransaction> {
        let xid = key_of(&transaction);
        self.errors.write().insert(xid, transaction)
    }

    /// Live transaction for a xid (branch qualifiers are ignored)
    pub fn get_transaction(&self, xid: &TransactionXid) -> Option<SharedTransaction> {
        self.active
            .get(&xid.global_xid())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Transaction awaiting recovery for a xid
    pub fn get_error_transaction(&self, xid: &TransactionXid) -> Option<SharedTransaction> {
        self.errors.read().get(&xid.global_xid()).cloned()
    }

    /// Drop a transaction from the active registry
    pub fn remove_transaction(&self, xid: &TransactionXid) -> Option<SharedTransaction> {
        self.active.remove(&xid.global_xid()).map(|(_, tx)| tx)
    }

    /// Drop a transaction from the error registry
    pub fn remove_error_transaction(&self, xid: &TransactionXid) -> Option<SharedTransaction> {
        self.errors.write().remove(&xid.global_xid())
    }

    /// Snapshot of the error registry, ordered by xid
    ///
    /// The snapshot is detached: transactions forgotten while it is being
    /// walked stay in it, and their lock can still be taken.
    pub fn error_transactions(&self) -> Vec<SharedTransaction> {
        self.errors.read().values().cloned().collect()
    }

    /// Number of live transactions
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of transactions awaiting recovery
    pub fn error_count(&self) -> usize {
        self.errors.read().len()
    }
}

fn key_of(transaction: &SharedTransaction) -> TransactionXid {
    transaction.lock().xid().global_xid()
}

impl std::fmt::Debug for TransactionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRepository")
            .field("active", &self.active_count())
            .field("errors", &self.error_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::StaticResourceResolver;
    use crate::transaction::TransactionServices;
    use tandem_core::{DefaultXidFactory, TransactionContext, XidFactory};
    use tandem_durability::MemoryTransactionLog;

    fn shared(xid: TransactionXid) -> SharedTransaction {
        let services = Arc::new(TransactionServices::new(
            Arc::new(MemoryTransactionLog::new()),
            Arc::new(StaticResourceResolver::new()),
        ));
        Arc::new(Mutex::new(Transaction::new(
            TransactionContext::coordinator(xid),
            services,
        )))
    }

    fn xid(byte: u8) -> TransactionXid {
        DefaultXidFactory.create_global_xid(&[byte; 8]).unwrap()
    }

    #[test]
    fn test_put_get_remove() {
        let repository = TransactionRepository::new();
        let a = xid(1);
        repository.put_transaction(shared(a.clone()));
        repository.put_error_transaction(shared(a.clone()));

        assert_eq!(repository.active_count(), 1);
        assert_eq!(repository.error_count(), 1);
        assert!(repository.get_transaction(&a).is_some());

        // lookups by branch xid resolve to the global entry
        let branch = DefaultXidFactory.create_branch_xid(&a);
        assert!(repository.get_error_transaction(&branch).is_some());

        assert!(repository.remove_error_transaction(&a).is_some());
        assert!(repository.remove_error_transaction(&a).is_none());
        assert!(repository.remove_transaction(&a).is_some());
        assert_eq!(repository.active_count(), 0);
    }

    #[test]
    fn test_put_replaces_same_xid() {
        let repository = TransactionRepository::new();
        assert!(repository.put_error_transaction(shared(xid(1))).is_none());
        assert!(repository.put_error_transaction(shared(xid(1))).is_some());
        assert_eq!(repository.error_count(), 1);
    }

    #[test]
    fn test_error_snapshot_is_ordered() {
        let repository = TransactionRepository::new();
        for byte in [9u8, 3, 7, 1] {
            repository.put_error_transaction(shared(xid(byte)));
        }
        let order: Vec<u8> = repository
            .error_transactions()
            .iter()
            .map(|tx| tx.lock().xid().global_transaction_id()[0])
            .collect();
        assert_eq!(order, vec![1, 3, 7, 9]);
    }
}
