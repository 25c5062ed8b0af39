//! Durable transaction log contract

use tandem_core::{Result, TransactionArchive};

/// Lazy, finite sequence of archives drained from a log
pub type ArchiveIter<'a> = Box<dyn Iterator<Item = TransactionArchive> + 'a>;

/// Durable store of transaction archives
///
/// One archive is kept per global transaction, keyed by its global xid.
/// Writes replace the previous archive for the same transaction.
///
/// # Thread Safety
///
/// Loggers are shared between live transactions and the recovery engine,
/// so implementations must be `Send + Sync` and synchronize internally.
pub trait TransactionLogger: Send + Sync {
    /// Persist the first archive of a transaction
    fn create_transaction(&self, archive: &TransactionArchive) -> Result<()>;

    /// Persist a new snapshot of an existing transaction
    fn update_transaction(&self, archive: &TransactionArchive) -> Result<()>;

    /// Purge the archive of a transaction
    ///
    /// Deleting an archive that is not present is not an error.
    fn delete_transaction(&self, archive: &TransactionArchive) -> Result<()>;

    /// Stream every persisted archive
    ///
    /// The order is unspecified. Each call starts a fresh pass; records
    /// that cannot be decoded are skipped and reported by the implementation.
    fn archives(&self) -> Result<ArchiveIter<'_>>;
}
