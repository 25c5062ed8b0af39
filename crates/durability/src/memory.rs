//! Volatile transaction log
//!
//! Keeps archives in memory. Nothing survives the process, so this log is
//! only useful for embedding without durability and for tests, where the
//! purge history exposed by [`MemoryTransactionLog::deleted`] lets callers
//! verify exactly which archives were removed.
//!
//! Records are keyed by the raw global transaction id, as the file log
//! names its records, so the format id of an archived xid never splits one
//! transaction into two records.

use crate::log::{ArchiveIter, TransactionLogger};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use tandem_core::{Result, TransactionArchive, TransactionXid};

/// In-memory [`TransactionLogger`]
#[derive(Debug, Default)]
pub struct MemoryTransactionLog {
    archives: RwLock<BTreeMap<Vec<u8>, TransactionArchive>>,
    deleted: Mutex<Vec<TransactionArchive>>,
}

impl MemoryTransactionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log pre-populated with `archives`
    pub fn with_archives(archives: impl IntoIterator<Item = TransactionArchive>) -> Self {
        let log = Self::new();
        {
            let mut map = log.archives.write();
            for archive in archives {
                map.insert(record_key(&archive.xid), archive);
            }
        }
        log
    }

    /// Current archive for a global xid
    pub fn get(&self, xid: &TransactionXid) -> Option<TransactionArchive> {
        self.archives.read().get(&record_key(xid)).cloned()
    }

    /// Number of archives held
    pub fn len(&self) -> usize {
        self.archives.read().len()
    }

    /// True if no archives are held
    pub fn is_empty(&self) -> bool {
        self.archives.read().is_empty()
    }

    /// Every archive passed to `delete_transaction`, in call order
    pub fn deleted(&self) -> Vec<TransactionArchive> {
        self.deleted.lock().clone()
    }

    fn store(&self, archive: &TransactionArchive) {
        self.archives
            .write()
            .insert(record_key(&archive.xid), archive.clone());
    }
}

fn record_key(xid: &TransactionXid) -> Vec<u8> {
    xid.global_transaction_id().to_vec()
}

impl TransactionLogger for MemoryTransactionLog {
    fn create_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        self.store(archive);
        Ok(())
    }

    fn update_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        self.store(archive);
        Ok(())
    }

    fn delete_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        self.archives.write().remove(&record_key(&archive.xid));
        self.deleted.lock().push(archive.clone());
        Ok(())
    }

    fn archives(&self) -> Result<ArchiveIter<'_>> {
        let snapshot: Vec<TransactionArchive> = self.archives.read().values().cloned().collect();
        Ok(Box::new(snapshot.into_iter()))
    }
}
