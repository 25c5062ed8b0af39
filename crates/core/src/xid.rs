//! Transaction identifiers
//!
//! A [`TransactionXid`] follows the X/Open XA layout: a format id, a global
//! transaction id and a branch qualifier. A global xid has an empty branch
//! qualifier; a branch xid shares the global id of its transaction.
//!
//! Xids are produced by an [`XidFactory`]. During recovery only the global
//! portion of an archived xid is trusted, so the factory rebuilds it from the
//! raw global id and never restores a branch qualifier.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Format id written into every xid created by this transaction manager
pub const DEFAULT_FORMAT_ID: i32 = 1207;

/// XA transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionXid {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl TransactionXid {
    /// Maximum length for the global transaction id
    pub const MAX_GTRID_SIZE: usize = 64;
    /// Maximum length for the branch qualifier
    pub const MAX_BQUAL_SIZE: usize = 64;

    /// Create an xid, validating component sizes
    ///
    /// # Errors
    /// Returns `InvalidState` if the global id is empty or either component
    /// exceeds its maximum size.
    pub fn new(format_id: i32, global_transaction_id: &[u8], branch_qualifier: &[u8]) -> Result<Self> {
        if global_transaction_id.is_empty() {
            return Err(Error::invalid_state("global transaction id is empty"));
        }
        if global_transaction_id.len() > Self::MAX_GTRID_SIZE {
            return Err(Error::invalid_state(format!(
                "global transaction id exceeds {} bytes",
                Self::MAX_GTRID_SIZE
            )));
        }
        if branch_qualifier.len() > Self::MAX_BQUAL_SIZE {
            return Err(Error::invalid_state(format!(
                "branch qualifier exceeds {} bytes",
                Self::MAX_BQUAL_SIZE
            )));
        }
        Ok(Self {
            format_id,
            global_transaction_id: global_transaction_id.to_vec(),
            branch_qualifier: branch_qualifier.to_vec(),
        })
    }

    /// Returns the format identifier
    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    /// Returns the global transaction identifier
    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    /// Returns the branch qualifier (empty for a global xid)
    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }

    /// True if this xid identifies a whole global transaction
    pub fn is_global(&self) -> bool {
        self.branch_qualifier.is_empty()
    }

    /// Global xid of the transaction this xid belongs to
    pub fn global_xid(&self) -> TransactionXid {
        Self {
            format_id: self.format_id,
            global_transaction_id: self.global_transaction_id.clone(),
            branch_qualifier: Vec::new(),
        }
    }

    /// Lowercase hex form of the global transaction id
    pub fn global_hex(&self) -> String {
        to_hex(&self.global_transaction_id)
    }

    /// Lowercase hex form of the branch qualifier
    pub fn branch_hex(&self) -> String {
        to_hex(&self.branch_qualifier)
    }
}

impl fmt::Display for TransactionXid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "{}", self.global_hex())
        } else {
            write!(f, "{}:{}", self.global_hex(), self.branch_hex())
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Produces transaction identifiers
pub trait XidFactory: Send + Sync {
    /// Rebuild a global xid from a raw global transaction id
    fn create_global_xid(&self, global_transaction_id: &[u8]) -> Result<TransactionXid>;

    /// Generate a fresh global xid
    fn generate_global_xid(&self) -> TransactionXid;

    /// Generate a fresh branch xid under `global`
    fn create_branch_xid(&self, global: &TransactionXid) -> TransactionXid;
}

/// UUID-backed [`XidFactory`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultXidFactory;

impl XidFactory for DefaultXidFactory {
    fn create_global_xid(&self, global_transaction_id: &[u8]) -> Result<TransactionXid> {
        TransactionXid::new(DEFAULT_FORMAT_ID, global_transaction_id, &[])
    }

    fn generate_global_xid(&self) -> TransactionXid {
        TransactionXid {
            format_id: DEFAULT_FORMAT_ID,
            global_transaction_id: Uuid::new_v4().as_bytes().to_vec(),
            branch_qualifier: Vec::new(),
        }
    }

    fn create_branch_xid(&self, global: &TransactionXid) -> TransactionXid {
        TransactionXid {
            format_id: global.format_id,
            global_transaction_id: global.global_transaction_id.clone(),
            branch_qualifier: Uuid::new_v4().as_bytes().to_vec(),
        }
    }
}
