//! Transaction status, vote and role
//!
//! Statuses are persisted as their numeric code, which follows the JTA
//! `Status` numbering.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a global transaction in the 2PC lifecycle
///
/// ```text
/// Active -> Preparing -> Prepared -> Committing -> Committed
///        \-> MarkedRollback        \-> RollingBack -> RolledBack
/// ```
///
/// `Completed` is the "no transaction" slot: nothing is left to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TransactionStatus {
    /// Transaction is executing
    Active,
    /// Transaction may only roll back
    MarkedRollback,
    /// All branches voted, outcome not yet decided
    Prepared,
    /// Commit finished on every branch
    Committed,
    /// Rollback finished on every branch
    RolledBack,
    /// Outcome cannot be determined
    Unknown,
    /// No transaction state remains
    Completed,
    /// Prepare phase in progress
    Preparing,
    /// Commit decided, second phase in progress
    Committing,
    /// Rollback in progress
    RollingBack,
}

impl TransactionStatus {
    /// Every status, in code order
    pub const ALL: [TransactionStatus; 10] = [
        TransactionStatus::Active,
        TransactionStatus::MarkedRollback,
        TransactionStatus::Prepared,
        TransactionStatus::Committed,
        TransactionStatus::RolledBack,
        TransactionStatus::Unknown,
        TransactionStatus::Completed,
        TransactionStatus::Preparing,
        TransactionStatus::Committing,
        TransactionStatus::RollingBack,
    ];

    /// Stable numeric code
    pub fn code(self) -> u8 {
        match self {
            TransactionStatus::Active => 0,
            TransactionStatus::MarkedRollback => 1,
            TransactionStatus::Prepared => 2,
            TransactionStatus::Committed => 3,
            TransactionStatus::RolledBack => 4,
            TransactionStatus::Unknown => 5,
            TransactionStatus::Completed => 6,
            TransactionStatus::Preparing => 7,
            TransactionStatus::Committing => 8,
            TransactionStatus::RollingBack => 9,
        }
    }

    /// Decode a numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// True once the outcome has been applied on every branch
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::RolledBack
        )
    }
}

impl From<TransactionStatus> for u8 {
    fn from(status: TransactionStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for TransactionStatus {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        Self::from_code(code)
            .ok_or_else(|| Error::Serialization(format!("unknown transaction status code {}", code)))
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Active => "active",
            TransactionStatus::MarkedRollback => "marked-rollback",
            TransactionStatus::Prepared => "prepared",
            TransactionStatus::Committed => "committed",
            TransactionStatus::RolledBack => "rolled-back",
            TransactionStatus::Unknown => "unknown",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Preparing => "preparing",
            TransactionStatus::Committing => "committing",
            TransactionStatus::RollingBack => "rolling-back",
        };
        f.write_str(name)
    }
}

/// A branch's (or the transaction's) answer to prepare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    /// Ready to commit
    Commit,
    /// Must roll back
    Rollback,
    /// Nothing changed, no second phase needed
    ReadOnly,
}

/// Role of this process in a global transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Originated the transaction and owns the outcome
    Coordinator,
    /// Executes a branch and awaits the coordinator's decision
    Participant,
}

impl Role {
    /// Role for a coordinator flag
    pub fn from_coordinator_flag(coordinator: bool) -> Self {
        if coordinator {
            Role::Coordinator
        } else {
            Role::Participant
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Participant => f.write_str("participant"),
        }
    }
}
