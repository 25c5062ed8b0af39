//! Recovery decision table
//!
//! Maps a transaction's role and last known status to the action recovery
//! takes on it. A coordinator only ever moves forward with a decision it
//! already made (Prepared or Committing means commit). A participant never
//! commits on its own: anything short of a prepared or terminal state is
//! rolled back, and prepared branches wait for their coordinator.

use tandem_core::{Role, TransactionStatus};

/// What recovery does with one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryAction {
    /// Nothing this pass
    Wait,
    /// Commit every branch, then forget the transaction
    CommitAndForget,
    /// Outcome already reached; only forget
    Forget,
    /// Roll back every branch, then forget the transaction
    RollbackAndForget,
    /// Transaction already completed and forgotten
    AlreadyCompleted,
}

/// Decide the action for a transaction
pub fn decide(role: Role, status: TransactionStatus) -> RecoveryAction {
    use TransactionStatus::*;

    match role {
        Role::Coordinator => match status {
            Active | MarkedRollback | Preparing | RollingBack | Unknown => RecoveryAction::Wait,
            Prepared | Committing => RecoveryAction::CommitAndForget,
            Committed | RolledBack => RecoveryAction::Forget,
            Completed => RecoveryAction::AlreadyCompleted,
        },
        Role::Participant => match status {
            Prepared | Committing | Committed | RolledBack => RecoveryAction::Wait,
            _ => RecoveryAction::RollbackAndForget,
        },
    }
}
