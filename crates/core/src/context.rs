//! Per-transaction context

use crate::status::Role;
use crate::xid::TransactionXid;

/// Identity and provenance of one global transaction
///
/// Created once per transaction. Only the `recovered` flag may change after
/// construction, and it only ever flips from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    xid: TransactionXid,
    coordinator: bool,
    recovered: bool,
    propagated_by: Option<String>,
}

impl TransactionContext {
    /// Create a context for a transaction originated by this process
    pub fn coordinator(xid: TransactionXid) -> Self {
        Self {
            xid,
            coordinator: true,
            recovered: false,
            propagated_by: None,
        }
    }

    /// Create a context for a branch imported from another node
    ///
    /// A blank origin token is treated as absent.
    pub fn participant(xid: TransactionXid, propagated_by: Option<String>) -> Self {
        Self {
            xid,
            coordinator: false,
            recovered: false,
            propagated_by: normalize_origin(propagated_by),
        }
    }

    /// Create a context from archived fields
    pub fn new(xid: TransactionXid, coordinator: bool, propagated_by: Option<String>) -> Self {
        Self {
            xid,
            coordinator,
            recovered: false,
            propagated_by: normalize_origin(propagated_by),
        }
    }

    /// Global xid
    pub fn xid(&self) -> &TransactionXid {
        &self.xid
    }

    /// True if this process originated the transaction
    pub fn is_coordinator(&self) -> bool {
        self.coordinator
    }

    /// Role derived from the coordinator flag
    pub fn role(&self) -> Role {
        Role::from_coordinator_flag(self.coordinator)
    }

    /// True once rebuilt from the durable log
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Mark the context as rebuilt from the durable log
    pub fn mark_recovered(&mut self) {
        self.recovered = true;
    }

    /// Origin node token, if the transaction was imported
    pub fn propagated_by(&self) -> Option<&str> {
        self.propagated_by.as_deref()
    }
}

fn normalize_origin(origin: Option<String>) -> Option<String> {
    origin.filter(|o| !o.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xid::{DefaultXidFactory, XidFactory};

    #[test]
    fn test_coordinator_context() {
        let xid = DefaultXidFactory.generate_global_xid();
        let ctx = TransactionContext::coordinator(xid.clone());
        assert_eq!(ctx.xid(), &xid);
        assert!(ctx.is_coordinator());
        assert_eq!(ctx.role(), Role::Coordinator);
        assert!(!ctx.is_recovered());
        assert_eq!(ctx.propagated_by(), None);
    }

    #[test]
    fn test_participant_context_keeps_origin() {
        let xid = DefaultXidFactory.generate_global_xid();
        let ctx = TransactionContext::participant(xid, Some("node-a:8080".to_string()));
        assert_eq!(ctx.role(), Role::Participant);
        assert_eq!(ctx.propagated_by(), Some("node-a:8080"));
    }

    #[test]
    fn test_blank_origin_is_absent() {
        let xid = DefaultXidFactory.generate_global_xid();
        let ctx = TransactionContext::new(xid, false, Some("   ".to_string()));
        assert_eq!(ctx.propagated_by(), None);
    }

    #[test]
    fn test_mark_recovered() {
        let xid = DefaultXidFactory.generate_global_xid();
        let mut ctx = TransactionContext::coordinator(xid);
        ctx.mark_recovered();
        ctx.mark_recovered();
        assert!(ctx.is_recovered());
    }
}
