//! Durable snapshots of transactions
//!
//! A [`TransactionArchive`] is what the durable log stores for one global
//! transaction. It carries enough to rebuild a resumable transaction after a
//! restart: identity, role, last known status and vote, the completion
//! strategy, and one [`XaResourceArchive`] per participant branch.

use crate::error::Error;
use crate::resource::XaResourceDescriptor;
use crate::status::{TransactionStatus, Vote};
use crate::xid::TransactionXid;
use serde::{Deserialize, Serialize};

/// Selects the commit/rollback algorithm applied to a transaction
///
/// Persisted as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TransactionStrategyType {
    /// No participants; nothing to drive
    Vacant,
    /// Exactly one participant
    Simple,
    /// One optimized resource completed first, the rest by 2PC
    LastResourceOptimize,
    /// Plain two-phase commit
    Common,
}

impl TransactionStrategyType {
    /// Stable numeric code
    pub fn code(self) -> u8 {
        match self {
            TransactionStrategyType::Vacant => 0,
            TransactionStrategyType::Simple => 1,
            TransactionStrategyType::LastResourceOptimize => 2,
            TransactionStrategyType::Common => 3,
        }
    }

    /// Decode a numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TransactionStrategyType::Vacant),
            1 => Some(TransactionStrategyType::Simple),
            2 => Some(TransactionStrategyType::LastResourceOptimize),
            3 => Some(TransactionStrategyType::Common),
            _ => None,
        }
    }
}

impl From<TransactionStrategyType> for u8 {
    fn from(strategy: TransactionStrategyType) -> u8 {
        strategy.code()
    }
}

impl TryFrom<u8> for TransactionStrategyType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        Self::from_code(code)
            .ok_or_else(|| Error::Serialization(format!("unknown strategy code {}", code)))
    }
}

/// Persisted record of one participant branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XaResourceArchive {
    /// Participant identity
    pub descriptor: XaResourceDescriptor,
    /// Branch xid
    pub xid: TransactionXid,
    /// Prepare vote; `None` if the branch was never prepared
    pub vote: Option<Vote>,
    /// Branch committed
    pub committed: bool,
    /// Branch rolled back
    pub rolled_back: bool,
    /// Nothing left to do on this branch
    pub completed: bool,
    /// Resource completed the branch unilaterally and must forget it
    pub heuristic: bool,
}

impl XaResourceArchive {
    /// Record for a branch that has not been prepared yet
    pub fn new(descriptor: XaResourceDescriptor, xid: TransactionXid) -> Self {
        Self {
            descriptor,
            xid,
            vote: None,
            committed: false,
            rolled_back: false,
            completed: false,
            heuristic: false,
        }
    }

    /// Builder: set the prepare vote
    pub fn with_vote(mut self, vote: Vote) -> Self {
        self.vote = Some(vote);
        self
    }

    /// True if the branch voted read-only
    pub fn is_read_only(&self) -> bool {
        self.vote == Some(Vote::ReadOnly)
    }

    /// True if the branch has been prepared (any vote recorded)
    pub fn is_prepared(&self) -> bool {
        self.vote.is_some()
    }
}

/// Durable snapshot of one global transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionArchive {
    /// Xid as persisted; only its global id is trusted on recovery
    pub xid: TransactionXid,
    /// True if this process originated the transaction
    pub coordinator: bool,
    /// Origin node token for imported transactions
    pub propagated_by: Option<String>,
    /// Last known status
    pub status: TransactionStatus,
    /// Overall vote
    pub vote: Vote,
    /// Completion algorithm
    pub strategy: TransactionStrategyType,
    /// Participant singled out for one-phase completion
    pub optimized_resource: Option<XaResourceArchive>,
    /// Local resource-manager branches
    pub native_resources: Vec<XaResourceArchive>,
    /// Branches held by remote coordinators
    pub remote_resources: Vec<XaResourceArchive>,
}

impl TransactionArchive {
    /// Empty archive for `xid`
    pub fn new(xid: TransactionXid, coordinator: bool, status: TransactionStatus) -> Self {
        Self {
            xid,
            coordinator,
            propagated_by: None,
            status,
            vote: Vote::Commit,
            strategy: TransactionStrategyType::Vacant,
            optimized_resource: None,
            native_resources: Vec::new(),
            remote_resources: Vec::new(),
        }
    }

    /// Total number of participant records
    pub fn participant_count(&self) -> usize {
        usize::from(self.optimized_resource.is_some())
            + self.native_resources.len()
            + self.remote_resources.len()
    }

    /// All participant records, optimized first, then native, then remote
    pub fn participants(&self) -> impl Iterator<Item = &XaResourceArchive> {
        self.optimized_resource
            .iter()
            .chain(self.native_resources.iter())
            .chain(self.remote_resources.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::RemoteDelegate;
    use crate::xid::{DefaultXidFactory, XidFactory};

    fn archive_with_everything() -> TransactionArchive {
        let factory = DefaultXidFactory;
        let xid = factory.generate_global_xid();
        let mut archive = TransactionArchive::new(xid.clone(), true, TransactionStatus::Prepared);
        archive.optimized_resource = Some(XaResourceArchive::new(
            XaResourceDescriptor::native("opt"),
            factory.create_branch_xid(&xid),
        ));
        archive.native_resources.push(XaResourceArchive::new(
            XaResourceDescriptor::native("db"),
            factory.create_branch_xid(&xid),
        ));
        archive.remote_resources.push(XaResourceArchive::new(
            XaResourceDescriptor::remote("svc", RemoteDelegate::new("svc-app", "h:1")),
            factory.create_branch_xid(&xid),
        ));
        archive
    }

    #[test]
    fn test_participants_order() {
        let archive = archive_with_everything();
        let ids: Vec<_> = archive
            .participants()
            .map(|p| p.descriptor.identifier().to_string())
            .collect();
        assert_eq!(ids, vec!["opt", "db", "svc"]);
        assert_eq!(archive.participant_count(), 3);
    }

    #[test]
    fn test_strategy_codes() {
        for code in 0..4 {
            let strategy = TransactionStrategyType::from_code(code).unwrap();
            assert_eq!(strategy.code(), code);
        }
        assert_eq!(TransactionStrategyType::from_code(4), None);

        let bytes = rmp_serde::to_vec(&TransactionStrategyType::LastResourceOptimize).unwrap();
        assert_eq!(rmp_serde::from_slice::<u8>(&bytes).unwrap(), 2);
        let unknown = rmp_serde::to_vec(&9u8).unwrap();
        assert!(rmp_serde::from_slice::<TransactionStrategyType>(&unknown).is_err());
    }

    #[test]
    fn test_archive_survives_msgpack() {
        let archive = archive_with_everything();
        let bytes = rmp_serde::to_vec(&archive).unwrap();
        let decoded: TransactionArchive = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, archive);
    }

    #[test]
    fn test_resource_archive_vote_helpers() {
        let xid = DefaultXidFactory.generate_global_xid();
        let branch = XaResourceArchive::new(XaResourceDescriptor::native("db"), xid);
        assert!(!branch.is_prepared());
        let branch = branch.with_vote(Vote::ReadOnly);
        assert!(branch.is_prepared());
        assert!(branch.is_read_only());
    }
}
