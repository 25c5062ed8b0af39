//! Second-phase completion strategies
//!
//! The archived [`TransactionStrategyType`] selects the order in which
//! branches are completed:
//!
//! - `Vacant`, `Simple`, `Common`: every branch in slot order.
//! - `LastResourceOptimize`: on commit the optimized resource goes first,
//!   because its one-phase commit is the decision point. If it does not
//!   complete, no other branch is touched. On rollback it goes last.
//!
//! Per branch, a never-prepared branch is committed with the one-phase flag
//! and a read-only branch needs no second phase at all. Every remaining
//! branch is attempted even if an earlier one failed; the report says how
//! many are still pending.

use crate::participant::{Participant, ParticipantKind};
use crate::resource::XaError;
use tandem_core::TransactionStrategyType;
use tracing::{debug, warn};

/// Which outcome is being driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Second-phase commit
    Commit,
    /// Rollback
    Rollback,
}

/// Result of one completion pass over a transaction's branches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReport {
    /// Branches completed during this pass
    pub completed: usize,
    /// Branches still incomplete
    pub pending: usize,
    /// Branches completed heuristically during this pass
    pub heuristic: usize,
    /// Unexpected branch failures (also counted in `pending`)
    pub faults: Vec<String>,
}

impl CompletionReport {
    /// True if no branch is left incomplete
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

/// Drive `completion` over every incomplete branch
pub(crate) fn complete(
    strategy: TransactionStrategyType,
    completion: Completion,
    participants: &mut [Participant],
    gtrid: &str,
) -> CompletionReport {
    let mut report = CompletionReport::default();
    let order = completion_order(strategy, completion, participants);

    let gate = match (strategy, completion) {
        (TransactionStrategyType::LastResourceOptimize, Completion::Commit) => participants
            .iter()
            .position(|p| p.kind() == ParticipantKind::Optimized),
        _ => None,
    };

    for (step, idx) in order.into_iter().enumerate() {
        let done = complete_branch(&mut participants[idx], completion, gtrid, &mut report);
        if step == 0 && gate == Some(idx) && !done {
            // the optimized resource decides the outcome, others must wait
            report.pending += participants
                .iter()
                .enumerate()
                .filter(|(i, p)| *i != idx && !p.archive().completed)
                .count();
            debug!(target: "tandem::recovery", gtrid, "Optimized resource incomplete, deferring remaining branches");
            break;
        }
    }
    report
}

fn completion_order(
    strategy: TransactionStrategyType,
    completion: Completion,
    participants: &[Participant],
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..participants.len()).collect();
    if strategy == TransactionStrategyType::LastResourceOptimize {
        let is_optimized = |i: &usize| participants[*i].kind() == ParticipantKind::Optimized;
        let (optimized, others): (Vec<usize>, Vec<usize>) = order.into_iter().partition(is_optimized);
        order = match completion {
            Completion::Commit => optimized.into_iter().chain(others).collect(),
            Completion::Rollback => others.into_iter().chain(optimized).collect(),
        };
    }
    order
}

/// Returns true if the branch is complete after this call
fn complete_branch(
    participant: &mut Participant,
    completion: Completion,
    gtrid: &str,
    report: &mut CompletionReport,
) -> bool {
    if participant.archive().completed {
        return true;
    }
    if participant.archive().is_read_only() {
        participant.archive_mut().completed = true;
        report.completed += 1;
        return true;
    }

    let identifier = participant.descriptor().trimmed_identifier().to_string();
    let Some(handle) = participant.handle().cloned() else {
        report.pending += 1;
        report
            .faults
            .push(format!("participant '{}' has no live resource", identifier));
        return false;
    };

    let xid = participant.archive().xid.clone();
    let result = match completion {
        Completion::Commit => handle.commit(&xid, !participant.archive().is_prepared()),
        Completion::Rollback => handle.rollback(&xid),
    };

    let branch = participant.archive_mut();
    match (result, completion) {
        (Ok(()), Completion::Commit) | (Err(XaError::NotFound), Completion::Commit) => {
            branch.committed = true;
        }
        (Ok(()), Completion::Rollback) | (Err(XaError::NotFound), Completion::Rollback) => {
            branch.rolled_back = true;
        }
        (Err(XaError::HeuristicCommit), Completion::Commit) => {
            branch.committed = true;
            branch.heuristic = true;
            report.heuristic += 1;
        }
        (Err(XaError::HeuristicRollback), Completion::Rollback) => {
            branch.rolled_back = true;
            branch.heuristic = true;
            report.heuristic += 1;
        }
        (Err(e @ (XaError::HeuristicCommit | XaError::HeuristicRollback | XaError::HeuristicMixed)), _) => {
            warn!(
                target: "tandem::recovery",
                gtrid,
                bqual = %xid.branch_hex(),
                participant = %identifier,
                outcome = %e,
                "Branch completed against the transaction outcome"
            );
            branch.committed = matches!(e, XaError::HeuristicCommit);
            branch.rolled_back = matches!(e, XaError::HeuristicRollback);
            branch.heuristic = true;
            report.heuristic += 1;
        }
        (Err(XaError::Unavailable(msg)), _) => {
            debug!(
                target: "tandem::recovery",
                gtrid,
                bqual = %xid.branch_hex(),
                participant = %identifier,
                error = %msg,
                "Branch unavailable"
            );
            report.pending += 1;
            return false;
        }
        (Err(XaError::Protocol(msg)), _) => {
            report.pending += 1;
            report
                .faults
                .push(format!("participant '{}': {}", identifier, msg));
            return false;
        }
    }

    branch.completed = true;
    report.completed += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::XaResource;
    use crate::testing::{ResourceCall, ScriptedResource};
    use std::sync::Arc;
    use tandem_core::{
        DefaultXidFactory, TransactionXid, Vote, XaResourceArchive, XaResourceDescriptor,
        XidFactory,
    };

    fn slot(
        kind: ParticipantKind,
        name: &str,
        global: &TransactionXid,
        vote: Option<Vote>,
    ) -> (Participant, Arc<ScriptedResource>) {
        let mut archive = XaResourceArchive::new(
            XaResourceDescriptor::native(name),
            DefaultXidFactory.create_branch_xid(global),
        );
        archive.vote = vote;
        let resource = Arc::new(ScriptedResource::new(name));
        let mut participant = Participant::new(kind, archive);
        participant.attach(resource.clone() as Arc<dyn XaResource>);
        (participant, resource)
    }

    #[test]
    fn test_common_commit_all_branches() {
        let global = DefaultXidFactory.generate_global_xid();
        let (a, ra) = slot(ParticipantKind::Native, "a", &global, Some(Vote::Commit));
        let (b, rb) = slot(ParticipantKind::Native, "b", &global, Some(Vote::Commit));
        let mut participants = vec![a, b];

        let report = complete(
            TransactionStrategyType::Common,
            Completion::Commit,
            &mut participants,
            "g",
        );
        assert!(report.is_complete());
        assert_eq!(report.completed, 2);
        assert!(participants.iter().all(|p| p.archive().committed));
        assert_eq!(
            ra.calls()[0],
            ResourceCall::Commit {
                xid: participants[0].archive().xid.clone(),
                one_phase: false
            }
        );
        assert_eq!(rb.commit_count(), 1);
    }

    #[test]
    fn test_read_only_branch_is_skipped() {
        let global = DefaultXidFactory.generate_global_xid();
        let (a, ra) = slot(ParticipantKind::Native, "a", &global, Some(Vote::ReadOnly));
        let mut participants = vec![a];

        let report = complete(
            TransactionStrategyType::Simple,
            Completion::Rollback,
            &mut participants,
            "g",
        );
        assert!(report.is_complete());
        assert!(ra.calls().is_empty());
        assert!(participants[0].archive().completed);
    }

    #[test]
    fn test_unavailable_branch_stays_pending_others_proceed() {
        let global = DefaultXidFactory.generate_global_xid();
        let (a, ra) = slot(ParticipantKind::Native, "a", &global, Some(Vote::Commit));
        let (b, rb) = slot(ParticipantKind::Native, "b", &global, Some(Vote::Commit));
        ra.set_unavailable(true);
        let mut participants = vec![a, b];

        let report = complete(
            TransactionStrategyType::Common,
            Completion::Commit,
            &mut participants,
            "g",
        );
        assert_eq!(report.pending, 1);
        assert!(report.faults.is_empty());
        assert!(!participants[0].archive().completed);
        assert!(participants[1].archive().committed);
        assert_eq!(rb.commit_count(), 1);
    }

    #[test]
    fn test_lro_commit_optimized_first_with_one_phase() {
        let global = DefaultXidFactory.generate_global_xid();
        let (native, rn) = slot(ParticipantKind::Native, "n", &global, Some(Vote::Commit));
        let (optimized, ro) = slot(ParticipantKind::Optimized, "o", &global, None);
        // optimized sits after the native slot here to prove ordering is by kind
        let mut participants = vec![native, optimized];

        let report = complete(
            TransactionStrategyType::LastResourceOptimize,
            Completion::Commit,
            &mut participants,
            "g",
        );
        assert!(report.is_complete());
        assert_eq!(
            ro.calls(),
            vec![ResourceCall::Commit {
                xid: participants[1].archive().xid.clone(),
                one_phase: true
            }]
        );
        assert_eq!(rn.commit_count(), 1);
    }

    #[test]
    fn test_lro_failed_optimized_defers_others() {
        let global = DefaultXidFactory.generate_global_xid();
        let (optimized, ro) = slot(ParticipantKind::Optimized, "o", &global, None);
        let (native, rn) = slot(ParticipantKind::Native, "n", &global, Some(Vote::Commit));
        ro.set_unavailable(true);
        let mut participants = vec![optimized, native];

        let report = complete(
            TransactionStrategyType::LastResourceOptimize,
            Completion::Commit,
            &mut participants,
            "g",
        );
        assert_eq!(report.pending, 2);
        assert_eq!(rn.commit_count(), 0);
    }

    #[test]
    fn test_lro_rollback_optimized_last() {
        let global = DefaultXidFactory.generate_global_xid();
        let (optimized, ro) = slot(ParticipantKind::Optimized, "o", &global, None);
        let (native, rn) = slot(ParticipantKind::Native, "n", &global, Some(Vote::Commit));
        ro.set_unavailable(true);
        let mut participants = vec![optimized, native];

        let report = complete(
            TransactionStrategyType::LastResourceOptimize,
            Completion::Rollback,
            &mut participants,
            "g",
        );
        // native went first and completed even though the optimized resource is down
        assert_eq!(rn.rollback_count(), 1);
        assert_eq!(ro.rollback_count(), 1);
        assert_eq!(report.pending, 1);
    }

    #[test]
    fn test_contradicting_heuristic_is_flagged() {
        let global = DefaultXidFactory.generate_global_xid();
        let (a, ra) = slot(ParticipantKind::Native, "a", &global, Some(Vote::Commit));
        ra.push_commit_result(Err(XaError::HeuristicRollback));
        let mut participants = vec![a];

        let report = complete(
            TransactionStrategyType::Common,
            Completion::Commit,
            &mut participants,
            "g",
        );
        assert!(report.is_complete());
        assert_eq!(report.heuristic, 1);
        let branch = participants[0].archive();
        assert!(branch.completed && branch.heuristic && branch.rolled_back && !branch.committed);
    }

    #[test]
    fn test_protocol_error_is_a_fault() {
        let global = DefaultXidFactory.generate_global_xid();
        let (a, ra) = slot(ParticipantKind::Native, "a", &global, Some(Vote::Commit));
        ra.push_rollback_result(Err(XaError::Protocol("bad flags".to_string())));
        let mut participants = vec![a];

        let report = complete(
            TransactionStrategyType::Common,
            Completion::Rollback,
            &mut participants,
            "g",
        );
        assert_eq!(report.pending, 1);
        assert_eq!(report.faults.len(), 1);
        assert!(report.faults[0].contains("bad flags"));
    }

    #[test]
    fn test_not_found_counts_as_done() {
        let global = DefaultXidFactory.generate_global_xid();
        let (a, ra) = slot(ParticipantKind::Native, "a", &global, Some(Vote::Commit));
        ra.push_rollback_result(Err(XaError::NotFound));
        let mut participants = vec![a];

        let report = complete(
            TransactionStrategyType::Common,
            Completion::Rollback,
            &mut participants,
            "g",
        );
        assert!(report.is_complete());
        assert!(participants[0].archive().rolled_back);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn vote_strategy() -> impl Strategy<Value = Option<Vote>> {
            prop_oneof![
                Just(None),
                Just(Some(Vote::Commit)),
                Just(Some(Vote::ReadOnly)),
            ]
        }

        proptest! {
            #[test]
            fn healthy_branches_each_complete_once(
                votes in proptest::collection::vec(vote_strategy(), 0..8),
                rollback in any::<bool>(),
            ) {
                let global = DefaultXidFactory.generate_global_xid();
                let mut participants = Vec::new();
                let mut resources = Vec::new();
                for (i, vote) in votes.iter().enumerate() {
                    let (p, r) = slot(ParticipantKind::Native, &format!("r{}", i), &global, *vote);
                    participants.push(p);
                    resources.push(r);
                }
                let completion = if rollback { Completion::Rollback } else { Completion::Commit };

                let report = complete(TransactionStrategyType::Common, completion, &mut participants, "g");
                prop_assert!(report.is_complete());
                prop_assert_eq!(report.completed, votes.len());

                let second = complete(TransactionStrategyType::Common, completion, &mut participants, "g");
                prop_assert_eq!(second.completed, 0);

                for (vote, resource) in votes.iter().zip(&resources) {
                    let expected = usize::from(*vote != Some(Vote::ReadOnly));
                    prop_assert_eq!(resource.calls().len(), expected);
                }
            }
        }
    }
}
