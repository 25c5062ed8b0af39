//! Rebuild a live transaction from its archive
//!
//! Reconstruction trusts the archive for everything except the xid: only the
//! global transaction id is carried over and the identity is re-derived
//! through the xid factory, so a branch qualifier left in the record never
//! leaks into the recovered transaction.

use std::sync::Arc;
use tandem_concurrency::{ParticipantKind, Transaction, TransactionServices};
use tandem_core::{
    Error, Result, TransactionArchive, TransactionContext, Vote, XidFactory,
};
use tracing::trace;

/// Rebuild a resumable transaction from a persisted archive
///
/// The result is marked recovered, carries the archived status, vote and
/// strategy verbatim, and has every participant slot indexed.
///
/// # Errors
///
/// `InvalidState` if the archive can never be resumed (a read-only overall
/// vote, or an unusable xid). The caller is expected to purge such archives.
pub fn reconstruct_transaction(
    archive: &TransactionArchive,
    xid_factory: &dyn XidFactory,
    services: Arc<TransactionServices>,
) -> Result<Transaction> {
    let global = xid_factory.create_global_xid(archive.xid.global_transaction_id())?;
    let mut context = TransactionContext::new(
        global,
        archive.coordinator,
        archive.propagated_by.clone(),
    );
    context.mark_recovered();

    let mut transaction = Transaction::new(context, services);
    transaction.set_status(archive.status);
    transaction.set_vote(archive.vote);

    let rosters = archive
        .optimized_resource
        .iter()
        .map(|branch| (ParticipantKind::Optimized, branch))
        .chain(archive.native_resources.iter().map(|b| (ParticipantKind::Native, b)))
        .chain(archive.remote_resources.iter().map(|b| (ParticipantKind::Remote, b)));

    for (kind, branch) in rosters {
        let slot = transaction.enlist(kind, branch.clone());
        transaction.index_participant(slot)?;
        if branch.descriptor.is_remote() {
            transaction.index_application(slot)?;
        }
    }

    transaction.set_strategy(archive.strategy);

    if archive.vote == Vote::ReadOnly {
        return Err(Error::invalid_state(format!(
            "transaction {} voted read-only and has nothing to recover",
            archive.xid.global_hex()
        )));
    }

    trace!(
        target: "tandem::recovery",
        gtrid = %transaction.xid().global_hex(),
        status = %transaction.status(),
        participants = archive.participant_count(),
        "Reconstructed transaction"
    );
    Ok(transaction)
}
