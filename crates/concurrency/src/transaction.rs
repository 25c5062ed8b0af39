//! Live, resumable global transaction
//!
//! A [`Transaction`] is rebuilt from a persisted archive after a restart and
//! then driven to a terminal outcome. It owns its participant slots, the
//! indexes over them, and the services it needs to make progress durable
//! (the transaction log) and to reach its branches (the resource resolver).
//!
//! The second-phase operations are split by role. [`Transaction::behavior`]
//! hands out either a [`CoordinatorTransaction`], which can only commit, or a
//! [`ParticipantTransaction`], which can only roll back. The role is fixed
//! when the transaction is created.
//!
//! # Status transitions
//!
//! ```text
//! Prepared | Committing --recovery_commit--> Committing --> Committed
//! (non-terminal)        --recovery_rollback-> RollingBack --> RolledBack
//! ```
//!
//! Every transition is written to the log before branches are contacted, and
//! progress is written again when the pass ends, complete or not.

use crate::participant::{Participant, ParticipantKind};
use crate::repository::TransactionRepository;
use crate::resource::{ResourceResolver, XaResource};
use crate::strategy::{self, Completion, CompletionReport};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tandem_core::{
    Error, Result, Role, TransactionArchive, TransactionContext, TransactionStatus,
    TransactionStrategyType, TransactionXid, Vote, XaResourceArchive, XaResourceDescriptor,
};
use tandem_durability::TransactionLogger;
use tracing::{debug, warn};

/// Collaborators shared by every transaction of one engine
pub struct TransactionServices {
    logger: Arc<dyn TransactionLogger>,
    resources: Arc<dyn ResourceResolver>,
}

impl TransactionServices {
    /// Bundle a transaction log and a resource resolver
    pub fn new(logger: Arc<dyn TransactionLogger>, resources: Arc<dyn ResourceResolver>) -> Self {
        Self { logger, resources }
    }

    /// Durable transaction log
    pub fn logger(&self) -> &Arc<dyn TransactionLogger> {
        &self.logger
    }

    /// Live resource lookup
    pub fn resources(&self) -> &Arc<dyn ResourceResolver> {
        &self.resources
    }
}

impl std::fmt::Debug for TransactionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionServices").finish_non_exhaustive()
    }
}

/// A global transaction being resumed
pub struct Transaction {
    context: TransactionContext,
    status: TransactionStatus,
    vote: Vote,
    strategy: TransactionStrategyType,
    participants: Vec<Participant>,
    /// Trimmed identifier -> slot
    participant_map: HashMap<String, usize>,
    /// Remote application name -> slot (remote slots only)
    application_map: HashMap<String, usize>,
    services: Arc<TransactionServices>,
    forgotten: bool,
}

impl Transaction {
    /// Create an empty transaction in the `Active` status
    pub fn new(context: TransactionContext, services: Arc<TransactionServices>) -> Self {
        Self {
            context,
            status: TransactionStatus::Active,
            vote: Vote::Commit,
            strategy: TransactionStrategyType::Vacant,
            participants: Vec::new(),
            participant_map: HashMap::new(),
            application_map: HashMap::new(),
            services,
            forgotten: false,
        }
    }

    // === Accessors ===

    /// Identity and provenance
    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    /// Global xid
    pub fn xid(&self) -> &TransactionXid {
        self.context.xid()
    }

    /// Coordinator or participant, fixed at construction
    pub fn role(&self) -> Role {
        self.context.role()
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Overwrite the status (reconstruction copies the archived one verbatim)
    pub fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    /// Overall vote
    pub fn vote(&self) -> Vote {
        self.vote
    }

    /// Set the overall vote
    pub fn set_vote(&mut self, vote: Vote) {
        self.vote = vote;
    }

    /// Installed completion strategy
    pub fn strategy(&self) -> TransactionStrategyType {
        self.strategy
    }

    /// Install the completion strategy
    pub fn set_strategy(&mut self, strategy: TransactionStrategyType) {
        self.strategy = strategy;
    }

    /// True once the transaction has been forgotten
    pub fn is_forgotten(&self) -> bool {
        self.forgotten
    }

    /// Services this transaction was created with
    pub fn services(&self) -> &Arc<TransactionServices> {
        &self.services
    }

    // === Participants ===

    /// Append a participant slot, returning its index
    ///
    /// The slot is not indexed; see [`Transaction::index_participant`].
    pub fn enlist(&mut self, kind: ParticipantKind, archive: XaResourceArchive) -> usize {
        self.participants.push(Participant::new(kind, archive));
        self.participants.len() - 1
    }

    /// Index a slot under its trimmed identifier
    ///
    /// A later slot with the same trimmed identifier replaces the earlier one.
    pub fn index_participant(&mut self, slot: usize) -> Result<()> {
        let participant = self.slot(slot)?;
        let key = participant.descriptor().trimmed_identifier().to_string();
        if let Some(previous) = self.participant_map.insert(key.clone(), slot) {
            warn!(
                target: "tandem::recovery",
                gtrid = %self.xid().global_hex(),
                participant = %key,
                previous,
                slot,
                "Duplicate participant identifier, transaction log may be corrupt"
            );
        }
        Ok(())
    }

    /// Index a remote slot under its delegate's application name
    pub fn index_application(&mut self, slot: usize) -> Result<()> {
        let participant = self.slot(slot)?;
        let application = match participant.descriptor().as_remote() {
            Some(remote) => remote.delegate().application().to_string(),
            None => {
                return Err(Error::invalid_state(format!(
                    "participant '{}' of transaction {} is not remote",
                    participant.descriptor().identifier(),
                    self.xid()
                )))
            }
        };
        if let Some(previous) = self.application_map.insert(application.clone(), slot) {
            warn!(
                target: "tandem::recovery",
                gtrid = %self.xid().global_hex(),
                application = %application,
                previous,
                slot,
                "Duplicate remote application"
            );
        }
        Ok(())
    }

    /// Every slot, optimized first, then native, then remote
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Slot indexed under a (trimmed) identifier
    pub fn participant(&self, identifier: &str) -> Option<&Participant> {
        self.participant_map
            .get(identifier.trim())
            .and_then(|&slot| self.participants.get(slot))
    }

    /// Remote slot indexed under an application name
    pub fn remote_participant(&self, application: &str) -> Option<&Participant> {
        self.application_map
            .get(application)
            .and_then(|&slot| self.participants.get(slot))
    }

    /// Number of distinct participant identifiers
    pub fn participant_map_len(&self) -> usize {
        self.participant_map.len()
    }

    /// Number of distinct remote applications
    pub fn application_map_len(&self) -> usize {
        self.application_map.len()
    }

    fn slot(&self, slot: usize) -> Result<&Participant> {
        self.participants.get(slot).ok_or_else(|| {
            Error::invalid_state(format!(
                "participant slot {} out of range for transaction {}",
                slot,
                self.xid()
            ))
        })
    }

    // === Recovery ===

    /// Prepare the transaction for its second phase
    ///
    /// Attaches a live resource to every slot that still has second-phase
    /// work, then asks each native resource manager once which branches it
    /// still holds prepared. Completed and read-only slots, and every slot of
    /// a committed or rolled back transaction, are left unattached. A
    /// prepared branch the resource no longer knows was completed before the
    /// crash; it is marked done with the outcome implied by the status.
    pub fn recover(&mut self) -> Result<()> {
        let resources = Arc::clone(&self.services.resources);
        let gtrid = self.xid().global_hex();
        let settled = self.status.is_terminal();

        for participant in &mut self.participants {
            let branch = participant.archive();
            if settled || branch.completed || branch.is_read_only() || participant.is_attached() {
                continue;
            }
            let handle = resolve(resources.as_ref(), participant.descriptor())
                .ok_or_else(|| missing_resource(participant.descriptor(), &gtrid))?;
            participant.attach(handle);
        }

        let committing = matches!(
            self.status,
            TransactionStatus::Committing | TransactionStatus::Committed
        );
        // a coordinator still holding Prepared is about to commit every branch
        let commit_pending =
            self.role() == Role::Coordinator && self.status == TransactionStatus::Prepared;
        let mut in_doubt: HashMap<String, HashSet<TransactionXid>> = HashMap::new();

        for participant in &mut self.participants {
            let branch = participant.archive();
            if branch.descriptor.is_remote() || branch.completed || branch.vote != Some(Vote::Commit) {
                continue;
            }
            let key = branch.descriptor.trimmed_identifier().to_string();
            if !in_doubt.contains_key(&key) {
                let Some(handle) = participant.handle() else {
                    continue;
                };
                let held = handle.recover().map_err(|e| {
                    Error::unavailable(format!("in-doubt scan of '{}' failed: {}", key, e))
                })?;
                in_doubt.insert(key.clone(), held.into_iter().collect());
            }

            let still_prepared = in_doubt
                .get(&key)
                .map_or(false, |held| held.contains(&participant.archive().xid));
            if still_prepared {
                continue;
            }

            let branch = participant.archive_mut();
            branch.committed = committing;
            branch.rolled_back = !committing;
            branch.completed = true;
            if commit_pending {
                branch.heuristic = true;
                warn!(
                    target: "tandem::recovery",
                    gtrid = %gtrid,
                    bqual = %branch.xid.branch_hex(),
                    participant = %key,
                    "Prepared branch vanished before commit"
                );
            } else {
                debug!(
                    target: "tandem::recovery",
                    gtrid = %gtrid,
                    bqual = %branch.xid.branch_hex(),
                    participant = %key,
                    "Branch no longer in doubt"
                );
            }
        }

        Ok(())
    }

    /// Role-specific operations
    pub fn behavior(&mut self) -> RoleBehavior<'_> {
        match self.role() {
            Role::Coordinator => RoleBehavior::Coordinator(CoordinatorTransaction { transaction: self }),
            Role::Participant => RoleBehavior::Participant(ParticipantTransaction { transaction: self }),
        }
    }

    /// Snapshot the live state as a persistable archive
    pub fn to_archive(&self) -> TransactionArchive {
        let mut archive = TransactionArchive::new(
            self.xid().clone(),
            self.context.is_coordinator(),
            self.status,
        );
        archive.propagated_by = self.context.propagated_by().map(str::to_string);
        archive.vote = self.vote;
        archive.strategy = self.strategy;
        for participant in &self.participants {
            let branch = participant.archive().clone();
            match participant.kind() {
                ParticipantKind::Optimized => archive.optimized_resource = Some(branch),
                ParticipantKind::Native => archive.native_resources.push(branch),
                ParticipantKind::Remote => archive.remote_resources.push(branch),
            }
        }
        archive
    }

    fn persist(&self) -> Result<()> {
        self.services.logger.update_transaction(&self.to_archive())
    }

    fn transition(&mut self, status: TransactionStatus) -> Result<()> {
        self.status = status;
        self.persist()
    }

    fn drive(&mut self, completion: Completion) -> Result<()> {
        let (in_flight, terminal) = match completion {
            Completion::Commit => (TransactionStatus::Committing, TransactionStatus::Committed),
            Completion::Rollback => (TransactionStatus::RollingBack, TransactionStatus::RolledBack),
        };
        let gtrid = self.xid().global_hex();
        self.transition(in_flight)?;

        let report = strategy::complete(self.strategy, completion, &mut self.participants, &gtrid);
        if report.is_complete() {
            self.transition(terminal)?;
            debug!(
                target: "tandem::recovery",
                gtrid = %gtrid,
                status = %terminal,
                completed = report.completed,
                heuristic = report.heuristic,
                "Transaction completed"
            );
            return Ok(());
        }

        self.persist()?;
        Err(incomplete(gtrid, completion, report))
    }

    fn forget_quietly(&mut self, repository: &TransactionRepository) {
        let gtrid = self.xid().global_hex();
        let resources = Arc::clone(&self.services.resources);
        for participant in self.participants.iter().filter(|p| p.archive().heuristic) {
            let branch = participant.archive();
            let handle = participant
                .handle()
                .cloned()
                .or_else(|| resolve(resources.as_ref(), participant.descriptor()));
            let Some(handle) = handle else {
                debug!(
                    target: "tandem::recovery",
                    gtrid = %gtrid,
                    bqual = %branch.xid.branch_hex(),
                    "No live resource to forget heuristic branch"
                );
                continue;
            };
            if let Err(e) = handle.forget(&branch.xid) {
                debug!(
                    target: "tandem::recovery",
                    gtrid = %gtrid,
                    bqual = %branch.xid.branch_hex(),
                    error = %e,
                    "Forget of heuristic branch failed"
                );
            }
        }

        if let Err(e) = self.services.logger.delete_transaction(&self.to_archive()) {
            warn!(target: "tandem::recovery", gtrid = %gtrid, error = %e, "Failed to delete transaction record");
        }

        let xid = self.xid().global_xid();
        repository.remove_error_transaction(&xid);
        repository.remove_transaction(&xid);
        self.forgotten = true;
    }
}

fn resolve(
    resources: &dyn ResourceResolver,
    descriptor: &XaResourceDescriptor,
) -> Option<Arc<dyn XaResource>> {
    match descriptor {
        XaResourceDescriptor::Native { .. } => resources.native(descriptor.trimmed_identifier()),
        XaResourceDescriptor::Remote(remote) => resources.remote(remote.delegate()),
    }
}

fn missing_resource(descriptor: &XaResourceDescriptor, gtrid: &str) -> Error {
    match descriptor {
        XaResourceDescriptor::Native { .. } => Error::unavailable(format!(
            "no live resource for participant '{}' of transaction {}",
            descriptor.trimmed_identifier(),
            gtrid
        )),
        XaResourceDescriptor::Remote(remote) => Error::unavailable(format!(
            "no live client for remote participant '{}' at {} of transaction {}",
            descriptor.trimmed_identifier(),
            remote.delegate().address(),
            gtrid
        )),
    }
}

fn incomplete(gtrid: String, completion: Completion, report: CompletionReport) -> Error {
    if !report.faults.is_empty() {
        return Error::fault(format!(
            "transaction {}: {}",
            gtrid,
            report.faults.join("; ")
        ));
    }
    match completion {
        Completion::Commit => Error::CommitRequired {
            xid: gtrid,
            pending: report.pending,
        },
        Completion::Rollback => Error::RollbackRequired {
            xid: gtrid,
            pending: report.pending,
        },
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("xid", &self.xid().to_string())
            .field("role", &self.role())
            .field("status", &self.status)
            .field("strategy", &self.strategy)
            .field("participants", &self.participants.len())
            .field("forgotten", &self.forgotten)
            .finish()
    }
}

/// Operations available to a transaction, by role
#[derive(Debug)]
pub enum RoleBehavior<'a> {
    /// This process originated the transaction
    Coordinator(CoordinatorTransaction<'a>),
    /// The transaction was imported from another node
    Participant(ParticipantTransaction<'a>),
}

/// Second phase of a transaction this process coordinates
#[derive(Debug)]
pub struct CoordinatorTransaction<'a> {
    transaction: &'a mut Transaction,
}

impl CoordinatorTransaction<'_> {
    /// Commit every incomplete branch
    ///
    /// Committed transactions are left as they are. Anything other than
    /// Prepared or Committing is rejected with `InvalidState`: a coordinator
    /// only commits what it has decided to commit.
    pub fn recovery_commit(&mut self) -> Result<()> {
        match self.transaction.status {
            TransactionStatus::Committed => Ok(()),
            TransactionStatus::Prepared | TransactionStatus::Committing => {
                self.transaction.drive(Completion::Commit)
            }
            other => Err(Error::invalid_state(format!(
                "cannot commit transaction {} in status {}",
                self.transaction.xid(),
                other
            ))),
        }
    }

    /// Purge every trace of the transaction; failures are logged only
    pub fn forget_quietly(&mut self, repository: &TransactionRepository) {
        self.transaction.forget_quietly(repository)
    }
}

/// Second phase of a transaction imported from a remote coordinator
#[derive(Debug)]
pub struct ParticipantTransaction<'a> {
    transaction: &'a mut Transaction,
}

impl ParticipantTransaction<'_> {
    /// Roll back every incomplete branch
    pub fn recovery_rollback(&mut self) -> Result<()> {
        match self.transaction.status {
            TransactionStatus::RolledBack => Ok(()),
            TransactionStatus::Committed => Err(Error::invalid_state(format!(
                "cannot roll back committed transaction {}",
                self.transaction.xid()
            ))),
            _ => self.transaction.drive(Completion::Rollback),
        }
    }

    /// Purge every trace of the transaction; failures are logged only
    pub fn forget_quietly(&mut self, repository: &TransactionRepository) {
        self.transaction.forget_quietly(repository)
    }
}
