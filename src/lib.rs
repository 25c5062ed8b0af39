//! Tandem - two-phase commit transaction recovery
//!
//! Tandem resolves global transactions left in doubt by a crash or a
//! transient failure. Each archived transaction is rebuilt, classified by
//! its role and last known status, and driven to a single terminal outcome
//! across every participant.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tandem::{
//!     DefaultXidFactory, FileTransactionLog, ReadinessGate, RecoveryConfig, RecoveryDaemon,
//!     StaticResourceResolver, TransactionRecovery, TransactionRepository, TransactionServices,
//! };
//!
//! let resources = Arc::new(StaticResourceResolver::new());
//! resources.register_native("orders-db", orders_db_adapter);
//!
//! let services = Arc::new(TransactionServices::new(
//!     Arc::new(FileTransactionLog::open("/var/lib/tandem/txlog")?),
//!     resources,
//! ));
//! let recovery = Arc::new(TransactionRecovery::new(
//!     services,
//!     Arc::new(TransactionRepository::new()),
//!     Arc::new(DefaultXidFactory),
//!     Arc::new(ReadinessGate::new()),
//! ));
//!
//! recovery.start_recovery()?;
//! let daemon = RecoveryDaemon::start(recovery, &RecoveryConfig::default())?;
//! ```
//!
//! # Architecture
//!
//! - `tandem-core`: identifiers, status model, archives, errors
//! - `tandem-durability`: the durable transaction log
//! - `tandem-concurrency`: live transactions, strategies, resources, registries
//! - `tandem-engine`: decision table, orchestration, daemon

pub use tandem_concurrency::{
    testing, CoordinatorTransaction, Participant, ParticipantKind, ParticipantTransaction,
    ResourceResolver, RoleBehavior, SharedTransaction, StaticResourceResolver, Transaction,
    TransactionRepository, TransactionServices, XaError, XaResource, XaResult,
};
pub use tandem_core::{
    DefaultXidFactory, Error, ErrorKind, RemoteDelegate, RemoteResourceDescriptor, Result, Role,
    TransactionArchive, TransactionContext, TransactionStatus, TransactionStrategyType,
    TransactionXid, Vote, XaResourceArchive, XaResourceDescriptor, XidFactory,
};
pub use tandem_durability::{
    ArchiveIter, FileTransactionLog, MemoryTransactionLog, TransactionLogger,
};
pub use tandem_engine::{
    decide, reconstruct_transaction, ReadinessGate, RecoveryAction, RecoveryConfig,
    RecoveryDaemon, StartupReport, SweepReport, TransactionCoordinator, TransactionRecovery,
    TransactionRecoveryListener,
};
