//! Live transactions for the tandem recovery engine
//!
//! This crate holds the in-memory side of recovery:
//! - [`Transaction`]: a resumable global transaction with role-specific
//!   second-phase operations
//! - [`strategy`]: branch completion order and per-branch outcome handling
//! - [`XaResource`] / [`ResourceResolver`]: live participants and their lookup
//! - [`TransactionRepository`]: active and error registries
//! - [`testing`]: scriptable resources for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod participant;
pub mod repository;
pub mod resource;
pub mod strategy;
pub mod testing;
pub mod transaction;

pub use participant::{Participant, ParticipantKind};
pub use repository::{SharedTransaction, TransactionRepository};
pub use resource::{ResourceResolver, StaticResourceResolver, XaError, XaResource, XaResult};
pub use strategy::{Completion, CompletionReport};
pub use transaction::{
    CoordinatorTransaction, ParticipantTransaction, RoleBehavior, Transaction,
    TransactionServices,
};
