//! Core types for Tandem
//!
//! This crate defines the foundational types used throughout the system:
//! - TransactionXid / XidFactory: XA identifiers
//! - TransactionContext: identity and provenance of a transaction
//! - TransactionStatus, Vote, Role: 2PC lifecycle vocabulary
//! - XaResourceDescriptor: participant identity (native or remote)
//! - TransactionArchive / XaResourceArchive: durable snapshots
//! - Error: error taxonomy shared by every layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod context;
pub mod error;
pub mod resource;
pub mod status;
pub mod xid;

pub use archive::{TransactionArchive, TransactionStrategyType, XaResourceArchive};
pub use context::TransactionContext;
pub use error::{Error, ErrorKind, Result};
pub use resource::{RemoteDelegate, RemoteResourceDescriptor, XaResourceDescriptor};
pub use status::{Role, TransactionStatus, Vote};
pub use xid::{DefaultXidFactory, TransactionXid, XidFactory, DEFAULT_FORMAT_ID};
