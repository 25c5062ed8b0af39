//! Durability layer for Tandem
//!
//! This crate handles the durable transaction log:
//!
//! - `TransactionLogger`: the contract the transaction manager writes
//!   archives through and recovery drains archives from
//! - `MemoryTransactionLog`: volatile log for embedding and tests
//! - `FileTransactionLog`: one checksummed record file per global transaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod log;
pub mod memory;

pub use file::{FileTransactionLog, RecordError, RECORD_EXTENSION, RECORD_MAGIC, RECORD_VERSION};
pub use log::{ArchiveIter, TransactionLogger};
pub use memory::MemoryTransactionLog;
