//! Live participant resources
//!
//! Archives only describe participants. To drive the second phase, a
//! recovered transaction needs live handles: an [`XaResource`] per native
//! resource manager and per remote coordinator. Handles are looked up through
//! a [`ResourceResolver`] when the transaction is resumed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tandem_core::{Error, RemoteDelegate, TransactionXid};
use thiserror::Error as ThisError;

/// Outcome of a branch-level XA call
pub type XaResult<T> = std::result::Result<T, XaError>;

/// Branch-level failures reported by a resource manager or remote coordinator
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum XaError {
    /// The resource does not know the branch (already completed and forgotten)
    #[error("branch not found")]
    NotFound,

    /// The resource could not be reached; the call may be retried
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// The branch was committed unilaterally
    #[error("heuristic commit")]
    HeuristicCommit,

    /// The branch was rolled back unilaterally
    #[error("heuristic rollback")]
    HeuristicRollback,

    /// Part of the branch committed and part rolled back
    #[error("heuristic mixed")]
    HeuristicMixed,

    /// The resource rejected the call as a protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<XaError> for Error {
    fn from(e: XaError) -> Self {
        match e {
            XaError::Unavailable(msg) => Error::ResourceUnavailable(msg),
            other => Error::Fault(other.to_string()),
        }
    }
}

/// A participant able to complete transaction branches
///
/// Implemented by resource-manager adapters and by remote coordinator
/// clients. Calls may block on I/O; timeouts are the implementation's
/// concern.
pub trait XaResource: Send + Sync {
    /// Commit a branch; `one_phase` when the branch was never prepared
    fn commit(&self, xid: &TransactionXid, one_phase: bool) -> XaResult<()>;

    /// Roll back a branch
    fn rollback(&self, xid: &TransactionXid) -> XaResult<()>;

    /// Discard the resource's memory of a heuristically completed branch
    fn forget(&self, xid: &TransactionXid) -> XaResult<()>;

    /// Branches the resource currently holds in the prepared state
    fn recover(&self) -> XaResult<Vec<TransactionXid>>;
}

/// Looks up live resources for persisted participant descriptors
pub trait ResourceResolver: Send + Sync {
    /// Resource manager registered under a (trimmed) identifier
    fn native(&self, identifier: &str) -> Option<Arc<dyn XaResource>>;

    /// Client for a remote coordinator
    fn remote(&self, delegate: &RemoteDelegate) -> Option<Arc<dyn XaResource>>;
}

/// [`ResourceResolver`] backed by explicit registrations
///
/// Native resources are keyed by identifier, remote coordinators by
/// application name.
#[derive(Default)]
pub struct StaticResourceResolver {
    native: RwLock<HashMap<String, Arc<dyn XaResource>>>,
    remote: RwLock<HashMap<String, Arc<dyn XaResource>>>,
}

impl StaticResourceResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource manager
    pub fn register_native(&self, identifier: impl Into<String>, resource: Arc<dyn XaResource>) {
        let identifier = identifier.into();
        self.native
            .write()
            .insert(identifier.trim().to_string(), resource);
    }

    /// Register a remote coordinator client
    pub fn register_remote(&self, application: impl Into<String>, resource: Arc<dyn XaResource>) {
        self.remote.write().insert(application.into(), resource);
    }
}

impl ResourceResolver for StaticResourceResolver {
    fn native(&self, identifier: &str) -> Option<Arc<dyn XaResource>> {
        self.native.read().get(identifier.trim()).cloned()
    }

    fn remote(&self, delegate: &RemoteDelegate) -> Option<Arc<dyn XaResource>> {
        self.remote.read().get(delegate.application()).cloned()
    }
}

impl std::fmt::Debug for StaticResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut native: Vec<String> = self.native.read().keys().cloned().collect();
        let mut remote: Vec<String> = self.remote.read().keys().cloned().collect();
        native.sort();
        remote.sort();
        f.debug_struct("StaticResourceResolver")
            .field("native", &native)
            .field("remote", &remote)
            .finish()
    }
}
