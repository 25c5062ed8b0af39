//! Participant resource descriptors
//!
//! A descriptor names one participant of a global transaction. Native
//! resources are identified by their resource-manager identifier alone.
//! Remote resources additionally carry a [`RemoteDelegate`], the persisted
//! handle of the remote coordinator that owns the branch.
//!
//! Descriptors hold only what survives a restart. The live connection behind
//! a descriptor is attached again when a recovered transaction is resumed.

use serde::{Deserialize, Serialize};

/// Persisted handle of a remote coordinator node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteDelegate {
    application: String,
    address: String,
}

impl RemoteDelegate {
    /// Create a delegate handle
    pub fn new(application: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            address: address.into(),
        }
    }

    /// Application (node) name of the remote coordinator
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Network address of the remote coordinator
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Descriptor of a participant owned by a remote coordinator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteResourceDescriptor {
    identifier: String,
    delegate: RemoteDelegate,
}

impl RemoteResourceDescriptor {
    /// Create a remote descriptor
    pub fn new(identifier: impl Into<String>, delegate: RemoteDelegate) -> Self {
        Self {
            identifier: identifier.into(),
            delegate,
        }
    }

    /// Raw identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Remote coordinator handle
    pub fn delegate(&self) -> &RemoteDelegate {
        &self.delegate
    }
}

/// Identifies one participant resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XaResourceDescriptor {
    /// Local resource manager
    Native {
        /// Resource-manager identifier
        identifier: String,
    },
    /// Branch held by a remote coordinator
    Remote(RemoteResourceDescriptor),
}

impl XaResourceDescriptor {
    /// Descriptor for a local resource manager
    pub fn native(identifier: impl Into<String>) -> Self {
        XaResourceDescriptor::Native {
            identifier: identifier.into(),
        }
    }

    /// Descriptor for a branch held by a remote coordinator
    pub fn remote(identifier: impl Into<String>, delegate: RemoteDelegate) -> Self {
        XaResourceDescriptor::Remote(RemoteResourceDescriptor::new(identifier, delegate))
    }

    /// Raw identifier as persisted
    pub fn identifier(&self) -> &str {
        match self {
            XaResourceDescriptor::Native { identifier } => identifier,
            XaResourceDescriptor::Remote(remote) => remote.identifier(),
        }
    }

    /// Identifier with surrounding whitespace removed, used as a map key
    pub fn trimmed_identifier(&self) -> &str {
        self.identifier().trim()
    }

    /// Remote view of this descriptor, if it is one
    pub fn as_remote(&self) -> Option<&RemoteResourceDescriptor> {
        match self {
            XaResourceDescriptor::Remote(remote) => Some(remote),
            XaResourceDescriptor::Native { .. } => None,
        }
    }

    /// True for remote descriptors
    pub fn is_remote(&self) -> bool {
        self.as_remote().is_some()
    }
}
