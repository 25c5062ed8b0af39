//! Participant slots of a live transaction

use crate::resource::XaResource;
use std::sync::Arc;
use tandem_core::{XaResourceArchive, XaResourceDescriptor};

/// Roster a participant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    /// The single resource eligible for one-phase completion
    Optimized,
    /// Local resource manager
    Native,
    /// Branch held by a remote coordinator
    Remote,
}

/// One slot of a transaction's unified participant list
///
/// Pairs the persisted branch record with the live handle attached when the
/// transaction is resumed. The handle is never persisted.
pub struct Participant {
    kind: ParticipantKind,
    archive: XaResourceArchive,
    handle: Option<Arc<dyn XaResource>>,
}

impl Participant {
    pub(crate) fn new(kind: ParticipantKind, archive: XaResourceArchive) -> Self {
        Self {
            kind,
            archive,
            handle: None,
        }
    }

    /// Roster this slot belongs to
    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    /// Persisted branch record
    pub fn archive(&self) -> &XaResourceArchive {
        &self.archive
    }

    /// Participant identity
    pub fn descriptor(&self) -> &XaResourceDescriptor {
        &self.archive.descriptor
    }

    /// True once a live handle has been attached
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn archive_mut(&mut self) -> &mut XaResourceArchive {
        &mut self.archive
    }

    pub(crate) fn handle(&self) -> Option<&Arc<dyn XaResource>> {
        self.handle.as_ref()
    }

    pub(crate) fn attach(&mut self, handle: Arc<dyn XaResource>) {
        self.handle = Some(handle);
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("kind", &self.kind)
            .field("archive", &self.archive)
            .field("attached", &self.is_attached())
            .finish()
    }
}
