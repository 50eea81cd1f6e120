//! Session registries and the collaborators they depend on
//!
//! The services own every live session of the process and bridge edits to
//! storage. Storage and identity are external: the services only see them
//! through the traits below, which must be callable from any thread.

pub mod diagram;
pub mod memory;
pub mod text;

pub use diagram::DiagramCollaborationService;
pub use memory::MemoryStore;
pub use text::TextCollaborationService;

use crate::crdt::NodeId;
use crate::error::{Result, SyncError};
use crate::protocol::{DiagramContent, FugueNodeRecord};
use crate::session::Participant;
use crate::SegmentId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Initial content of text segments
pub trait TextSource: Send + Sync {
    /// Text segments of a document, in any order
    fn segment_ids(&self, document_id: &str) -> Result<Vec<SegmentId>>;

    /// Flat text of a segment; `None` seeds an empty tree
    fn load_initial_content(&self, segment_id: &str) -> Result<Option<String>>;

    /// Previously persisted node list of a segment, if any
    fn load_initial_nodes(&self, segment_id: &str) -> Result<Option<Vec<FugueNodeRecord>>>;
}

/// Initial content of diagram registers
pub trait RegisterSource: Send + Sync {
    /// Current stored diagram value; `None` when the segment has none
    fn load_initial_register_value(&self, segment_id: &str) -> Result<Option<DiagramContent>>;
}

/// One effective change to a persisted tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeChange {
    Inserted(FugueNodeRecord),
    Tombstoned(NodeId),
}

/// Write-back sink for merged state
pub trait PersistenceSink: Send + Sync {
    /// Store the flattened value of a segment
    fn persist(&self, segment_id: &str, value: &str) -> Result<()>;

    /// Store one node-level change of a text segment
    fn persist_node(&self, _segment_id: &str, _change: &NodeChange) -> Result<()> {
        Ok(())
    }

    /// Replace the stored node list of a text segment
    fn persist_tree(&self, _segment_id: &str, _nodes: &[FugueNodeRecord]) -> Result<()> {
        Ok(())
    }
}

/// Participant identity lookups
pub trait ParticipantDirectory: Send + Sync {
    fn resolve_participant(&self, user_id: &str) -> Result<Option<Participant>>;
}

/// Look up a joining user, failing if the directory does not know them
pub(crate) fn resolve(directory: &dyn ParticipantDirectory, user_id: &str) -> Result<Participant> {
    directory
        .resolve_participant(user_id)?
        .ok_or_else(|| SyncError::ParticipantNotFound(user_id.to_string()))
}

/// A registered session plus the gate its creator holds until the session
/// is ready for use
#[derive(Debug)]
struct Slot<S> {
    session: Arc<S>,
    ready: RwLock<()>,
}

impl<S> Slot<S> {
    /// Block until the creator has finished the `created` hook
    fn wait(&self) -> Arc<S> {
        drop(self.ready.read());
        Arc::clone(&self.session)
    }
}

/// Process-wide map from session id to live session
///
/// At most one session is ever registered per key.
#[derive(Debug)]
pub(crate) struct SessionRegistry<S> {
    sessions: DashMap<String, Arc<Slot<S>>>,
}

impl<S> SessionRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// The live session for `id`, once its creator has finished with it
    pub(crate) fn get(&self, id: &str) -> Option<Arc<S>> {
        let slot = self.sessions.get(id).map(|slot| Arc::clone(slot.value()))?;
        Some(slot.wait())
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Return the live session for `id`, building it with `build` if absent
    ///
    /// Neither `build` nor `created` runs under a registry lock, since both
    /// usually call storage. When two callers race, the loser's session is
    /// discarded and both get the one that was registered first. `created`
    /// runs only for the winner; other callers asking for the session block
    /// until it returns.
    pub(crate) fn get_or_create<F, C>(&self, id: &str, build: F, created: C) -> Result<Arc<S>>
    where
        F: FnOnce() -> Result<S>,
        C: FnOnce(&S),
    {
        if let Some(session) = self.get(id) {
            return Ok(session);
        }

        let fresh = Arc::new(Slot {
            session: Arc::new(build()?),
            ready: RwLock::new(()),
        });
        let pending = fresh.ready.write();
        let registered = match self.sessions.entry(id.to_string()) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&fresh));
                Arc::clone(&fresh)
            }
        };

        if !Arc::ptr_eq(&registered, &fresh) {
            drop(pending);
            tracing::debug!(session = %id, "join race lost, using concurrently created session");
            return Ok(registered.wait());
        }

        created(&fresh.session);
        drop(pending);
        tracing::info!(session = %id, "created session");
        Ok(Arc::clone(&fresh.session))
    }
}
