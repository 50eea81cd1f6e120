//! Text collaboration service
//!
//! Sessions are keyed by document id and hold one tree per text segment of
//! the document. Joining creates the session on demand; editing requires a
//! live session.

use super::{
    resolve, NodeChange, ParticipantDirectory, PersistenceSink, SessionRegistry, TextSource,
};
use crate::config::{SeedMode, TextConfig};
use crate::crdt::{Applied, FugueTree};
use crate::error::{Result, SyncError};
use crate::protocol::{Command, FugueNodeRecord, Operation, TextSegmentSnapshot};
use crate::session::{Participation, TextSession};
use std::sync::Arc;

pub struct TextCollaborationService {
    config: TextConfig,
    sessions: SessionRegistry<TextSession>,
    source: Arc<dyn TextSource>,
    sink: Arc<dyn PersistenceSink>,
    directory: Arc<dyn ParticipantDirectory>,
}

impl TextCollaborationService {
    pub fn new(
        config: TextConfig,
        source: Arc<dyn TextSource>,
        sink: Arc<dyn PersistenceSink>,
        directory: Arc<dyn ParticipantDirectory>,
    ) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
            source,
            sink,
            directory,
        }
    }

    /// Join `user_id` to the session of `document_id`
    ///
    /// Creates the session if none is live. Returns the full structure of
    /// every segment so the client can render the current document.
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` for an unknown user (no session is created), or
    /// whatever the text source or node replay reports while seeding.
    pub fn participate(&self, document_id: &str, user_id: &str) -> Result<Vec<TextSegmentSnapshot>> {
        let participant = resolve(self.directory.as_ref(), user_id)?;
        let session = self.sessions.get_or_create(
            document_id,
            || self.load_session(document_id),
            |session| self.persist_baseline(session),
        )?;
        session.participants().add(&participant);
        Ok(session.snapshot())
    }

    /// Apply a batch of operations to one segment, in order
    ///
    /// The whole batch is validated before anything is applied. Operations
    /// with an unknown parent or target are dropped silently. When at least
    /// one operation changed the tree, the flattened text is written back once.
    /// Returns the batch for fan-out.
    pub fn apply_operations(
        &self,
        document_id: &str,
        segment_id: &str,
        operations: &[Operation],
    ) -> Result<Vec<Operation>> {
        let session = self.require(document_id)?;
        let tree = session.segment(segment_id)?;
        if operations.len() > self.config.max_batch_operations {
            return Err(SyncError::InvalidOperation(format!(
                "batch of {} operations exceeds limit of {}",
                operations.len(),
                self.config.max_batch_operations
            )));
        }

        let commands = operations
            .iter()
            .map(Operation::command)
            .collect::<Result<Vec<Command>>>()?;

        let mut effective = 0usize;
        for command in &commands {
            let applied = tree.apply(command);
            if !applied.is_effective() {
                continue;
            }
            effective += 1;
            if self.config.persist_nodes {
                self.persist_node(segment_id, command, &applied);
            }
        }

        if effective > 0 {
            session
                .write_back(segment_id, |text| {
                    tracing::debug!(
                        segment = %segment_id,
                        effective,
                        len = text.len(),
                        "writing back segment text"
                    );
                    self.sink.persist(segment_id, text)
                })?
                .map_err(|e| {
                    tracing::warn!(segment = %segment_id, error = %e, "failed to persist segment text");
                    e
                })?;
        }

        Ok(operations.to_vec())
    }

    /// Participants of a live session, in join order
    pub fn participants(&self, document_id: &str) -> Result<Vec<Participation>> {
        Ok(self.require(document_id)?.participants().list())
    }

    /// Remove a participant; the session stays live
    pub fn leave(&self, document_id: &str, user_id: &str) -> Result<bool> {
        Ok(self.require(document_id)?.participants().remove(user_id).is_some())
    }

    pub fn session(&self, document_id: &str) -> Option<Arc<TextSession>> {
        self.sessions.get(document_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn require(&self, document_id: &str) -> Result<Arc<TextSession>> {
        self.session(document_id)
            .ok_or_else(|| SyncError::SessionNotFound(document_id.to_string()))
    }

    fn load_session(&self, document_id: &str) -> Result<TextSession> {
        let segments = self
            .source
            .segment_ids(document_id)?
            .into_iter()
            .map(|segment_id| {
                let tree = self.seed_tree(&segment_id)?;
                Ok((segment_id, tree))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TextSession::new(document_id, segments))
    }

    fn seed_tree(&self, segment_id: &str) -> Result<FugueTree> {
        if self.config.seed == SeedMode::PersistedNodes {
            if let Some(records) = self.source.load_initial_nodes(segment_id)? {
                if !records.is_empty() {
                    return FugueTree::from_nodes(records);
                }
            }
        }
        let text = self.source.load_initial_content(segment_id)?;
        Ok(FugueTree::from_plain_text(text.as_deref()))
    }

    /// Store the seeded node lists, so node-level changes written afterwards
    /// replay on top of the same ids
    fn persist_baseline(&self, session: &TextSession) {
        if !self.config.persist_nodes {
            return;
        }
        for (segment_id, tree) in session.segments() {
            if let Err(e) = self.sink.persist_tree(segment_id, &tree.export_nodes()) {
                tracing::warn!(segment = %segment_id, error = %e, "failed to persist seeded tree");
            }
        }
    }

    fn persist_node(&self, segment_id: &str, command: &Command, applied: &Applied) {
        let change = match (command, applied) {
            (Command::Insert(op), Applied::Inserted(_)) => NodeChange::Inserted(
                FugueNodeRecord::child(
                    op.node_id.clone(),
                    op.parent_id.clone(),
                    Some(op.value.clone()),
                    op.side,
                ),
            ),
            (Command::Delete(node_id), Applied::Tombstoned(_)) => {
                NodeChange::Tombstoned(node_id.clone())
            }
            _ => return,
        };
        if let Err(e) = self.sink.persist_node(segment_id, &change) {
            tracing::warn!(segment = %segment_id, error = %e, "failed to persist node change");
        }
    }
}
