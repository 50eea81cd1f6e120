//! Boundary API in front of both collaboration services
//!
//! The transport hands requests to a [`CollaborationEngine`] and fans the
//! echoed results out to the other participants. Nothing here knows about
//! framing or connections.

use crate::config::EngineConfig;
use crate::crdt::LwwRegister;
use crate::error::Result;
use crate::protocol::{DiagramContent, Operation, SegmentKind, Snapshot};
use crate::service::{
    DiagramCollaborationService, ParticipantDirectory, PersistenceSink, RegisterSource,
    TextCollaborationService, TextSource,
};
use crate::session::Participation;
use std::sync::Arc;

/// Text and diagram collaboration behind one API
pub struct CollaborationEngine {
    text: TextCollaborationService,
    diagram: DiagramCollaborationService,
}

impl CollaborationEngine {
    pub fn new(
        config: EngineConfig,
        text_source: Arc<dyn TextSource>,
        register_source: Arc<dyn RegisterSource>,
        sink: Arc<dyn PersistenceSink>,
        directory: Arc<dyn ParticipantDirectory>,
    ) -> Self {
        Self {
            text: TextCollaborationService::new(
                config.text,
                text_source,
                Arc::clone(&sink),
                Arc::clone(&directory),
            ),
            diagram: DiagramCollaborationService::new(
                config.diagram,
                register_source,
                sink,
                directory,
            ),
        }
    }

    /// Build an engine whose collaborators are all one store
    pub fn with_store<S>(config: EngineConfig, store: Arc<S>) -> Self
    where
        S: TextSource + RegisterSource + PersistenceSink + ParticipantDirectory + 'static,
    {
        Self::new(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            store,
        )
    }

    /// Join a session, creating it on first join
    ///
    /// Text sessions are keyed by document id, diagram sessions by segment
    /// id.
    pub fn participate(&self, kind: SegmentKind, session_id: &str, user_id: &str) -> Result<Snapshot> {
        match kind {
            SegmentKind::Text => self
                .text
                .participate(session_id, user_id)
                .map(Snapshot::Text),
            SegmentKind::Diagram => self
                .diagram
                .participate(session_id, user_id)
                .map(Snapshot::Diagram),
        }
    }

    /// Apply text operations; returns them for fan-out
    pub fn apply_operations(
        &self,
        session_id: &str,
        segment_id: &str,
        operations: &[Operation],
    ) -> Result<Vec<Operation>> {
        self.text.apply_operations(session_id, segment_id, operations)
    }

    /// Merge a diagram edit; returns the received state for fan-out
    pub fn apply_edit(
        &self,
        session_id: &str,
        state: LwwRegister<DiagramContent>,
    ) -> Result<LwwRegister<DiagramContent>> {
        self.diagram.apply_edit(session_id, state.clone())?;
        Ok(state)
    }

    pub fn participants(&self, kind: SegmentKind, session_id: &str) -> Result<Vec<Participation>> {
        match kind {
            SegmentKind::Text => self.text.participants(session_id),
            SegmentKind::Diagram => self.diagram.participants(session_id),
        }
    }

    /// Remove a participant; returns whether they were present
    pub fn leave(&self, kind: SegmentKind, session_id: &str, user_id: &str) -> Result<bool> {
        match kind {
            SegmentKind::Text => self.text.leave(session_id, user_id),
            SegmentKind::Diagram => self.diagram.leave(session_id, user_id),
        }
    }

    pub fn text(&self) -> &TextCollaborationService {
        &self.text
    }

    pub fn diagram(&self) -> &DiagramCollaborationService {
        &self.diagram
    }
}
