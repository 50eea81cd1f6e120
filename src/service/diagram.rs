//! Diagram collaboration service
//!
//! One session per diagram segment, each holding a single LWW register
//! seeded from the stored diagram content.

use super::{resolve, ParticipantDirectory, PersistenceSink, RegisterSource, SessionRegistry};
use crate::config::DiagramConfig;
use crate::crdt::LwwRegister;
use crate::error::{Result, SyncError};
use crate::protocol::DiagramContent;
use crate::session::{DiagramSession, Participation};
use std::sync::Arc;

pub struct DiagramCollaborationService {
    config: DiagramConfig,
    sessions: SessionRegistry<DiagramSession>,
    source: Arc<dyn RegisterSource>,
    sink: Arc<dyn PersistenceSink>,
    directory: Arc<dyn ParticipantDirectory>,
}

impl DiagramCollaborationService {
    pub fn new(
        config: DiagramConfig,
        source: Arc<dyn RegisterSource>,
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

    /// Join `user_id` to the session of diagram `segment_id`
    ///
    /// Returns the current register state.
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` for an unknown user, `RegisterNotFound` when
    /// storage holds no diagram under `segment_id`.
    pub fn participate(
        &self,
        segment_id: &str,
        user_id: &str,
    ) -> Result<LwwRegister<DiagramContent>> {
        let participant = resolve(self.directory.as_ref(), user_id)?;
        let session = self.sessions.get_or_create(
            segment_id,
            || self.load_session(segment_id),
            |_| {},
        )?;
        session.participants().add(&participant);
        Ok(session.state())
    }

    /// Merge a candidate state into the session's register
    ///
    /// Writes the content back only when it changed. Returns whether it did.
    pub fn apply_edit(&self, segment_id: &str, candidate: LwwRegister<DiagramContent>) -> Result<bool> {
        let session = self.require(segment_id)?;
        if !session.apply_edit(candidate) {
            return Ok(false);
        }

        session
            .write_back(|content| {
                tracing::debug!(segment = %segment_id, len = content.len(), "writing back diagram content");
                self.sink.persist(segment_id, content)
            })
            .map_err(|e| {
                tracing::warn!(segment = %segment_id, error = %e, "failed to persist diagram content");
                e
            })?;
        Ok(true)
    }

    /// Current register state of a live session
    pub fn state(&self, segment_id: &str) -> Result<LwwRegister<DiagramContent>> {
        Ok(self.require(segment_id)?.state())
    }

    pub fn participants(&self, segment_id: &str) -> Result<Vec<Participation>> {
        Ok(self.require(segment_id)?.participants().list())
    }

    /// Remove a participant; the session stays live
    pub fn leave(&self, segment_id: &str, user_id: &str) -> Result<bool> {
        Ok(self.require(segment_id)?.participants().remove(user_id).is_some())
    }

    pub fn session(&self, segment_id: &str) -> Option<Arc<DiagramSession>> {
        self.sessions.get(segment_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn require(&self, segment_id: &str) -> Result<Arc<DiagramSession>> {
        self.session(segment_id)
            .ok_or_else(|| SyncError::SessionNotFound(segment_id.to_string()))
    }

    fn load_session(&self, segment_id: &str) -> Result<DiagramSession> {
        let content = self
            .source
            .load_initial_register_value(segment_id)?
            .ok_or_else(|| SyncError::RegisterNotFound(segment_id.to_string()))?;
        let register = LwwRegister::new(
            self.config.seed_state_id.clone(),
            self.config.seed_timestamp,
            content,
        );
        Ok(DiagramSession::new(segment_id, register))
    }
}
