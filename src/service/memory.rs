//! In-memory storage implementing every collaborator trait
//!
//! Backs tests, benchmarks and embedders that do not need durability. All
//! maps are DashMaps so services can hit the store from any thread.

use super::{NodeChange, ParticipantDirectory, PersistenceSink, RegisterSource, TextSource};
use crate::error::{Result, SyncError};
use crate::protocol::{DiagramContent, FugueNodeRecord, SegmentKind};
use crate::session::Participant;
use crate::{SegmentId, UserId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct StoredSegment {
    kind: SegmentKind,
    content: String,
}

/// Simple storage implementation using DashMap
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// document id -> its text segments, in insertion order
    documents: DashMap<String, Vec<SegmentId>>,

    segments: DashMap<SegmentId, StoredSegment>,

    /// segment id -> persisted node list of a text segment
    nodes: DashMap<SegmentId, Vec<FugueNodeRecord>>,

    users: DashMap<UserId, Participant>,

    /// Number of successful `persist` calls
    writes: AtomicUsize,

    /// When set, every write fails
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text segment of `document_id` with its flat text
    pub fn add_text_segment(&self, document_id: &str, segment_id: &str, text: &str) {
        self.segments.insert(
            segment_id.to_string(),
            StoredSegment {
                kind: SegmentKind::Text,
                content: text.to_string(),
            },
        );
        let mut segments = self.documents.entry(document_id.to_string()).or_default();
        if !segments.iter().any(|s| s == segment_id) {
            segments.push(segment_id.to_string());
        }
    }

    /// Register a diagram segment with its content
    pub fn add_diagram(&self, segment_id: &str, content: &str) {
        self.segments.insert(
            segment_id.to_string(),
            StoredSegment {
                kind: SegmentKind::Diagram,
                content: content.to_string(),
            },
        );
    }

    pub fn add_user(&self, user_id: &str, display_name: &str) {
        self.users
            .insert(user_id.to_string(), Participant::new(user_id, display_name));
    }

    /// Stored flat text of a text segment
    pub fn text(&self, segment_id: &str) -> Option<String> {
        self.content_of(segment_id, SegmentKind::Text)
    }

    /// Stored content of a diagram segment
    pub fn diagram(&self, segment_id: &str) -> Option<String> {
        self.content_of(segment_id, SegmentKind::Diagram)
    }

    /// Stored node list of a text segment
    pub fn nodes(&self, segment_id: &str) -> Option<Vec<FugueNodeRecord>> {
        self.nodes.get(segment_id).map(|nodes| nodes.value().clone())
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn content_of(&self, segment_id: &str, kind: SegmentKind) -> Option<String> {
        self.segments
            .get(segment_id)
            .filter(|segment| segment.kind == kind)
            .map(|segment| segment.content.clone())
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("store is failing writes".to_string()));
        }
        Ok(())
    }
}

impl TextSource for MemoryStore {
    fn segment_ids(&self, document_id: &str) -> Result<Vec<SegmentId>> {
        Ok(self
            .documents
            .get(document_id)
            .map(|segments| segments.value().clone())
            .unwrap_or_default())
    }

    fn load_initial_content(&self, segment_id: &str) -> Result<Option<String>> {
        Ok(self.text(segment_id))
    }

    fn load_initial_nodes(&self, segment_id: &str) -> Result<Option<Vec<FugueNodeRecord>>> {
        Ok(self.nodes(segment_id))
    }
}

impl RegisterSource for MemoryStore {
    fn load_initial_register_value(&self, segment_id: &str) -> Result<Option<DiagramContent>> {
        Ok(self.diagram(segment_id).map(DiagramContent::new))
    }
}

impl PersistenceSink for MemoryStore {
    fn persist(&self, segment_id: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        let mut segment = self
            .segments
            .get_mut(segment_id)
            .ok_or_else(|| SyncError::Persistence(format!("unknown segment {}", segment_id)))?;
        segment.content = value.to_string();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn persist_node(&self, segment_id: &str, change: &NodeChange) -> Result<()> {
        self.check_writable()?;
        let mut nodes = self.nodes.entry(segment_id.to_string()).or_default();
        match change {
            NodeChange::Inserted(record) => {
                if !nodes.iter().any(|r| r.id == record.id) {
                    nodes.push(record.clone());
                }
            }
            NodeChange::Tombstoned(node_id) => {
                if let Some(record) = nodes.iter_mut().find(|r| &r.id == node_id) {
                    record.value = None;
                }
            }
        }
        Ok(())
    }

    fn persist_tree(&self, segment_id: &str, nodes: &[FugueNodeRecord]) -> Result<()> {
        self.check_writable()?;
        self.nodes.insert(segment_id.to_string(), nodes.to_vec());
        Ok(())
    }
}

impl ParticipantDirectory for MemoryStore {
    fn resolve_participant(&self, user_id: &str) -> Result<Option<Participant>> {
        Ok(self.users.get(user_id).map(|user| user.value().clone()))
    }
}
