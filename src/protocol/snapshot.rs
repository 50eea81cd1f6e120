//! State handed to a joining editor so it can render the authoritative
//! document before its first edit

use crate::crdt::fugue::{NodeId, Side};
use crate::crdt::LwwRegister;
use crate::SegmentId;
use serde::{Deserialize, Serialize};

/// One node of an exported tree
///
/// The root record has no parent and no side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FugueNodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub side: Option<Side>,
}

impl FugueNodeRecord {
    pub fn root() -> Self {
        Self {
            id: NodeId::root(),
            parent_id: None,
            value: None,
            side: None,
        }
    }

    pub fn child(
        id: impl Into<NodeId>,
        parent_id: impl Into<NodeId>,
        value: Option<String>,
        side: Side,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
            value,
            side: Some(side),
        }
    }
}

/// Full CRDT structure of one text segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegmentSnapshot {
    pub segment_id: SegmentId,
    pub root_node: FugueNodeRecord,
    /// Breadth-first, root first
    pub nodes: Vec<FugueNodeRecord>,
}

/// Value held by a diagram register
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiagramContent {
    pub content: String,
}

impl DiagramContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// What a segment is edited as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Diagram,
}

/// Answer to a join request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "lowercase")]
pub enum Snapshot {
    Text(Vec<TextSegmentSnapshot>),
    Diagram(LwwRegister<DiagramContent>),
}

impl Snapshot {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Snapshot::Text(_) => SegmentKind::Text,
            Snapshot::Diagram(_) => SegmentKind::Diagram,
        }
    }
}
