//! Text edit operations as they travel between editors and the engine

use crate::crdt::fugue::{NodeId, Side};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

/// Kind of a text operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Create a node under a known parent
    Insert,
    /// Tombstone a node (`REMOVE` is accepted from older clients)
    #[serde(alias = "REMOVE")]
    Delete,
}

/// One operation of an edit batch
///
/// ```json
/// {"type":"INSERT","nodeId":"u1-7","value":"a","parentId":"u1-6","side":"RIGHT","author":"u1"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: OperationType,

    pub node_id: NodeId,

    /// Required for INSERT
    #[serde(default)]
    pub value: Option<String>,

    /// Required for INSERT
    #[serde(default)]
    pub parent_id: Option<NodeId>,

    /// Required for INSERT
    #[serde(default)]
    pub side: Option<Side>,

    #[serde(default, alias = "byWho")]
    pub author: String,
}

/// Validated INSERT payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOp {
    pub node_id: NodeId,
    pub value: String,
    pub parent_id: NodeId,
    pub side: Side,
}

/// A validated operation, ready to apply to a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert(InsertOp),
    Delete(NodeId),
}

impl Operation {
    pub fn insert(
        node_id: impl Into<NodeId>,
        value: impl Into<String>,
        parent_id: impl Into<NodeId>,
        side: Side,
        author: impl Into<String>,
    ) -> Self {
        Self {
            op_type: OperationType::Insert,
            node_id: node_id.into(),
            value: Some(value.into()),
            parent_id: Some(parent_id.into()),
            side: Some(side),
            author: author.into(),
        }
    }

    pub fn delete(node_id: impl Into<NodeId>, author: impl Into<String>) -> Self {
        Self {
            op_type: OperationType::Delete,
            node_id: node_id.into(),
            value: None,
            parent_id: None,
            side: None,
            author: author.into(),
        }
    }

    /// Check the fields the operation type requires
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when an INSERT lacks its value, parent or side.
    pub fn command(&self) -> Result<Command> {
        match self.op_type {
            OperationType::Delete => Ok(Command::Delete(self.node_id.clone())),
            OperationType::Insert => {
                let missing = |field: &str| {
                    SyncError::InvalidOperation(format!(
                        "INSERT {} is missing {}",
                        self.node_id, field
                    ))
                };
                let value = self.value.clone().ok_or_else(|| missing("value"))?;
                let parent_id = self.parent_id.clone().ok_or_else(|| missing("parentId"))?;
                let side = self.side.ok_or_else(|| missing("side"))?;
                Ok(Command::Insert(InsertOp {
                    node_id: self.node_id.clone(),
                    value,
                    parent_id,
                    side,
                }))
            }
        }
    }
}

impl InsertOp {
    pub fn new(
        node_id: impl Into<NodeId>,
        value: impl Into<String>,
        parent_id: impl Into<NodeId>,
        side: Side,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            value: value.into(),
            parent_id: parent_id.into(),
            side,
        }
    }
}
