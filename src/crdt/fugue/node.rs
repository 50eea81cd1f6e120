//! FugueNode: one element of the Fugue tree
//!
//! A node carries an immutable id, an optional value (`None` is a tombstone)
//! and two child lists. Each child list is sorted by ascending [`NodeId`] and
//! guarded by its own lock, so inserts under different parents or on
//! different sides of the same parent never contend.

use super::id::NodeId;
use crate::error::{Result, SyncError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which child list of the parent a node hangs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Ordered before the parent
    Left,
    /// Ordered after the parent
    Right,
}

/// A node of the Fugue tree
///
/// The parent edge is fixed at insertion time and never changes. The only
/// mutation an existing node ever sees is [`FugueNode::remove`].
#[derive(Debug)]
pub struct FugueNode {
    id: NodeId,
    value: Mutex<Option<String>>,
    left_children: RwLock<Vec<Arc<FugueNode>>>,
    right_children: RwLock<Vec<Arc<FugueNode>>>,
}

impl FugueNode {
    /// Create a detached node
    pub fn new(id: NodeId, value: Option<String>) -> Self {
        Self {
            id,
            value: Mutex::new(value),
            left_children: RwLock::new(Vec::new()),
            right_children: RwLock::new(Vec::new()),
        }
    }

    /// The root sentinel: no value, no parent
    pub fn root() -> Self {
        Self::new(NodeId::root(), None)
    }

    /// This node's id
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    fn side(&self, side: Side) -> &RwLock<Vec<Arc<FugueNode>>> {
        match side {
            Side::Left => &self.left_children,
            Side::Right => &self.right_children,
        }
    }

    /// Attach `node` on `side`, keeping the list sorted by id
    ///
    /// Returns false without touching the list when a child with the same id
    /// is already present on that side.
    pub fn add_child(&self, side: Side, node: Arc<FugueNode>) -> bool {
        let mut children = self.side(side).write();
        match children.binary_search_by(|child| child.id.cmp(&node.id)) {
            Ok(_) => false,
            Err(index) => {
                children.insert(index, node);
                true
            }
        }
    }

    /// Snapshot of the children on `side`, ascending by id
    pub fn children(&self, side: Side) -> Vec<Arc<FugueNode>> {
        self.side(side).read().clone()
    }

    /// Number of children on `side`
    pub fn child_count(&self, side: Side) -> usize {
        self.side(side).read().len()
    }

    pub(crate) fn clear_children(&self) {
        self.left_children.write().clear();
        self.right_children.write().clear();
    }

    /// Tombstone this node
    ///
    /// Returns whether the value changed; removing a tombstone again is a no-op.
    pub fn remove(&self) -> bool {
        self.value.lock().take().is_some()
    }

    /// Current value, `None` once tombstoned
    pub fn get(&self) -> Option<String> {
        self.value.lock().clone()
    }

    /// Whether this node has been tombstoned (the root always reports true)
    pub fn is_tombstone(&self) -> bool {
        self.value.lock().is_none()
    }

    /// Always fails: a Fugue node is not a register, and a tombstone always
    /// wins over any later attempt to restore a value
    pub fn update(&self, _value: &str) -> Result<()> {
        Err(SyncError::UnsupportedOperation("update of a Fugue node value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, value: &str) -> Arc<FugueNode> {
        Arc::new(FugueNode::new(NodeId::from(id), Some(value.to_string())))
    }

    fn ids(children: &[Arc<FugueNode>]) -> Vec<&str> {
        children.iter().map(|c| c.id().as_str()).collect()
    }

    #[test]
    fn test_add_child_keeps_id_order() {
        let parent = FugueNode::root();
        parent.add_child(Side::Right, node("c", "C"));
        parent.add_child(Side::Right, node("a", "A"));
        parent.add_child(Side::Right, node("b", "B"));

        let children = parent.children(Side::Right);
        assert_eq!(ids(&children), vec!["a", "b", "c"]);
        assert_eq!(parent.child_count(Side::Left), 0);
    }

    #[test]
    fn test_sides_are_independent() {
        let parent = FugueNode::root();
        parent.add_child(Side::Left, node("x", "X"));
        parent.add_child(Side::Right, node("y", "Y"));

        assert_eq!(ids(&parent.children(Side::Left)), vec!["x"]);
        assert_eq!(ids(&parent.children(Side::Right)), vec!["y"]);
    }

    #[test]
    fn test_add_duplicate_child_is_rejected() {
        let parent = FugueNode::root();
        assert!(parent.add_child(Side::Right, node("a", "A")));
        assert!(!parent.add_child(Side::Right, node("a", "A")));
        assert_eq!(parent.child_count(Side::Right), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let n = FugueNode::new(NodeId::from("a"), Some("A".into()));
        assert_eq!(n.get(), Some("A".to_string()));

        assert!(n.remove());
        assert_eq!(n.get(), None);
        assert!(n.is_tombstone());

        assert!(!n.remove());
        assert_eq!(n.get(), None);
    }

    #[test]
    fn test_update_always_fails() {
        let n = FugueNode::new(NodeId::from("a"), Some("A".into()));
        assert!(matches!(
            n.update("B"),
            Err(SyncError::UnsupportedOperation(_))
        ));
        assert_eq!(n.get(), Some("A".to_string()));

        n.remove();
        assert!(n.update("A").is_err());
        assert_eq!(n.get(), None, "tombstone wins over update");
    }

    #[test]
    fn test_concurrent_add_child_same_side() {
        let parent = Arc::new(FugueNode::root());

        std::thread::scope(|scope| {
            for t in 0..8 {
                let parent = Arc::clone(&parent);
                scope.spawn(move || {
                    for i in 0..50 {
                        let id = format!("t{}-{:03}", t, i);
                        parent.add_child(Side::Right, node(&id, "v"));
                    }
                });
            }
        });

        let children = parent.children(Side::Right);
        assert_eq!(children.len(), 400);
        assert!(children.windows(2).all(|w| w[0].id() < w[1].id()));
    }
}
