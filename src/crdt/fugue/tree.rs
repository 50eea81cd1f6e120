//! FugueTree: the text CRDT of one segment
//!
//! # Structure
//!
//! ```text
//!              rt
//!               \ (RIGHT)
//!               pl00000000 "H"
//!              /            \
//!   (LEFT) u2-1 "X"          pl00000001 "i"
//! ```
//!
//! Document order is a depth-first pre-order walk: every node is visited
//! before its children, then its left children's subtrees, then its right
//! children's subtrees, each side taken in ascending id order. The tree above
//! reads `"HXi"`.
//!
//! # Convergence
//!
//! Inserts never move existing nodes and deletes only tombstone, so any
//! delivery order in which a parent arrives before its children produces the
//! same structure and the same [`FugueTree::ordered_values`]. Operations that
//! arrive before their parent are dropped, not buffered; causal delivery is
//! the transport's job.
//!
//! # Concurrency
//!
//! The node registry is a [`DashMap`]; each node guards each of its child
//! lists separately (see [`FugueNode`]). All methods take `&self`.

use super::id::NodeId;
use super::node::{FugueNode, Side};
use crate::error::{Result, SyncError};
use crate::protocol::{Command, FugueNodeRecord, InsertOp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::vec;

/// Outcome of applying one operation to a tree
#[derive(Debug, Clone)]
pub enum Applied {
    /// A new node was attached under its parent
    Inserted(Arc<FugueNode>),
    /// A live node was tombstoned
    Tombstoned(Arc<FugueNode>),
    /// Already applied: duplicate insert id, or delete of a tombstone
    Unchanged,
    /// Parent (insert) or target (delete) is not known here
    Dropped,
}

impl Applied {
    /// Whether the tree changed
    pub fn is_effective(&self) -> bool {
        matches!(self, Applied::Inserted(_) | Applied::Tombstoned(_))
    }

    /// The node an effective operation touched
    pub fn node(&self) -> Option<&Arc<FugueNode>> {
        match self {
            Applied::Inserted(node) | Applied::Tombstoned(node) => Some(node),
            Applied::Unchanged | Applied::Dropped => None,
        }
    }
}

/// Fugue tree CRDT
#[derive(Debug)]
pub struct FugueTree {
    root: Arc<FugueNode>,
    nodes: DashMap<NodeId, Arc<FugueNode>>,
}

enum Stage {
    Left(vec::IntoIter<Arc<FugueNode>>),
    Right(vec::IntoIter<Arc<FugueNode>>),
}

struct Frame {
    node: Arc<FugueNode>,
    stage: Stage,
}

impl Frame {
    fn new(node: Arc<FugueNode>) -> Self {
        let left = node.children(Side::Left).into_iter();
        Self {
            node,
            stage: Stage::Left(left),
        }
    }
}

impl FugueTree {
    /// An empty tree holding only the root sentinel
    pub fn new() -> Self {
        let root = Arc::new(FugueNode::root());
        let nodes = DashMap::new();
        nodes.insert(root.id().clone(), Arc::clone(&root));
        Self { root, nodes }
    }

    /// Convert flat text into a tree
    ///
    /// Each `char` becomes one node, chained to the right of the
    /// previous one (the first hangs right of the root), with ids from
    /// [`NodeId::plain_text`]. `None` is treated as empty text.
    ///
    /// ```rust
    /// use cowrite_core::crdt::fugue::FugueTree;
    ///
    /// let tree = FugueTree::from_plain_text(Some("ABC"));
    /// assert_eq!(tree.ordered_values(), vec!["A", "B", "C"]);
    /// ```
    pub fn from_plain_text(text: Option<&str>) -> Self {
        let tree = Self::new();
        let mut current = Arc::clone(&tree.root);
        for (index, ch) in text.unwrap_or_default().chars().enumerate() {
            let id = NodeId::plain_text(index);
            let node = Arc::new(FugueNode::new(id.clone(), Some(ch.to_string())));
            current.add_child(Side::Right, Arc::clone(&node));
            tree.nodes.insert(id, Arc::clone(&node));
            current = node;
        }
        tree
    }

    /// Rebuild a tree from a previously exported node list
    ///
    /// Records may come in any order; they are attached breadth-first from
    /// the root. Records that cannot be reached from the root are skipped.
    ///
    /// # Errors
    ///
    /// `InvalidNodeList` if the root record is missing, an id repeats, or a
    /// non-root record lacks its parent or side.
    pub fn from_nodes<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = FugueNodeRecord>,
    {
        let mut seen = HashSet::new();
        let mut saw_root = false;
        let mut pending: HashMap<NodeId, Vec<(NodeId, Option<String>, Side)>> = HashMap::new();
        let mut total = 0usize;

        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(SyncError::InvalidNodeList(format!(
                    "duplicate node id {}",
                    record.id
                )));
            }
            if record.id.is_root() {
                if record.parent_id.is_some() {
                    return Err(SyncError::InvalidNodeList(
                        "root record has a parent".to_string(),
                    ));
                }
                saw_root = true;
                continue;
            }
            match (record.parent_id, record.side) {
                (Some(parent), Some(side)) => {
                    pending
                        .entry(parent)
                        .or_default()
                        .push((record.id, record.value, side));
                    total += 1;
                }
                _ => {
                    return Err(SyncError::InvalidNodeList(format!(
                        "node {} has no parent edge",
                        record.id
                    )))
                }
            }
        }

        if !saw_root {
            return Err(SyncError::InvalidNodeList(
                "missing root record".to_string(),
            ));
        }

        let tree = Self::new();
        let mut queue = VecDeque::from([Arc::clone(&tree.root)]);
        let mut attached = 0usize;
        while let Some(parent) = queue.pop_front() {
            let Some(children) = pending.remove(parent.id()) else {
                continue;
            };
            for (id, value, side) in children {
                let node = Arc::new(FugueNode::new(id.clone(), value));
                parent.add_child(side, Arc::clone(&node));
                tree.nodes.insert(id, Arc::clone(&node));
                queue.push_back(node);
                attached += 1;
            }
        }

        if attached < total {
            tracing::warn!(
                skipped = total - attached,
                "skipping node records unreachable from the root"
            );
        }

        Ok(tree)
    }

    /// The root sentinel
    pub fn root(&self) -> &Arc<FugueNode> {
        &self.root
    }

    /// Look up a node by id
    pub fn get(&self, id: &str) -> Option<Arc<FugueNode>> {
        self.nodes.get(id).map(|node| Arc::clone(node.value()))
    }

    /// Whether a node with this id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of registered nodes, root and tombstones included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Attach a new node under a known parent
    ///
    /// Unknown parent: [`Applied::Dropped`]. Id already registered:
    /// [`Applied::Unchanged`].
    pub fn insert(&self, op: &InsertOp) -> Applied {
        let parent = match self.get(op.parent_id.as_str()) {
            Some(parent) => parent,
            None => {
                tracing::debug!(
                    node = %op.node_id,
                    parent = %op.parent_id,
                    "dropping insert under unknown parent"
                );
                return Applied::Dropped;
            }
        };

        // The registry slot stays locked until the node is attached, so two
        // deliveries of the same insert cannot both attach it.
        match self.nodes.entry(op.node_id.clone()) {
            Entry::Occupied(_) => Applied::Unchanged,
            Entry::Vacant(slot) => {
                let node = Arc::new(FugueNode::new(op.node_id.clone(), Some(op.value.clone())));
                parent.add_child(op.side, Arc::clone(&node));
                slot.insert(Arc::clone(&node));
                Applied::Inserted(node)
            }
        }
    }

    /// Tombstone a node; it stays registered and remains a valid parent
    pub fn delete(&self, node_id: &str) -> Applied {
        match self.get(node_id) {
            Some(node) => {
                if node.remove() {
                    Applied::Tombstoned(node)
                } else {
                    Applied::Unchanged
                }
            }
            None => {
                tracing::debug!(node = %node_id, "dropping delete of unknown node");
                Applied::Dropped
            }
        }
    }

    /// Always fails, see [`FugueNode::update`]
    pub fn update(&self, _node_id: &str, _value: &str) -> Result<()> {
        Err(SyncError::UnsupportedOperation("update of a Fugue tree node"))
    }

    /// Apply a validated command
    pub fn apply(&self, command: &Command) -> Applied {
        match command {
            Command::Insert(op) => self.insert(op),
            Command::Delete(node_id) => self.delete(node_id.as_str()),
        }
    }

    /// Visit every node, root and tombstones included, in document order
    ///
    /// A node is visited when the walk reaches it, ahead of its left and then
    /// its right subtrees. Iterative, so document depth is bounded only by
    /// memory. Child lists are snapshotted as the walk reaches them.
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(&FugueNode),
    {
        visitor(self.root.as_ref());
        let mut stack = vec![Frame::new(Arc::clone(&self.root))];

        while let Some(frame) = stack.last_mut() {
            let next = match &mut frame.stage {
                Stage::Left(children) => match children.next() {
                    Some(child) => Some(child),
                    None => {
                        frame.stage = Stage::Right(frame.node.children(Side::Right).into_iter());
                        continue;
                    }
                },
                Stage::Right(children) => children.next(),
            };

            match next {
                Some(child) => {
                    visitor(child.as_ref());
                    stack.push(Frame::new(child));
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    /// Live values in document order
    pub fn ordered_values(&self) -> Vec<String> {
        let mut output = Vec::with_capacity(self.nodes.len());
        self.traverse(|node| {
            if let Some(value) = node.get() {
                output.push(value);
            }
        });
        output
    }

    /// Live values concatenated: the flattened text of the segment
    pub fn text(&self) -> String {
        self.ordered_values().concat()
    }

    /// Breadth-first dump of every node, root first
    pub fn export_nodes(&self) -> Vec<FugueNodeRecord> {
        let mut records = Vec::with_capacity(self.nodes.len());
        records.push(FugueNodeRecord::root());

        let mut queue = VecDeque::from([Arc::clone(&self.root)]);
        while let Some(node) = queue.pop_front() {
            for side in [Side::Left, Side::Right] {
                for child in node.children(side) {
                    records.push(FugueNodeRecord::child(
                        child.id().clone(),
                        node.id().clone(),
                        child.get(),
                        side,
                    ));
                    queue.push_back(child);
                }
            }
        }
        records
    }
}

impl Default for FugueTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FugueTree {
    fn drop(&mut self) {
        // Detach child lists first so dropping a long chain does not recurse
        // once per node.
        for node in self.nodes.iter() {
            node.value().clear_children();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    fn ins(id: &str, value: &str, parent: &str, side: Side) -> InsertOp {
        InsertOp::new(id, value, parent, side)
    }

    #[test]
    fn test_from_plain_text() {
        let tree = FugueTree::from_plain_text(Some("ABC"));
        assert_eq!(tree.ordered_values(), vec!["A", "B", "C"]);
        assert_eq!(tree.node_count(), 4);
        assert!(tree.contains("pl00000002"));
    }

    #[test]
    fn test_from_plain_text_none_is_empty() {
        let tree = FugueTree::from_plain_text(None);
        assert!(tree.ordered_values().is_empty());
        assert_eq!(tree.node_count(), 1);

        let tree = FugueTree::from_plain_text(Some(""));
        assert_eq!(tree.text(), "");
    }

    #[test]
    fn test_from_plain_text_one_node_per_char() {
        let tree = FugueTree::from_plain_text(Some("e\u{301}👋!"));
        assert_eq!(tree.ordered_values(), vec!["e", "\u{301}", "👋", "!"]);
        assert_eq!(tree.get("pl00000001").and_then(|n| n.get()).as_deref(), Some("\u{301}"));
        assert_eq!(tree.text(), "e\u{301}👋!");
    }

    #[test]
    fn test_sequential_right_inserts() {
        let tree = FugueTree::new();
        assert!(tree.insert(&ins("1", "A", "rt", Side::Right)).is_effective());
        assert!(tree.insert(&ins("2", "B", "1", Side::Right)).is_effective());
        assert!(tree.insert(&ins("3", "C", "2", Side::Right)).is_effective());

        assert_eq!(tree.ordered_values(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_left_child_follows_parent() {
        let tree = FugueTree::from_plain_text(Some("Hi"));
        tree.insert(&ins("u2-1", "X", "pl00000000", Side::Left));
        assert_eq!(tree.text(), "HXi");
    }

    #[test]
    fn test_traverse_is_pre_order() {
        let tree = FugueTree::new();
        tree.insert(&ins("b", "B", "rt", Side::Right));
        tree.insert(&ins("a", "A", "b", Side::Left));
        tree.insert(&ins("c", "C", "b", Side::Right));
        tree.insert(&ins("d", "D", "a", Side::Right));

        let mut visited = Vec::new();
        tree.traverse(|node| visited.push(node.id().to_string()));

        assert_eq!(visited, vec!["rt", "b", "a", "d", "c"]);
        assert_eq!(tree.ordered_values(), vec!["B", "A", "D", "C"]);
    }

    #[test]
    fn test_concurrent_siblings_ordered_by_id() {
        let a = FugueTree::new();
        a.insert(&ins("bob-1", "B", "rt", Side::Right));
        a.insert(&ins("alice-1", "A", "rt", Side::Right));

        let b = FugueTree::new();
        b.insert(&ins("alice-1", "A", "rt", Side::Right));
        b.insert(&ins("bob-1", "B", "rt", Side::Right));

        assert_eq!(a.text(), "AB");
        assert_eq!(a.text(), b.text());
    }

    #[test]
    fn test_insert_unknown_parent_is_dropped() {
        let tree = FugueTree::from_plain_text(Some("ab"));
        let before = tree.export_nodes();

        let applied = tree.insert(&ins("x", "X", "missing", Side::Right));
        assert!(matches!(applied, Applied::Dropped));
        assert!(!tree.contains("x"));
        assert_eq!(tree.export_nodes(), before);
    }

    #[test]
    fn test_duplicate_insert_is_unchanged() {
        let tree = FugueTree::new();
        let op = ins("1", "A", "rt", Side::Right);

        assert!(matches!(tree.insert(&op), Applied::Inserted(_)));
        assert!(matches!(tree.insert(&op), Applied::Unchanged));
        assert_eq!(tree.text(), "A");
        assert_eq!(tree.root().child_count(Side::Right), 1);
    }

    #[test]
    fn test_insert_with_root_id_is_unchanged() {
        let tree = FugueTree::new();
        assert!(matches!(
            tree.insert(&ins("rt", "A", "rt", Side::Right)),
            Applied::Unchanged
        ));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_deleted_node_remains_parent() {
        let tree = FugueTree::from_plain_text(Some("ABC"));
        assert!(matches!(tree.delete("pl00000001"), Applied::Tombstoned(_)));
        assert_eq!(tree.ordered_values(), vec!["A", "C"]);
        assert!(tree.contains("pl00000001"));

        let applied = tree.insert(&ins("u1-1", "x", "pl00000001", Side::Right));
        assert!(applied.is_effective());
        assert_eq!(tree.text(), "ACx");
    }

    #[test]
    fn test_delete_idempotent_and_unknown() {
        let tree = FugueTree::from_plain_text(Some("A"));
        assert!(tree.delete("pl00000000").is_effective());
        assert!(matches!(tree.delete("pl00000000"), Applied::Unchanged));
        assert!(matches!(tree.delete("nope"), Applied::Dropped));
        assert!(matches!(tree.delete("rt"), Applied::Unchanged));
    }

    #[test]
    fn test_update_always_fails() {
        let tree = FugueTree::from_plain_text(Some("A"));
        assert!(matches!(
            tree.update("pl00000000", "B"),
            Err(SyncError::UnsupportedOperation(_))
        ));
        assert!(tree.update("missing", "B").is_err());
        assert_eq!(tree.text(), "A");
    }

    #[test]
    fn test_traverse_visits_every_node_once() {
        let tree = FugueTree::from_plain_text(Some("hello"));
        tree.insert(&ins("x1", "X", "pl00000002", Side::Left));
        tree.delete("pl00000003");

        let mut visited = Vec::new();
        tree.traverse(|node| visited.push(node.id().clone()));

        assert_eq!(visited.len(), tree.node_count());
        let unique: HashSet<_> = visited.iter().collect();
        assert_eq!(unique.len(), visited.len());
    }

    #[test]
    fn test_export_is_breadth_first_root_first() {
        let tree = FugueTree::new();
        tree.insert(&ins("a", "A", "rt", Side::Right));
        tree.insert(&ins("b", "B", "a", Side::Right));
        tree.insert(&ins("c", "C", "a", Side::Left));
        tree.delete("b");

        let records = tree.export_nodes();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rt", "a", "c", "b"]);

        assert_eq!(records[0], FugueNodeRecord::root());
        assert_eq!(records[2].side, Some(Side::Left));
        assert_eq!(records[3].value, None, "tombstones are exported");
    }

    #[test]
    fn test_from_nodes_replays_export() {
        let tree = FugueTree::from_plain_text(Some("abc"));
        tree.insert(&ins("u1-1", "X", "pl00000001", Side::Left));
        tree.delete("pl00000002");

        let replayed = FugueTree::from_nodes(tree.export_nodes()).unwrap();
        assert_eq!(replayed.text(), tree.text());
        assert_eq!(replayed.export_nodes(), tree.export_nodes());
    }

    #[test]
    fn test_from_nodes_any_order() {
        let tree = FugueTree::from_plain_text(Some("wxyz"));
        let mut records = tree.export_nodes();
        records.reverse();

        let replayed = FugueTree::from_nodes(records).unwrap();
        assert_eq!(replayed.text(), "wxyz");
    }

    #[test]
    fn test_from_nodes_rejects_bad_lists() {
        let no_root = vec![FugueNodeRecord::child("a", "rt", Some("A".into()), Side::Right)];
        assert!(matches!(
            FugueTree::from_nodes(no_root),
            Err(SyncError::InvalidNodeList(_))
        ));

        let duplicate = vec![
            FugueNodeRecord::root(),
            FugueNodeRecord::child("a", "rt", Some("A".into()), Side::Right),
            FugueNodeRecord::child("a", "rt", Some("B".into()), Side::Right),
        ];
        assert!(FugueTree::from_nodes(duplicate).is_err());

        let no_side = vec![
            FugueNodeRecord::root(),
            FugueNodeRecord {
                id: NodeId::from("a"),
                parent_id: Some(NodeId::root()),
                value: Some("A".into()),
                side: None,
            },
        ];
        assert!(FugueTree::from_nodes(no_side).is_err());
    }

    #[test]
    fn test_from_nodes_skips_orphans() {
        let records = vec![
            FugueNodeRecord::root(),
            FugueNodeRecord::child("a", "rt", Some("A".into()), Side::Right),
            FugueNodeRecord::child("z", "ghost", Some("Z".into()), Side::Right),
        ];
        let tree = FugueTree::from_nodes(records).unwrap();
        assert_eq!(tree.text(), "A");
        assert!(!tree.contains("z"));
    }

    #[test]
    fn test_deep_document() {
        let text = "a".repeat(200_000);
        let tree = FugueTree::from_plain_text(Some(text.as_str()));
        assert_eq!(tree.ordered_values().len(), 200_000);
        assert_eq!(tree.export_nodes().len(), 200_001);
        drop(tree);
    }

    #[test]
    fn test_concurrent_inserts_match_sequential() {
        let threads = 8;
        let per_thread = 100;
        let ops: Vec<Vec<InsertOp>> = (0..threads)
            .map(|t| {
                (0..per_thread)
                    .map(|i| {
                        let id = format!("t{}-{:03}", t, i);
                        let parent = if i == 0 {
                            "rt".to_string()
                        } else {
                            format!("t{}-{:03}", t, i - 1)
                        };
                        let side = if i % 3 == 0 { Side::Left } else { Side::Right };
                        ins(&id, &t.to_string(), &parent, side)
                    })
                    .collect()
            })
            .collect();

        let shared = FugueTree::new();
        std::thread::scope(|scope| {
            for chain in &ops {
                let tree = &shared;
                scope.spawn(move || {
                    for op in chain {
                        assert!(tree.insert(op).is_effective());
                    }
                });
            }
        });

        let sequential = FugueTree::new();
        for op in ops.iter().flatten() {
            sequential.insert(op);
        }

        assert_eq!(shared.node_count(), 1 + threads * per_thread);
        assert_eq!(shared.text(), sequential.text());
        assert_eq!(shared.export_nodes(), sequential.export_nodes());
    }

    /// Random causally-consistent history: every insert hangs under the root
    /// or an earlier node, every delete targets an earlier node
    fn history() -> impl Strategy<Value = Vec<Command>> {
        prop::collection::vec(
            (any::<Index>(), any::<bool>(), 0u8..26, proptest::option::of(any::<Index>())),
            1..40,
        )
        .prop_map(|steps| {
            let mut ids = vec![NodeId::root()];
            let mut commands = Vec::new();
            for (i, (parent, left, letter, delete)) in steps.into_iter().enumerate() {
                let id = NodeId::new(format!("n{:03}", i));
                let side = if left { Side::Left } else { Side::Right };
                let value = ((b'a' + letter) as char).to_string();
                commands.push(Command::Insert(InsertOp {
                    node_id: id.clone(),
                    value,
                    parent_id: parent.get(&ids).clone(),
                    side,
                }));
                ids.push(id);
                if let Some(target) = delete {
                    commands.push(Command::Delete(target.get(&ids).clone()));
                }
            }
            commands
        })
    }

    /// Reorder `commands` into another delivery order that still respects
    /// parent-before-child and insert-before-delete
    fn causal_shuffle(commands: &[Command], picks: &[Index]) -> Vec<Command> {
        let mut delivered: HashSet<NodeId> = HashSet::from([NodeId::root()]);
        let mut remaining: Vec<&Command> = commands.iter().collect();
        let mut out = Vec::with_capacity(commands.len());
        let mut turn = 0;

        while !remaining.is_empty() {
            let ready: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, command)| match command {
                    Command::Insert(op) => delivered.contains(&op.parent_id),
                    Command::Delete(id) => delivered.contains(id),
                })
                .map(|(i, _)| i)
                .collect();
            let choice = ready[picks[turn % picks.len()].index(ready.len())];
            turn += 1;

            let command = remaining.remove(choice);
            if let Command::Insert(op) = command {
                delivered.insert(op.node_id.clone());
            }
            out.push(command.clone());
        }
        out
    }

    fn replay(commands: &[Command]) -> FugueTree {
        let tree = FugueTree::new();
        for command in commands {
            tree.apply(command);
        }
        tree
    }

    proptest! {
        #[test]
        fn prop_convergence(
            commands in history(),
            picks in prop::collection::vec(any::<Index>(), 1..16),
        ) {
            let original = replay(&commands);
            let reordered = replay(&causal_shuffle(&commands, &picks));

            prop_assert_eq!(original.ordered_values(), reordered.ordered_values());
            prop_assert_eq!(original.export_nodes(), reordered.export_nodes());
        }

        #[test]
        fn prop_idempotence(commands in history()) {
            let once = replay(&commands);

            let twice = replay(&commands);
            for command in &commands {
                prop_assert!(!twice.apply(command).is_effective());
            }

            prop_assert_eq!(once.ordered_values(), twice.ordered_values());
            prop_assert_eq!(once.export_nodes(), twice.export_nodes());
        }
    }
}
