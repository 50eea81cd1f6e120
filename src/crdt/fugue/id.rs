//! NodeId: string identifier with byte-wise total ordering
//!
//! Sibling lists in the Fugue tree are kept sorted by NodeId. Every replica
//! must compare ids exactly the same way or concurrent inserts under the same
//! parent end up in different orders, so the ordering is the plain byte-wise
//! order of the underlying string and nothing else.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Id of the root sentinel in every tree
pub const ROOT_NODE_ID: &str = "rt";

/// Prefix of ids assigned when converting flat text into a tree
pub const PLAIN_TEXT_PREFIX: &str = "pl";

/// Unique identifier for a node within one tree
///
/// # Ordering
///
/// Byte-wise lexicographic, identical to `str` ordering:
///
/// ```rust
/// use cowrite_core::crdt::fugue::NodeId;
///
/// assert!(NodeId::from("a") < NodeId::from("b"));
/// assert!(NodeId::from("B") < NodeId::from("a"));
/// assert!(NodeId::from("ab") > NodeId::from("a"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an id received from a peer or from storage
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The root sentinel id
    pub fn root() -> Self {
        Self(ROOT_NODE_ID.to_string())
    }

    /// Id of the `index`-th character when seeding from flat text
    ///
    /// Zero-padded to eight digits so the ids sort in original order.
    ///
    /// ```rust
    /// use cowrite_core::crdt::fugue::NodeId;
    ///
    /// assert_eq!(NodeId::plain_text(0).as_str(), "pl00000000");
    /// assert_eq!(NodeId::plain_text(42).as_str(), "pl00000042");
    /// ```
    pub fn plain_text(index: usize) -> Self {
        Self(format!("{}{:08}", PLAIN_TEXT_PREFIX, index))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the root sentinel id
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_NODE_ID
    }

    /// Consume and return the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_bytewise() {
        let upper = NodeId::from("Z");
        let lower = NodeId::from("a");
        assert!(upper < lower, "uppercase bytes sort before lowercase");

        let short = NodeId::from("user1-9");
        let long = NodeId::from("user1-10");
        assert!(long < short, "no numeric awareness: '1' < '9'");
    }

    #[test]
    fn test_plain_text_ids_sort_in_order() {
        let ids: Vec<NodeId> = (0..120).map(NodeId::plain_text).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_root() {
        assert!(NodeId::root().is_root());
        assert_eq!(NodeId::root().as_str(), "rt");
        assert!(!NodeId::plain_text(0).is_root());
    }

    #[test]
    fn test_display() {
        let id = NodeId::from("client1-42");
        assert_eq!(format!("{}", id), "client1-42");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = NodeId::from("n1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"n1\"");

        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_hash_lookup_by_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(NodeId::from("n1"), 1);
        assert_eq!(map.get("n1"), Some(&1));
    }
}
