//! Fugue tree CRDT for collaborative text
//!
//! Text is a tree of single-character nodes. Each node has an ordered list of
//! left children and one of right children; a depth-first walk gives the
//! document. Concurrent inserts at the same spot become siblings and are
//! ordered by [`NodeId`], which is what makes every replica converge.
//!
//! # References
//!
//! - "The Art of the Fugue: Minimizing Interleaving in Collaborative Text
//!   Editing" by Weidner and Kleppmann (2023)

mod id;
mod node;
mod tree;

pub use id::{NodeId, PLAIN_TEXT_PREFIX, ROOT_NODE_ID};
pub use node::{FugueNode, Side};
pub use tree::{Applied, FugueTree};
