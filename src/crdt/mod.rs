//! CRDT (Conflict-free Replicated Data Types) implementations
//!
//! # CRDTs Implemented
//!
//! - **Fugue tree:** ordered-tree CRDT for free-form text segments
//! - **LWW register:** last-write-wins cell for monolithic diagram content
//!
//! # References
//!
//! - "A comprehensive study of CRDTs" by Marc Shapiro et al.
//! - "Conflict-free Replicated Data Types" (INRIA Research Report 7687)

pub mod fugue;
pub mod lww_register;

pub use fugue::{Applied, FugueNode, FugueTree, NodeId, Side};
pub use lww_register::LwwRegister;
