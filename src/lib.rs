//! CoWrite Core - In-memory CRDT merge engine for collaborative documents
//!
//! Multiple editors change the same document concurrently without a central
//! sequencer; every replica converges on the same content. It implements:
//! - Fugue tree CRDT for free-form text segments
//! - Last-write-wins register for monolithic diagram content
//! - Live collaboration sessions with participant tracking
//! - Session registries that seed from and write back to external storage
//!
//! # Examples
//!
//! ```rust
//! use cowrite_core::crdt::{FugueTree, Side};
//! use cowrite_core::protocol::InsertOp;
//!
//! let tree = FugueTree::from_plain_text(Some("Hi"));
//! tree.insert(&InsertOp::new("u1-1", "!", "pl00000001", Side::Right));
//! assert_eq!(tree.text(), "Hi!");
//! ```
//!
//! ```rust
//! use std::sync::Arc;
//! use cowrite_core::{CollaborationEngine, EngineConfig, SegmentKind};
//! use cowrite_core::service::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.add_user("u1", "Alice");
//! store.add_text_segment("note-1", "body", "draft");
//!
//! let engine = CollaborationEngine::with_store(EngineConfig::default(), store);
//! let snapshot = engine.participate(SegmentKind::Text, "note-1", "u1").unwrap();
//! assert_eq!(snapshot.kind(), SegmentKind::Text);
//! ```

pub mod config;
pub mod crdt;
pub mod engine;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use config::EngineConfig;
pub use engine::CollaborationEngine;
pub use error::{Result, SyncError};
pub use protocol::{Operation, SegmentKind, Snapshot};

/// Session identifier type (document id for text, segment id for diagrams)
pub type SessionId = String;

/// Segment identifier type
pub type SegmentId = String;

/// User identifier type
pub type UserId = String;
