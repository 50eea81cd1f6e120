//! Wire-level types exchanged with the transport layer
//!
//! - [`operation`]: text edit operations and their validated form
//! - [`snapshot`]: join snapshots and exported node records
//! - [`codec`]: JSON encoding of the above

pub mod codec;
pub mod operation;
pub mod snapshot;

pub use operation::{Command, InsertOp, Operation, OperationType};
pub use snapshot::{
    DiagramContent, FugueNodeRecord, SegmentKind, Snapshot, TextSegmentSnapshot,
};
