//! Live collaboration sessions
//!
//! A session is the in-memory aggregate of CRDT state and connected
//! participants for one document (text) or one diagram segment. Sessions are
//! created by the services on first join and are never torn down.

mod diagram;
mod participants;
mod text;

pub use diagram::DiagramSession;
pub use participants::{Participant, Participants, Participation};
pub use text::TextSession;
