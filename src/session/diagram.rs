//! Diagram collaboration session: one LWW register per diagram segment

use crate::crdt::LwwRegister;
use crate::protocol::DiagramContent;
use crate::session::Participants;
use crate::SessionId;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct DiagramSession {
    id: SessionId,
    register: Mutex<LwwRegister<DiagramContent>>,
    write_back: Mutex<()>,
    participants: Participants,
}

impl DiagramSession {
    pub fn new(id: impl Into<SessionId>, register: LwwRegister<DiagramContent>) -> Self {
        Self {
            id: id.into(),
            register: Mutex::new(register),
            write_back: Mutex::new(()),
            participants: Participants::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    /// Merge a candidate state; returns whether the content changed
    pub fn apply_edit(&self, candidate: LwwRegister<DiagramContent>) -> bool {
        self.register.lock().merge(candidate)
    }

    /// Copy of the current register state
    pub fn state(&self) -> LwwRegister<DiagramContent> {
        self.register.lock().clone()
    }

    pub fn content(&self) -> String {
        self.register.lock().value().content.clone()
    }

    /// Hand the current content to `write`, one caller at a time
    ///
    /// The content is read inside the exclusion, so the last write to land
    /// holds the newest merged value.
    pub fn write_back<R>(&self, write: impl FnOnce(&str) -> R) -> R {
        let _guard = self.write_back.lock();
        write(&self.content())
    }
}
