//! Text collaboration session: one Fugue tree per text segment of a document

use crate::crdt::{Applied, FugueTree};
use crate::error::{Result, SyncError};
use crate::protocol::{Command, FugueNodeRecord, Operation, TextSegmentSnapshot};
use crate::session::Participants;
use crate::{SegmentId, SessionId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug)]
struct Segment {
    tree: FugueTree,
    // Serializes write-backs of this segment
    write_back: Mutex<()>,
}

/// Live state of one text document
///
/// The set of segments is fixed when the session is created; edits mutate
/// the trees in place through `&self`.
#[derive(Debug)]
pub struct TextSession {
    id: SessionId,
    segments: BTreeMap<SegmentId, Segment>,
    participants: Participants,
}

impl TextSession {
    pub fn new<I>(id: impl Into<SessionId>, segments: I) -> Self
    where
        I: IntoIterator<Item = (SegmentId, FugueTree)>,
    {
        Self {
            id: id.into(),
            segments: segments
                .into_iter()
                .map(|(segment_id, tree)| {
                    let segment = Segment {
                        tree,
                        write_back: Mutex::new(()),
                    };
                    (segment_id, segment)
                })
                .collect(),
            participants: Participants::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    /// Segment ids, ascending
    pub fn segment_ids(&self) -> impl Iterator<Item = &SegmentId> {
        self.segments.keys()
    }

    /// Every segment with its tree, ascending by segment id
    pub fn segments(&self) -> impl Iterator<Item = (&SegmentId, &FugueTree)> {
        self.segments
            .iter()
            .map(|(segment_id, segment)| (segment_id, &segment.tree))
    }

    /// The tree of one segment
    ///
    /// # Errors
    ///
    /// `SegmentNotFound` if the session has no such segment.
    pub fn segment(&self, segment_id: &str) -> Result<&FugueTree> {
        self.entry(segment_id).map(|segment| &segment.tree)
    }

    fn entry(&self, segment_id: &str) -> Result<&Segment> {
        self.segments
            .get(segment_id)
            .ok_or_else(|| SyncError::SegmentNotFound(segment_id.to_string()))
    }

    /// Apply a validated command to one segment
    pub fn apply(&self, segment_id: &str, command: &Command) -> Result<Applied> {
        Ok(self.segment(segment_id)?.apply(command))
    }

    /// Validate and apply a wire operation to one segment
    pub fn apply_operation(&self, segment_id: &str, operation: &Operation) -> Result<Applied> {
        let command = operation.command()?;
        self.apply(segment_id, &command)
    }

    /// Flattened text of one segment
    pub fn text(&self, segment_id: &str) -> Result<String> {
        Ok(self.segment(segment_id)?.text())
    }

    /// Hand the current text of one segment to `write`
    ///
    /// Calls for the same segment run one at a time and the text is read
    /// inside that exclusion, so the last write to land holds every change
    /// applied before it started.
    pub fn write_back<R>(&self, segment_id: &str, write: impl FnOnce(&str) -> R) -> Result<R> {
        let segment = self.entry(segment_id)?;
        let _guard = segment.write_back.lock();
        Ok(write(&segment.tree.text()))
    }

    /// Always fails: segment content only changes through insert and delete
    pub fn update_segment(&self, _segment_id: &str, _value: &str) -> Result<()> {
        Err(SyncError::UnsupportedOperation("direct update of a text segment"))
    }

    /// Full structure of every segment, ordered by segment id
    pub fn snapshot(&self) -> Vec<TextSegmentSnapshot> {
        self.segments()
            .map(|(segment_id, tree)| TextSegmentSnapshot {
                segment_id: segment_id.clone(),
                root_node: FugueNodeRecord::root(),
                nodes: tree.export_nodes(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::Side;

    fn session() -> TextSession {
        TextSession::new(
            "doc-1",
            vec![
                ("seg-b".to_string(), FugueTree::from_plain_text(Some("world"))),
                ("seg-a".to_string(), FugueTree::from_plain_text(Some("hi"))),
            ],
        )
    }

    #[test]
    fn test_snapshot_ordered_by_segment() {
        let session = session();
        let snapshot = session.snapshot();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].segment_id, "seg-a");
        assert_eq!(snapshot[0].root_node, FugueNodeRecord::root());
        assert_eq!(snapshot[0].nodes.len(), 3);
        assert_eq!(snapshot[1].segment_id, "seg-b");
    }

    #[test]
    fn test_apply_operation() {
        let session = session();
        let op = Operation::insert("u1-1", "!", "pl00000001", Side::Right, "u1");

        let applied = session.apply_operation("seg-a", &op).unwrap();
        assert!(applied.is_effective());
        assert_eq!(session.text("seg-a").unwrap(), "hi!");
        assert_eq!(session.text("seg-b").unwrap(), "world");
    }

    #[test]
    fn test_unknown_segment() {
        let session = session();
        let op = Operation::delete("pl00000000", "u1");
        assert!(matches!(
            session.apply_operation("nope", &op),
            Err(SyncError::SegmentNotFound(_))
        ));
    }

    #[test]
    fn test_write_back_is_exclusive_per_segment() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let session = session();
        let busy = AtomicBool::new(false);
        let overlaps = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        session
                            .write_back("seg-a", |text| {
                                assert_eq!(text, "hi");
                                if busy.swap(true, Ordering::SeqCst) {
                                    overlaps.fetch_add(1, Ordering::SeqCst);
                                }
                                std::thread::yield_now();
                                busy.store(false, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert!(session.write_back("nope", |_| ()).is_err());
    }

    #[test]
    fn test_update_segment_unsupported() {
        let session = session();
        assert!(matches!(
            session.update_segment("seg-a", "overwrite"),
            Err(SyncError::UnsupportedOperation(_))
        ));
        assert_eq!(session.text("seg-a").unwrap(), "hi");
    }
}
