use std::collections::HashSet;
use chrono::Utc;
use smartstring::alias::String as SmartString;
use crate::error::Result;
use crate::op::Op;
use crate::ranges::dirty::{Dirty, DirtyState};
use crate::ranges::ids::IdGenerator;
use crate::ranges::{Change, ChangeOp, Comment, CommentOp, Metadata, Ranges, Resolution};

/// The tracked changes and comments for one open document.
///
/// A tracker is made when a document is opened for editing, seeded from the persisted ranges. It's
/// then told about every op applied to the document, in version order, exactly once. The
/// persisted log is the source of truth. The tracker is just the in-memory working copy.
#[derive(Debug, Clone)]
pub struct RangesTracker {
    pub(crate) changes: Vec<Change>,
    pub(crate) comments: Vec<Comment>,

    /// When set, inserts and deletes are themselves recorded as new tracked changes.
    pub track_changes: bool,

    pub(crate) ids: IdGenerator,
    pub(crate) dirty: DirtyState,
}

impl RangesTracker {
    pub fn new(changes: Vec<Change>, comments: Vec<Comment>) -> Self {
        Self {
            changes,
            comments,
            track_changes: false,
            ids: IdGenerator::new(),
            dirty: DirtyState::default(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// The current state, ready to be persisted.
    pub fn ranges(&self) -> Ranges {
        Ranges { changes: self.changes.clone(), comments: self.comments.clone() }
    }

    pub fn into_ranges(self) -> Ranges {
        Ranges { changes: self.changes, comments: self.comments }
    }

    pub fn id_seed(&self) -> &str {
        self.ids.seed()
    }

    pub fn set_id_seed(&mut self, seed: &str) {
        self.ids.set_seed(seed);
    }

    /// A fresh random seed, for a tracker which should generate its own ids.
    pub fn generate_id_seed() -> SmartString {
        IdGenerator::generate_seed()
    }

    pub fn new_id(&mut self) -> SmartString {
        self.ids.next_id()
    }

    pub fn dirty_state(&self) -> &DirtyState {
        &self.dirty
    }

    pub fn reset_dirty_state(&mut self) {
        self.dirty = DirtyState::default();
    }

    // *** Changes

    /// The first change with the given id. Ids aren't guaranteed unique. Use
    /// [`get_changes`](Self::get_changes) to see all of them.
    pub fn get_change(&self, id: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.id.as_str() == id)
    }

    /// Every change whose id is in `ids`, in the order they're stored. Duplicated ids all match.
    pub fn get_changes<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Change> {
        let ids: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        self.changes.iter()
            .filter(|c| ids.contains(c.id.as_str()))
            .collect()
    }

    pub fn remove_change_id(&mut self, id: &str) {
        self.remove_change_ids(&[id]);
    }

    /// Remove every change whose id is in `ids`, including duplicates. Survivors keep their order.
    pub fn remove_change_ids<S: AsRef<str>>(&mut self, ids: &[S]) {
        if ids.is_empty() { return; }

        let ids: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let dirty = &mut self.dirty.change;
        self.changes.retain(|c| {
            if ids.contains(c.id.as_str()) {
                dirty.mark(&c.id, Dirty::Removed);
                false
            } else { true }
        });
    }

    /// Total length of all the tracked deletes. The document with tracked deletes put back is this
    /// much longer than the current text.
    pub fn get_tracked_deletes_length(&self) -> usize {
        self.changes.iter()
            .filter(|c| c.op.is_delete())
            .map(|c| c.op.len())
            .sum()
    }

    // *** Comments

    pub fn get_comment(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id.as_str() == id)
    }

    pub fn remove_comment_id(&mut self, id: &str) {
        if self.get_comment(id).is_none() { return; }
        self.comments.retain(|c| c.id.as_str() != id);
        self.dirty.comment.mark(id, Dirty::Removed);
    }

    /// Re-anchor every comment with this id.
    pub fn move_comment_id(&mut self, id: &str, pos: usize, content: &str) {
        for comment in self.comments.iter_mut().filter(|c| c.id.as_str() == id) {
            comment.op.pos = pos;
            comment.op.content = content.into();
            self.dirty.comment.mark(id, Dirty::Moved);
        }
    }

    /// Mark every comment in the thread as resolved.
    pub fn resolve_thread(&mut self, thread: &str, user_id: &str) {
        let ts = Utc::now();
        for comment in self.comments.iter_mut().filter(|c| c.op.thread.as_str() == thread) {
            comment.resolved = Some(Resolution { user_id: user_id.into(), ts });
        }
    }

    pub fn reopen_thread(&mut self, thread: &str) {
        for comment in self.comments.iter_mut().filter(|c| c.op.thread.as_str() == thread) {
            comment.resolved = None;
        }
    }

    pub fn is_thread_resolved(&self, thread: &str) -> bool {
        let mut in_thread = self.comments.iter().filter(|c| c.op.thread.as_str() == thread).peekable();
        in_thread.peek().is_some() && in_thread.all(|c| c.is_resolved())
    }

    pub(crate) fn add_comment(&mut self, pos: usize, content: &str, thread: Option<&str>, metadata: &Metadata) {
        if let Some(thread) = thread {
            if self.get_comment(thread).is_some() {
                self.move_comment_id(thread, pos, content);
                return;
            }
        }

        let id = match thread {
            Some(thread) => thread.into(),
            None => self.new_id(),
        };
        self.dirty.comment.mark(&id, Dirty::Added);
        self.comments.push(Comment {
            op: CommentOp { pos, content: content.into(), thread: id.clone() },
            id,
            metadata: metadata.clone(),
            resolved: None,
        });
    }

    // *** Applying ops

    /// Update all the ranges for an op which has just been applied to the document.
    ///
    /// Ops must be fed in, in order, exactly once each. If this returns an error the op didn't
    /// line up with our ranges. The tracker may be half updated at that point, and should be
    /// thrown away.
    pub fn apply_op(&mut self, op: &Op, mut metadata: Metadata) -> Result<()> {
        if metadata.ts.is_none() {
            metadata.ts = Some(Utc::now());
        }
        tracing::trace!(%op, track_changes = self.track_changes, "applying op to ranges");
        // The OT layer never sends these. Ops with no content would break the adjacency rules.
        debug_assert!(!op.is_empty(), "empty op {op}");

        match op {
            Op::Insert { pos, content } => {
                self.apply_insert_to_changes(*pos, content, false, &metadata);
                self.apply_insert_to_comments(*pos, content);
            }
            Op::RejectInsert { pos, content } => {
                self.apply_insert_to_changes(*pos, content, true, &metadata);
                self.apply_insert_to_comments(*pos, content);
            }
            Op::Delete { pos, content } => {
                self.apply_delete_to_changes(*pos, content, &metadata)?;
                self.apply_delete_to_comments(*pos, content)?;
            }
            Op::Comment { pos, content, thread } => {
                self.add_comment(*pos, content, thread.as_deref(), &metadata);
            }
        }
        Ok(())
    }

    pub fn apply_ops(&mut self, ops: &[Op], metadata: Metadata) -> Result<()> {
        for op in ops {
            self.apply_op(op, metadata.clone())?;
        }
        Ok(())
    }

    /// Add a brand new tracked change.
    ///
    /// Existing changes never move. The new change goes in front of the first change which sorts
    /// after it (by offset, deletes before inserts). In a sorted list that's exactly where a stable
    /// sort would put it.
    pub(crate) fn add_change(&mut self, op: ChangeOp, metadata: &Metadata) {
        let id = self.new_id();
        self.dirty.change.mark(&id, Dirty::Added);

        let key = op.sort_key();
        let idx = self.changes.iter()
            .position(|c| c.op.sort_key() > key)
            .unwrap_or(self.changes.len());
        self.changes.insert(idx, Change { id, op, metadata: metadata.clone() });
    }

    /// Remove changes by index. Indexes are into `self.changes` as it is right now.
    pub(crate) fn remove_changes_at(&mut self, mut idxs: Vec<usize>) {
        idxs.sort_unstable();
        idxs.dedup();
        for idx in idxs.into_iter().rev() {
            let change = self.changes.remove(idx);
            self.dirty.change.mark(&change.id, Dirty::Removed);
        }
    }

    pub(crate) fn mark_change_moved(&mut self, idx: usize) {
        let id = &self.changes[idx].id;
        self.dirty.change.mark(id, Dirty::Moved);
    }
}

impl Default for RangesTracker {
    fn default() -> Self { Self::empty() }
}

impl From<Ranges> for RangesTracker {
    fn from(ranges: Ranges) -> Self {
        Self::new(ranges.changes, ranges.comments)
    }
}
