use crate::op::ListOpKind;
use crate::ranges::{ChangeOp, Metadata, RangesTracker};
use crate::unicount::{chars_to_bytes, count_chars, split_at_char};

/// What to do with the tracked deletes sitting exactly where an insert lands.
///
/// These two behaviours are different on purpose, and they're a product decision rather than an
/// implementation detail. Don't merge them.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CoincidentDeletes {
    /// The new text goes in front of the whole block of deletes. They all move along by the
    /// length of the insert and keep their relative order.
    Uniform,

    /// The insert restores the start of the tracked delete at this index in `changes`. Deletes at
    /// the same offset stored before it stay where they are. The rejected delete loses the restored
    /// text (and vanishes if nothing is left). Deletes stored after it move along.
    RejectAt(usize),
}

impl RangesTracker {
    /// Figure out whether an insert rejects one of the tracked deletes at its position. That's the
    /// first delete at `pos` (in storage order) whose text starts with the inserted text.
    ///
    /// Only inserts flagged as undoing (`u: true`) can reject anything.
    pub(crate) fn find_rejected_delete(&self, pos: usize, content: &str, undoing: bool) -> CoincidentDeletes {
        if !undoing { return CoincidentDeletes::Uniform; }

        self.changes.iter()
            .position(|c| c.op.is_delete() && c.op.pos == pos && c.op.content.starts_with(content))
            .map_or(CoincidentDeletes::Uniform, CoincidentDeletes::RejectAt)
    }

    /// Move the tracked deletes sitting exactly at `pos` for an insert of `len` chars there.
    ///
    /// Changes which empty out are pushed to `remove` rather than removed here, so indexes stay
    /// valid for the caller.
    pub(crate) fn rebase_coincident_deletes(&mut self, pos: usize, len: usize, kind: CoincidentDeletes, remove: &mut Vec<usize>) {
        for idx in 0..self.changes.len() {
            let change = &mut self.changes[idx];
            if !change.op.is_delete() || change.op.pos != pos { continue; }

            match kind {
                CoincidentDeletes::Uniform => {
                    change.op.pos += len;
                }
                CoincidentDeletes::RejectAt(target) if idx < target => {
                    // Visually before the restored text. Stays put.
                    continue;
                }
                CoincidentDeletes::RejectAt(target) if idx == target => {
                    let byte_len = chars_to_bytes(&change.op.content, len);
                    change.op.content = change.op.content[byte_len..].into();
                    change.op.pos += len;
                    if change.op.content.is_empty() {
                        remove.push(idx);
                        continue;
                    }
                }
                CoincidentDeletes::RejectAt(_) => {
                    change.op.pos += len;
                }
            }
            self.mark_change_moved(idx);
        }
    }

    pub(crate) fn apply_insert_to_changes(&mut self, pos: usize, content: &str, undoing: bool, metadata: &Metadata) {
        let op_len = count_chars(content);
        let op_end = pos + op_len;
        let track_changes = self.track_changes;

        let coincident = self.find_rejected_delete(pos, content, undoing);
        if let CoincidentDeletes::RejectAt(idx) = coincident {
            tracing::debug!(pos, id = %self.changes[idx].id, "insert rejects tracked delete");
        }

        // A rejection consumes the insert entirely. It won't be merged into a neighbouring tracked
        // insert, and it won't become a tracked insert of its own.
        let mut already_merged = matches!(coincident, CoincidentDeletes::RejectAt(_));

        let mut remove = Vec::new();
        let mut split_off: Vec<(ChangeOp, Metadata)> = Vec::new();

        // Is the change we looked at last a tracked delete sitting at `pos`? After the insert it
        // ends up right at op_end, partitioning this insert from any tracked insert which follows.
        let mut prev_is_coincident_delete = false;

        for idx in 0..self.changes.len() {
            let change = &mut self.changes[idx];
            let change_start = change.op.pos;

            match change.op.kind {
                ListOpKind::Del => {
                    // Deletes exactly at pos are handled by rebase_coincident_deletes below.
                    if pos < change_start {
                        change.op.pos += op_len;
                        self.mark_change_moved(idx);
                    }
                    prev_is_coincident_delete = change_start == pos;
                    continue;
                }
                ListOpKind::Ins => {
                    let change_end = change_start + change.op.len();
                    let is_overlapping = pos >= change_start && pos <= change_end;

                    // Only merge inserts if they're from the same user.
                    let is_same_user = metadata.user_id == change.metadata.user_id;

                    // If there's a tracked delete at the start of this insert and we're inserting at
                    // the start, we mustn't merge. The delete acts as a partition:
                    //
                    //   Before: |-- existing insert --|
                    //           | <- existing delete at the same offset
                    //
                    //   After:                    |-- existing insert --|
                    //           |-- this insert --|| <- existing delete
                    let is_blocked_by_delete = prev_is_coincident_delete;

                    if track_changes && is_overlapping && !is_blocked_by_delete && !already_merged && is_same_user {
                        // Touching or inside another insert by the same user. Extend it.
                        let (before, after) = split_at_char(&change.op.content, pos - change_start);
                        change.op.content = [before, content, after].concat().into();
                        change.metadata.ts = metadata.ts;
                        already_merged = true;
                        self.mark_change_moved(idx);
                    } else if pos <= change_start {
                        // Fully before the other insert. If they were touching and should have been
                        // merged, they would have been above. Otherwise it must be blocked by a delete,
                        // and comes after this insert.
                        change.op.pos += op_len;
                        self.mark_change_moved(idx);
                    } else if change_start < pos && pos < change_end {
                        // Inserting inside an insert we couldn't merge with. Usually that's
                        // someone else's insert, or tracking is off. Split it into a before part
                        // and an after part.
                        let (before, after) = split_at_char(&change.op.content, pos - change_start);
                        let after = ChangeOp::new_insert(op_end, after);
                        change.op.content = before.into();

                        tracing::debug!(id = %change.id, at = pos, "splitting tracked insert");
                        split_off.push((after, change.metadata.clone()));
                        self.mark_change_moved(idx);
                    }
                }
            }

            prev_is_coincident_delete = false;
        }

        self.rebase_coincident_deletes(pos, op_len, coincident, &mut remove);
        self.remove_changes_at(remove);

        if track_changes && !already_merged {
            self.add_change(ChangeOp::new_insert(pos, content), metadata);
        }
        for (op, metadata) in split_off {
            self.add_change(op, &metadata);
        }
    }

    pub(crate) fn apply_insert_to_comments(&mut self, pos: usize, content: &str) {
        let op_len = count_chars(content);

        for comment in self.comments.iter_mut() {
            let start = comment.op.pos;
            if pos <= start {
                comment.op.pos += op_len;
            } else if pos < start + comment.op.len() {
                // Typing inside the commented text grows the comment.
                let (before, after) = split_at_char(&comment.op.content, pos - start);
                comment.op.content = [before, content, after].concat().into();
            } else { continue; }

            self.dirty.comment.mark(&comment.id, crate::ranges::dirty::Dirty::Moved);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::op::Op;
    use crate::ranges::{Change, ChangeOp, Comment, Metadata, RangesTracker};
    use super::CoincidentDeletes;

    fn deletes_at(positions: &[usize]) -> RangesTracker {
        // Ids 1..n. Id 3 deleted "this one" so we can reject it.
        let changes = positions.iter().enumerate().map(|(i, &p)| {
            let id = (i + 1).to_string();
            let text = if i == 2 { "this one" } else { "foo" };
            Change::new(&id, ChangeOp::new_delete(p, text), Metadata::for_user("u1"))
        }).collect();
        RangesTracker::new(changes, vec![])
    }

    fn positions(tracker: &RangesTracker) -> Vec<(String, usize)> {
        tracker.changes().iter().map(|c| (c.id.to_string(), c.op.pos)).collect()
    }

    #[test]
    fn rejecting_insert_only_moves_target_and_later_deletes() {
        let mut tracker = deletes_at(&[33, 50, 50, 50, 75]);
        assert_eq!(tracker.find_rejected_delete(50, "this one", true), CoincidentDeletes::RejectAt(2));

        tracker.apply_op(&Op::new_reject_insert(50, "this one"), Metadata::for_user("u2")).unwrap();

        assert_eq!(positions(&tracker), vec![
            ("1".into(), 33),
            ("2".into(), 50),
            ("4".into(), 58),
            ("5".into(), 83),
        ]);
        assert!(tracker.dirty_state().change.removed.contains("3"));
    }

    #[test]
    fn non_matching_undo_insert_shifts_coincident_deletes_uniformly() {
        let mut tracker = deletes_at(&[33, 50, 50, 50, 75]);
        let text = "some other text";
        assert_eq!(tracker.find_rejected_delete(50, text, true), CoincidentDeletes::Uniform);

        tracker.apply_op(&Op::new_reject_insert(50, text), Metadata::for_user("u2")).unwrap();

        let len = text.len(); // 15
        assert_eq!(positions(&tracker), vec![
            ("1".into(), 33),
            ("2".into(), 50 + len),
            ("3".into(), 50 + len),
            ("4".into(), 50 + len),
            ("5".into(), 75 + len),
        ]);
    }

    #[test]
    fn plain_insert_never_rejects() {
        let mut tracker = deletes_at(&[50, 50, 50]);
        tracker.apply_op(&Op::new_insert(50, "this one"), Metadata::default()).unwrap();
        assert!(tracker.changes().iter().all(|c| c.op.pos == 58));
        assert_eq!(tracker.changes().len(), 3);
    }

    #[test]
    fn partial_rejection_keeps_rest_of_delete() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_delete(10, "hello world"), Metadata::default()),
        ], vec![]);
        tracker.apply_op(&Op::new_reject_insert(10, "hello"), Metadata::default()).unwrap();
        assert_eq!(tracker.changes()[0].op, ChangeOp::new_delete(15, " world"));
    }

    #[test]
    fn insert_before_and_after_ranges() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(10, "foo"), Metadata::default()),
            Change::new("b", ChangeOp::new_delete(20, "bar"), Metadata::default()),
        ], vec![
            Comment::new("c", 5, "xyz", "c"),
        ]);

        tracker.apply_op(&Op::new_insert(25, "zz"), Metadata::default()).unwrap();
        assert_eq!(tracker.changes()[0].op.pos, 10);
        assert_eq!(tracker.changes()[1].op.pos, 20);

        tracker.apply_op(&Op::new_insert(0, "12"), Metadata::default()).unwrap();
        assert_eq!(tracker.changes()[0].op.pos, 12);
        assert_eq!(tracker.changes()[1].op.pos, 22);
        assert_eq!(tracker.comments()[0].op.pos, 7);
    }

    #[test]
    fn insert_inside_comment_grows_it() {
        let mut tracker = RangesTracker::new(vec![], vec![Comment::new("c", 5, "foobar", "c")]);
        tracker.apply_op(&Op::new_insert(8, "XX"), Metadata::default()).unwrap();
        assert_eq!(tracker.comments()[0].op.content.as_str(), "fooXXbar");
        assert_eq!(tracker.comments()[0].op.pos, 5);

        // Inserting right at the end doesn't extend it.
        tracker.apply_op(&Op::new_insert(13, "!"), Metadata::default()).unwrap();
        assert_eq!(tracker.comments()[0].op.content.as_str(), "fooXXbar");

        // And at the start pushes it along.
        tracker.apply_op(&Op::new_insert(5, "<"), Metadata::default()).unwrap();
        assert_eq!(tracker.comments()[0].op.pos, 6);
    }

    #[test]
    fn untracked_insert_splits_tracked_insert() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(10, "foobar"), Metadata::for_user("u1")),
        ], vec![]);

        tracker.apply_op(&Op::new_insert(13, "XX"), Metadata::for_user("u1")).unwrap();
        assert_eq!(tracker.changes().len(), 2);
        assert_eq!(tracker.changes()[0].op, ChangeOp::new_insert(10, "foo"));
        assert_eq!(tracker.changes()[1].op, ChangeOp::new_insert(15, "bar"));
        assert_eq!(tracker.changes()[1].metadata.user_id.as_deref(), Some("u1"));
        assert_ne!(tracker.changes()[1].id, tracker.changes()[0].id);
    }

    #[test]
    fn tracked_inserts_merge_for_the_same_user() {
        let mut tracker = RangesTracker::empty();
        tracker.track_changes = true;

        tracker.apply_op(&Op::new_insert(0, "foo"), Metadata::for_user("u1")).unwrap();
        tracker.apply_op(&Op::new_insert(3, "bar"), Metadata::for_user("u1")).unwrap();
        assert_eq!(tracker.changes().len(), 1);
        assert_eq!(tracker.changes()[0].op, ChangeOp::new_insert(0, "foobar"));

        // Someone else typing in the middle splits it, and gets their own change.
        tracker.apply_op(&Op::new_insert(3, "XX"), Metadata::for_user("u2")).unwrap();
        let ops: Vec<&ChangeOp> = tracker.changes().iter().map(|c| &c.op).collect();
        assert_eq!(ops, vec![
            &ChangeOp::new_insert(0, "foo"),
            &ChangeOp::new_insert(3, "XX"),
            &ChangeOp::new_insert(5, "bar"),
        ]);
    }

    #[test]
    fn tracked_insert_is_partitioned_by_delete() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("d", ChangeOp::new_delete(5, "gone"), Metadata::for_user("u1")),
            Change::new("i", ChangeOp::new_insert(5, "foo"), Metadata::for_user("u1")),
        ], vec![]);
        tracker.track_changes = true;

        tracker.apply_op(&Op::new_insert(5, "XX"), Metadata::for_user("u1")).unwrap();
        let ops: Vec<&ChangeOp> = tracker.changes().iter().map(|c| &c.op).collect();
        assert_eq!(ops, vec![
            &ChangeOp::new_insert(5, "XX"),
            &ChangeOp::new_delete(7, "gone"),
            &ChangeOp::new_insert(7, "foo"),
        ]);
    }

    #[test]
    fn rejection_doesnt_become_tracked_insert() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("i", ChangeOp::new_insert(0, "foo"), Metadata::for_user("u1")),
            Change::new("d", ChangeOp::new_delete(3, "bar"), Metadata::for_user("u1")),
        ], vec![]);
        tracker.track_changes = true;

        // 'b' restores the start of the delete. It shouldn't be appended to 'foo'.
        tracker.apply_op(&Op::new_reject_insert(3, "b"), Metadata::for_user("u1")).unwrap();
        let ops: Vec<&ChangeOp> = tracker.changes().iter().map(|c| &c.op).collect();
        assert_eq!(ops, vec![
            &ChangeOp::new_insert(0, "foo"),
            &ChangeOp::new_delete(4, "ar"),
        ]);
    }
}
