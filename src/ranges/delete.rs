use std::cmp::Ordering;
use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use crate::error::{RangesError, Result};
use crate::op::ListOpKind;
use crate::ranges::dirty::Dirty;
use crate::ranges::{ChangeOp, Metadata, RangesTracker};
use crate::unicount::{chars_to_bytes, count_chars, slice_chars, slice_from, slice_to};

/// An edit to the content of a delete op while it's being applied. Offsets are chars into the
/// op's original content.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Modification {
    /// Splice an existing tracked delete into our op.
    Insert { offset: usize, content: SmartString },
    /// Drop text which cancelled out against a tracked insert.
    Delete { offset: usize, content: SmartString },
}

impl Modification {
    fn offset(&self) -> usize {
        match self {
            Modification::Insert { offset, .. } | Modification::Delete { offset, .. } => *offset
        }
    }
}

/// Apply a set of modifications to `content`. They're applied back to front so earlier offsets
/// stay valid. At the same offset, deletes go first (inserting first would change what the delete
/// removes).
///
/// `base` is only used for error reporting.
pub(crate) fn apply_modifications(base: usize, content: &str, mods: &mut [Modification]) -> Result<SmartString> {
    mods.sort_by(|a, b| {
        b.offset().cmp(&a.offset()).then_with(|| match (a, b) {
            (Modification::Delete { .. }, Modification::Insert { .. }) => Ordering::Less,
            (Modification::Insert { .. }, Modification::Delete { .. }) => Ordering::Greater,
            _ => Ordering::Equal,
        })
    });

    let mut result = String::from(content);
    for m in mods.iter() {
        match m {
            Modification::Insert { offset, content } => {
                let byte_pos = chars_to_bytes(&result, *offset);
                result.insert_str(byte_pos, content);
            }
            Modification::Delete { offset, content } => {
                let existing = slice_chars(&result, *offset, offset + count_chars(content));
                if existing != content.as_str() {
                    tracing::warn!(pos = base + offset, expected = %content, actual = existing, "deleted content does not match");
                    return Err(RangesError::DeleteMismatch { pos: base + offset });
                }
                let start = chars_to_bytes(&result, *offset);
                result.replace_range(start..start + content.len(), "");
            }
        }
    }
    Ok(result.into())
}

impl RangesTracker {
    pub(crate) fn apply_delete_to_changes(&mut self, pos: usize, content: &str, metadata: &Metadata) -> Result<()> {
        let op_len = count_chars(content);
        let op_start = pos;
        let op_end = pos + op_len;
        let track_changes = self.track_changes;

        let mut remove = Vec::new();
        // Ids rather than indexes, since we remove changes before marking these.
        let mut moved: Vec<SmartString> = Vec::new();

        // Our delete op might merge with existing deletes, or cancel out against existing inserts.
        // We collect those edits and apply them once we're done looking at the changes, so as not
        // to mess up the offsets as we go.
        let mut mods: SmallVec<[Modification; 2]> = SmallVec::new();

        for (idx, change) in self.changes.iter_mut().enumerate() {
            let change_start = change.op.pos;

            match change.op.kind {
                ListOpKind::Ins => {
                    let change_end = change_start + change.op.len();

                    if op_end <= change_start {
                        change.op.pos -= op_len;
                        moved.push(change.id.clone());
                    } else if op_start >= change_end {
                        // Delete is after the insert. Nothing to do.
                    } else {
                        // Where they overlap, the delete and the insert cancel out.
                        let (del_before, ins_before) = if op_start >= change_start {
                            //      |-- existing insert --|
                            // ins_before -> |..||-- new delete --|
                            (0, slice_to(&change.op.content, op_start - change_start))
                        } else {
                            // del_before -> |..||-- existing insert --|
                            //               |-- new delete --|
                            (change_start - op_start, "")
                        };

                        let (del_after, ins_after) = if op_end <= change_end {
                            (0, slice_from(&change.op.content, op_end - change_start))
                        } else {
                            (op_end - change_end, "")
                        };

                        let remaining: SmartString = [ins_before, ins_after].concat().into();
                        if !remaining.is_empty() {
                            change.op.content = remaining;
                            change.op.pos = change_start.min(op_start);
                            change.metadata.ts = metadata.ts;
                            moved.push(change.id.clone());
                        } else {
                            remove.push(idx);
                        }

                        let removed_len = op_len - del_before - del_after;
                        if removed_len > 0 {
                            mods.push(Modification::Delete {
                                offset: del_before,
                                content: slice_chars(content, del_before, del_before + removed_len).into(),
                            });
                        }
                    }
                }
                ListOpKind::Del => {
                    // When tracking, a delete touching the end of ours merges with it below. So it
                    // only shifts if it's strictly after us.
                    if op_end < change_start || (!track_changes && op_end == change_start) {
                        change.op.pos -= op_len;
                        moved.push(change.id.clone());
                    } else if op_start <= change_start && change_start <= op_end {
                        if track_changes {
                            // Pull the existing delete into our op, and drop it. That's simpler than
                            // modifying the existing delete, since we might overlap lots of them.
                            mods.push(Modification::Insert {
                                offset: change_start - op_start,
                                content: change.op.content.clone(),
                            });
                            remove.push(idx);
                        } else {
                            change.op.pos = op_start;
                            moved.push(change.id.clone());
                        }
                    }
                }
            }
        }

        let mut new_content = apply_modifications(pos, content, &mut mods)?;
        let new_len = count_chars(&new_content);

        // If one of the deletes we pulled in sits inside the new delete, update it in place instead
        // of removing it and adding a replacement. Otherwise the change gets a new id, and editors
        // displaying it flicker.
        remove.retain(|&idx| {
            let change = &mut self.changes[idx];
            if !new_content.is_empty() && change.op.is_delete()
                && pos <= change.op.pos && change.op.pos <= pos + new_len
            {
                change.op.pos = pos;
                change.op.content = std::mem::take(&mut new_content);
                change.metadata = metadata.clone();
                moved.push(change.id.clone());
                false
            } else { true }
        });
        self.remove_changes_at(remove);

        if track_changes && !new_content.is_empty() {
            self.add_change(ChangeOp::new_delete(pos, &new_content), metadata);
        } else {
            // We might have deleted an insert sitting between two others. Eg, deleting the middle of
            //   |-- user_1 insert --||-- user_2 insert --||-- user_1 insert --|
            // leaves two touching user_1 inserts, which should be merged again.
            let merged_away = self.scan_and_merge_adjacent();
            moved.retain(|id| !merged_away.contains(id));
        }

        for id in moved {
            self.dirty.change.mark(&id, Dirty::Moved);
        }
        Ok(())
    }

    /// Merge touching inserts by the same user, and deletes by the same user at the same offset.
    /// Coincident deletes from different users stay separate. Returns the ids of the changes which
    /// were merged into their neighbours (and removed).
    pub(crate) fn scan_and_merge_adjacent(&mut self) -> Vec<SmartString> {
        let mut prev: Option<usize> = None;
        let mut remove = Vec::new();

        for idx in 0..self.changes.len() {
            if let Some(p) = prev {
                let (a, b) = (&self.changes[p], &self.changes[idx]);
                let merge = match (a.op.kind, b.op.kind) {
                    (ListOpKind::Ins, ListOpKind::Ins) => {
                        a.op.pos + a.op.len() == b.op.pos && a.metadata.user_id == b.metadata.user_id
                    }
                    (ListOpKind::Del, ListOpKind::Del) => {
                        a.op.pos == b.op.pos && a.metadata.user_id == b.metadata.user_id
                    }
                    _ => false,
                };

                if merge {
                    let extra = b.op.content.clone();
                    tracing::debug!(into = %a.id, from = %b.id, "merging adjacent changes");
                    self.changes[p].op.content.push_str(&extra);
                    self.mark_change_moved(p);
                    remove.push(idx);
                    // prev stays put, so a run of merges all collapse into it.
                    continue;
                }
            }
            prev = Some(idx);
        }

        let ids = remove.iter().map(|&idx| self.changes[idx].id.clone()).collect();
        self.remove_changes_at(remove);
        ids
    }

    pub(crate) fn apply_delete_to_comments(&mut self, pos: usize, content: &str) -> Result<()> {
        let op_len = count_chars(content);
        let op_start = pos;
        let op_end = pos + op_len;

        for comment in self.comments.iter_mut() {
            let start = comment.op.pos;
            let len = comment.op.len();
            let end = start + len;

            if op_end <= start {
                comment.op.pos -= op_len;
            } else if op_start >= end {
                continue;
            } else {
                let before = if op_start <= start { "" } else { slice_to(&comment.op.content, op_start - start) };
                let after = if op_end >= end { "" } else { slice_from(&comment.op.content, op_end - start) };

                let deleted = slice_chars(&comment.op.content, count_chars(before), len - count_chars(after));
                let offset = start.saturating_sub(op_start);
                let deleted_by_op = slice_chars(content, offset, offset + count_chars(deleted));
                if deleted != deleted_by_op {
                    tracing::warn!(comment = %comment.id, expected = deleted, actual = deleted_by_op,
                        "deleted content does not match comment content");
                    return Err(RangesError::CommentMismatch { comment_id: comment.id.clone() });
                }

                let remaining: SmartString = [before, after].concat().into();
                comment.op.pos = start.min(op_start);
                comment.op.content = remaining;
            }

            self.dirty.comment.mark(&comment.id, Dirty::Moved);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::error::RangesError;
    use crate::op::Op;
    use crate::ranges::{Change, ChangeOp, Comment, Metadata, RangesTracker};
    use super::{apply_modifications, Modification};

    fn ops(tracker: &RangesTracker) -> Vec<ChangeOp> {
        tracker.changes().iter().map(|c| c.op.clone()).collect()
    }

    #[test]
    fn modifications_apply_back_to_front() {
        let mut mods = vec![
            Modification::Insert { offset: 3, content: "XX".into() },
            Modification::Delete { offset: 3, content: "de".into() },
            Modification::Delete { offset: 0, content: "a".into() },
        ];
        assert_eq!(apply_modifications(0, "abcdef", &mut mods).unwrap().as_str(), "bcXXf");
    }

    #[test]
    fn modification_mismatch_is_an_error() {
        let mut mods = vec![Modification::Delete { offset: 1, content: "zz".into() }];
        assert_eq!(apply_modifications(10, "abcdef", &mut mods), Err(RangesError::DeleteMismatch { pos: 11 }));
    }

    #[test]
    fn untracked_delete_shifts_and_clamps() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_delete(10, "old"), Metadata::default()),
            Change::new("b", ChangeOp::new_delete(20, "old"), Metadata::default()),
            Change::new("c", ChangeOp::new_insert(30, "new"), Metadata::default()),
        ], vec![]);

        // Covers the delete at 10, and touches the one at 20. Both end up at 8, and deletes by the
        // same user at the same offset are merged.
        tracker.apply_op(&Op::new_delete(8, "0123456789ab"), Metadata::default()).unwrap();
        assert_eq!(ops(&tracker), vec![
            ChangeOp::new_delete(8, "oldold"),
            ChangeOp::new_insert(18, "new"),
        ]);
    }

    #[test]
    fn untracked_delete_keeps_other_users_coincident_deletes() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_delete(10, "aa"), Metadata::for_user("u1")),
            Change::new("b", ChangeOp::new_delete(10, "bb"), Metadata::for_user("u1")),
            Change::new("c", ChangeOp::new_delete(10, "cc"), Metadata::for_user("u2")),
        ], vec![]);

        tracker.apply_op(&Op::new_delete(0, "x"), Metadata::for_user("u3")).unwrap();
        assert_eq!(ops(&tracker), vec![
            ChangeOp::new_delete(9, "aabb"),
            ChangeOp::new_delete(9, "cc"),
        ]);
        assert_eq!(tracker.changes()[1].id.as_str(), "c");
        assert_eq!(tracker.changes()[1].metadata.user_id.as_deref(), Some("u2"));

        let dirty = &tracker.dirty_state().change;
        assert!(dirty.removed.contains("b"));
        assert!(!dirty.removed.contains("c"));
    }

    #[test]
    fn delete_cancels_tracked_insert() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(5, "hello"), Metadata::for_user("u1")),
        ], vec![]);
        tracker.track_changes = true;

        // Deleting the whole insert leaves nothing behind. No tracked delete either.
        tracker.apply_op(&Op::new_delete(5, "hello"), Metadata::for_user("u1")).unwrap();
        assert!(tracker.changes().is_empty());
        assert!(tracker.dirty_state().change.removed.contains("a"));
    }

    #[test]
    fn delete_overlapping_insert_only_tracks_the_rest() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(5, "hello"), Metadata::for_user("u1")),
        ], vec![]);
        tracker.track_changes = true;

        // "xx" + "he" from the insert.
        tracker.apply_op(&Op::new_delete(3, "xxhe"), Metadata::for_user("u2")).unwrap();
        assert_eq!(ops(&tracker), vec![
            ChangeOp::new_delete(3, "xx"),
            ChangeOp::new_insert(3, "llo"),
        ]);
    }

    #[test]
    fn tracked_deletes_absorb_each_other() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_delete(5, "BB"), Metadata::for_user("u1")),
        ], vec![]);
        tracker.track_changes = true;
        tracker.set_id_seed("000000000000000000");

        // Deleting "A" right before the existing delete folds it in. The existing change is updated
        // in place, keeping its id.
        tracker.apply_op(&Op::new_delete(4, "A"), Metadata::for_user("u1")).unwrap();
        assert_eq!(tracker.changes().len(), 1);
        assert_eq!(tracker.changes()[0].id.as_str(), "a");
        assert_eq!(tracker.changes()[0].op, ChangeOp::new_delete(4, "ABB"));

        // And after it.
        tracker.apply_op(&Op::new_delete(4, "C"), Metadata::for_user("u1")).unwrap();
        assert_eq!(ops(&tracker), vec![ChangeOp::new_delete(4, "ABBC")]);
        assert!(tracker.dirty_state().change.added.is_empty());
    }

    #[test]
    fn tracked_delete_of_plain_text() {
        let mut tracker = RangesTracker::empty();
        tracker.track_changes = true;
        tracker.apply_op(&Op::new_delete(4, "abc"), Metadata::for_user("u1")).unwrap();
        assert_eq!(ops(&tracker), vec![ChangeOp::new_delete(4, "abc")]);
        assert_eq!(tracker.changes()[0].metadata.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn deleting_middle_insert_merges_neighbours() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(0, "aaa"), Metadata::for_user("u1")),
            Change::new("b", ChangeOp::new_insert(3, "bbb"), Metadata::for_user("u2")),
            Change::new("c", ChangeOp::new_insert(6, "ccc"), Metadata::for_user("u1")),
        ], vec![]);

        tracker.apply_op(&Op::new_delete(3, "bbb"), Metadata::for_user("u2")).unwrap();
        assert_eq!(ops(&tracker), vec![ChangeOp::new_insert(0, "aaaccc")]);

        let dirty = &tracker.dirty_state().change;
        assert!(dirty.removed.contains("b"));
        assert!(dirty.removed.contains("c"));
        assert!(dirty.moved.contains("a"));
        // c was moved and then merged away. It only shows up as removed.
        assert!(!dirty.moved.contains("c"));
    }

    #[test]
    fn merge_scan_checks_actual_neighbours() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(0, "aa"), Metadata::for_user("u1")),
            Change::new("b", ChangeOp::new_insert(5, "bb"), Metadata::for_user("u1")),
            Change::new("c", ChangeOp::new_insert(7, "cc"), Metadata::for_user("u1")),
        ], vec![]);

        tracker.scan_and_merge_adjacent();
        assert_eq!(ops(&tracker), vec![
            ChangeOp::new_insert(0, "aa"),
            ChangeOp::new_insert(5, "bbcc"),
        ]);
    }

    #[test]
    fn delete_trims_comments() {
        let mut tracker = RangesTracker::new(vec![], vec![
            Comment::new("before", 0, "ab", "t1"),
            Comment::new("overlap", 4, "cdefgh", "t2"),
            Comment::new("after", 20, "xyz", "t3"),
        ]);

        // Document: "ab..cdefgh.........."
        tracker.apply_op(&Op::new_delete(2, "..cd"), Metadata::default()).unwrap();
        let comments: Vec<(usize, &str)> = tracker.comments().iter()
            .map(|c| (c.op.pos, c.op.content.as_str()))
            .collect();
        assert_eq!(comments, vec![(0, "ab"), (2, "efgh"), (16, "xyz")]);

        // Delete from the inside.
        tracker.apply_op(&Op::new_delete(3, "fg"), Metadata::default()).unwrap();
        assert_eq!(tracker.comments()[1].op.content.as_str(), "eh");
        assert_eq!(tracker.comments()[1].op.pos, 2);
    }

    #[test]
    fn delete_not_matching_comment_fails() {
        let mut tracker = RangesTracker::new(vec![], vec![Comment::new("c1", 4, "abc", "t1")]);
        assert_eq!(
            tracker.apply_op(&Op::new_delete(3, "xyz"), Metadata::default()),
            Err(RangesError::CommentMismatch { comment_id: "c1".into() })
        );
    }

    #[test]
    fn delete_in_multibyte_text() {
        let mut tracker = RangesTracker::new(vec![
            Change::new("a", ChangeOp::new_insert(1, "日本語"), Metadata::default()),
        ], vec![Comment::new("c", 0, "ü日本", "t")]);

        tracker.apply_op(&Op::new_delete(2, "本"), Metadata::default()).unwrap();
        assert_eq!(ops(&tracker), vec![ChangeOp::new_insert(1, "日語")]);
        assert_eq!(tracker.comments()[0].op.content.as_str(), "ü日");
    }
}
