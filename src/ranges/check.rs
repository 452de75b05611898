//! Consistency checks between the ranges and the document they describe.
//!
//! `validate` is cheap enough to run after every update in tests and tooling. `dbg_check` asserts
//! on internal state and is only meant for fuzzing.

use crate::error::{RangesError, Result};
use crate::ranges::RangesTracker;
use crate::unicount::{count_chars, slice_chars};

impl RangesTracker {
    /// Check every tracked insert and every comment matches the document text at its position.
    ///
    /// Tracked deletes aren't checked. Their text isn't in the document anymore.
    pub fn validate(&self, text: &str) -> Result<()> {
        let doc_len = count_chars(text);

        for change in self.changes.iter().filter(|c| c.op.is_insert()) {
            let end = change.op.pos + change.op.len();
            if end > doc_len || slice_chars(text, change.op.pos, end) != change.op.content.as_str() {
                tracing::warn!(id = %change.id, pos = change.op.pos, "tracked insert doesn't match document");
                return Err(RangesError::InsertMismatch { change_id: change.id.clone() });
            }
        }

        for comment in self.comments.iter() {
            let end = comment.op.pos + comment.op.len();
            if end > doc_len || slice_chars(text, comment.op.pos, end) != comment.op.content.as_str() {
                tracing::warn!(id = %comment.id, pos = comment.op.pos, "comment doesn't match document");
                return Err(RangesError::CommentTextMismatch { comment_id: comment.id.clone() });
            }
        }

        Ok(())
    }

    /// Check the internal state of the tracker. This is only exported for integration testing.
    ///
    /// You shouldn't have any reason to call this method.
    #[allow(unused)]
    pub fn dbg_check(&self, text: &str) {
        // Empty changes are removed as soon as they empty out. Comments can legitimately be
        // empty once all their text is deleted.
        for change in self.changes.iter() {
            assert!(!change.op.is_empty(), "empty change {}", change.id);
        }
        if let Err(e) = self.validate(text) {
            panic!("ranges don't match document: {e}");
        }
    }
}
