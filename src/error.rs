//! Error types for range tracking and document sessions.
//!
//! Nearly everything here is a contract violation: the ops we were handed don't line up with the
//! document or the tracked ranges. Once that happens the range state can't be trusted anymore,
//! and the only sane recovery is for the caller to throw the session away and reload it.

use thiserror::Error;
use smartstring::alias::String as SmartString;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RangesError {
    /// A delete op removed text which doesn't match what's actually there. Either the document
    /// text, or the tracked insert / delete it overlaps.
    #[error("deletion does not match text in document at {pos}")]
    DeleteMismatch { pos: usize },

    /// A delete op overlapped a comment, but the deleted text doesn't match the comment.
    #[error("deleted content does not match comment content (comment {comment_id})")]
    CommentMismatch { comment_id: SmartString },

    /// Found by `validate`: a tracked insert doesn't match the document text.
    #[error("insertion does not match text in document (change {change_id})")]
    InsertMismatch { change_id: SmartString },

    /// Found by `validate`: a comment doesn't match the document text.
    #[error("comment does not match text in document (comment {comment_id})")]
    CommentTextMismatch { comment_id: SmartString },

    /// An op names a position past the end of the document.
    #[error("op position {pos} is past the end of the document (length {len})")]
    PositionOutOfBounds { pos: usize, len: usize },

    /// Updates must arrive one at a time, in version order.
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// Recording a batch of zero ops would corrupt downstream version counters.
    #[error("refusing to record an empty batch of ops")]
    EmptyBatch,

    #[error("document is too large ({len} chars, limit {max})")]
    DocTooLarge { len: usize, max: usize },
}

pub type Result<T, E = RangesError> = std::result::Result<T, E>;
