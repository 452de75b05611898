/// Ops are the positional edits the tracker is fed. They're ShareJS text ops: each one is a
/// single insert or delete component at some character position, already transformed and
/// ordered by the OT layer upstream. On the wire they look like this:
///
/// ```text
/// {p: 42, i: "foo"}           Insert 'foo' at offset 42
/// {p: 42, i: "foo", u: true}  Insert 'foo' at 42, rejecting a tracked delete sitting there
/// {p: 37, d: "bar"}           Delete 'bar' from offset 37
/// {p: 10, c: "xyz", t: "..."} Comment on 'xyz' at offset 10, for thread t
/// ```

use std::fmt::{Display, Formatter};
use jumprope::JumpRope;
use smartstring::alias::String as SmartString;
use ListOpKind::*;
use crate::error::{RangesError, Result};
use crate::unicount::count_chars;
use crate::ThreadId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Is a tracked change an insert or a delete?
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ListOpKind { Ins, Del }

impl Display for ListOpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Ins => f.write_str("Ins"),
            Del => f.write_str("Del")
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(try_from = "RawOp", into = "RawOp"))]
pub enum Op {
    /// Plain insert. Anything at or after `pos` gets pushed along.
    Insert { pos: usize, content: SmartString },

    /// An insert which restores text from a tracked delete at `pos` (the `u` flag). If no
    /// tracked delete at `pos` starts with this content, it behaves like a plain insert.
    RejectInsert { pos: usize, content: SmartString },

    /// Remove raw text from the document. This is *not* a tracked delete, unless the tracker has
    /// track_changes turned on.
    Delete { pos: usize, content: SmartString },

    /// Attach a comment to the text at `pos..pos+len(content)`. This doesn't modify the document.
    Comment { pos: usize, content: SmartString, thread: Option<ThreadId> },
}

impl Op {
    pub fn new_insert(pos: usize, content: &str) -> Self {
        Op::Insert { pos, content: content.into() }
    }

    pub fn new_reject_insert(pos: usize, content: &str) -> Self {
        Op::RejectInsert { pos, content: content.into() }
    }

    pub fn new_delete(pos: usize, content: &str) -> Self {
        Op::Delete { pos, content: content.into() }
    }

    pub fn new_comment(pos: usize, content: &str, thread: &str) -> Self {
        Op::Comment { pos, content: content.into(), thread: Some(thread.into()) }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        match self {
            Op::Insert { pos, .. } | Op::RejectInsert { pos, .. }
            | Op::Delete { pos, .. } | Op::Comment { pos, .. } => *pos
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Op::Insert { content, .. } | Op::RejectInsert { content, .. }
            | Op::Delete { content, .. } | Op::Comment { content, .. } => content.as_str()
        }
    }

    /// Length of the op's content in chars.
    pub fn len(&self) -> usize {
        count_chars(self.content())
    }

    pub fn is_empty(&self) -> bool {
        self.content().is_empty()
    }

    /// Ins / Del for ops which edit the document. None for comments.
    pub fn kind(&self) -> Option<ListOpKind> {
        match self {
            Op::Insert { .. } | Op::RejectInsert { .. } => Some(Ins),
            Op::Delete { .. } => Some(Del),
            Op::Comment { .. } => None,
        }
    }

    /// Flag an insert as undoing (rejecting) earlier deletes. Other ops are returned as-is, which
    /// matches how undo is signalled for a whole-document set.
    pub fn into_undo(self) -> Self {
        match self {
            Op::Insert { pos, content } => Op::RejectInsert { pos, content },
            op => op,
        }
    }

    /// Apply this op to the document text. Deletes are checked against the text they remove.
    pub fn apply_to_rope(&self, rope: &mut JumpRope) -> Result<()> {
        let doc_len = rope.len_chars();
        let pos = self.pos();
        match self {
            Op::Insert { content, .. } | Op::RejectInsert { content, .. } => {
                if pos > doc_len {
                    return Err(RangesError::PositionOutOfBounds { pos, len: doc_len });
                }
                rope.insert(pos, content);
            }
            Op::Delete { content, .. } => {
                let end = pos + count_chars(content);
                if end > doc_len {
                    return Err(RangesError::PositionOutOfBounds { pos: end, len: doc_len });
                }
                let existing: String = rope.slice_chars(pos..end).collect();
                if existing != content.as_str() {
                    return Err(RangesError::DeleteMismatch { pos });
                }
                rope.remove(pos..end);
            }
            Op::Comment { content, .. } => {
                let end = pos + count_chars(content);
                if end > doc_len {
                    return Err(RangesError::PositionOutOfBounds { pos: end, len: doc_len });
                }
            }
        }
        Ok(())
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Insert { pos, content } => write!(f, "insert {:?} at {}", content, pos),
            Op::RejectInsert { pos, content } => write!(f, "reject-insert {:?} at {}", content, pos),
            Op::Delete { pos, content } => write!(f, "delete {:?} at {}", content, pos),
            Op::Comment { pos, content, .. } => write!(f, "comment {:?} at {}", content, pos),
        }
    }
}

/// Wire shape of an op. Exactly one of i / d / c should be set.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawOp {
    p: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    i: Option<SmartString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<SmartString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<SmartString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    t: Option<SmartString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    u: Option<bool>,
}

#[cfg(feature = "serde")]
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid op: {0}")]
pub struct InvalidOp(&'static str);

#[cfg(feature = "serde")]
impl InvalidOp {
    pub(crate) fn new(msg: &'static str) -> Self { InvalidOp(msg) }
}

#[cfg(feature = "serde")]
impl TryFrom<RawOp> for Op {
    type Error = InvalidOp;

    fn try_from(raw: RawOp) -> std::result::Result<Self, Self::Error> {
        let undo = raw.u.unwrap_or(false);
        match (raw.i, raw.d, raw.c) {
            (Some(content), None, None) => Ok(if undo {
                Op::RejectInsert { pos: raw.p, content }
            } else {
                Op::Insert { pos: raw.p, content }
            }),
            // The undo flag on a delete means "undoing an insert". That makes no difference to
            // the ranges, so we drop it.
            (None, Some(content), None) => Ok(Op::Delete { pos: raw.p, content }),
            (None, None, Some(content)) => Ok(Op::Comment { pos: raw.p, content, thread: raw.t }),
            (None, None, None) => Err(InvalidOp::new("unknown op type")),
            _ => Err(InvalidOp::new("op has more than one of i, d and c")),
        }
    }
}

#[cfg(feature = "serde")]
impl From<Op> for RawOp {
    fn from(op: Op) -> Self {
        match op {
            Op::Insert { pos, content } => RawOp { p: pos, i: Some(content), ..Default::default() },
            Op::RejectInsert { pos, content } => RawOp { p: pos, i: Some(content), u: Some(true), ..Default::default() },
            Op::Delete { pos, content } => RawOp { p: pos, d: Some(content), ..Default::default() },
            Op::Comment { pos, content, thread } => RawOp { p: pos, c: Some(content), t: thread, ..Default::default() },
        }
    }
}
