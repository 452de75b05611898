//! The ranges tracker keeps a set of tracked changes (inserts and deletes, like track changes in
//! Word) and comments attached to a document. We don't store the document itself. Instead we're
//! told about every op applied to it, and we move our ranges to match.
//!
//! The ranges describe the document *as it is now*. So tracked inserts cover text which is in the
//! document, and tracked deletes cover text which is no longer there. The length of a tracked
//! delete doesn't push later offsets along:
//!
//! ```text
//!             this is the current text of the document
//!                         |-----|            |
//!  {i: "current ", p:12} -^                   ^- {d: "old ", p: 31}
//! ```
//!
//! Track changes rules (consistent with Word):
//!
//! - Text inserted at a tracked delete goes to the left of the delete.
//!   `"foo|bar" -> "foobaz|bar"`, where `|` is the delete and 'baz' is inserted.
//! - Deleting text flagged as inserted doesn't create a delete marker. It just removes the insert
//!   marker. A delete overlapping both regular and inserted text only marks the regular part.
//! - Deletes overlapping other deletes are merged.
//! - Inserts by another user don't merge with inserts by the first user. If they land in the
//!   middle of a previous insert, that insert is split in two.
//!
//! Ordering: `changes` and `comments` are plain vectors and we never re-sort them. Tie-breaks
//! between entries at the same offset come from their position in the vector. Ids aren't unique
//! either (merged history can duplicate them), so everything keyed by id matches *all* entries.

mod tracker;
mod insert;
mod delete;
mod dirty;
mod ids;
mod check;

use chrono::{DateTime, Utc};
use smartstring::alias::String as SmartString;
use crate::op::ListOpKind;
use crate::unicount::count_chars;
use crate::{ChangeId, CommentId, ThreadId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use tracker::RangesTracker;
pub use insert::CoincidentDeletes;
pub use dirty::{DirtySet, DirtyState};
pub use ids::IdGenerator;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub user_id: Option<SmartString>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub ts: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new(user_id: &str, ts: DateTime<Utc>) -> Self {
        Self { user_id: Some(user_id.into()), ts: Some(ts) }
    }

    pub fn for_user(user_id: &str) -> Self {
        Self { user_id: Some(user_id.into()), ts: None }
    }
}

/// The op stored inside a tracked change. For inserts, `content` is the inserted text, which is in
/// the document at `pos`. For deletes, it's the deleted text (which we need to put back if the
/// delete is rejected).
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(try_from = "RawChangeOp", into = "RawChangeOp"))]
pub struct ChangeOp {
    pub pos: usize,
    pub kind: ListOpKind,
    pub content: SmartString,
}

impl ChangeOp {
    pub fn new_insert(pos: usize, content: &str) -> Self {
        Self { pos, kind: ListOpKind::Ins, content: content.into() }
    }

    pub fn new_delete(pos: usize, content: &str) -> Self {
        Self { pos, kind: ListOpKind::Del, content: content.into() }
    }

    #[inline]
    pub fn is_insert(&self) -> bool { self.kind == ListOpKind::Ins }

    #[inline]
    pub fn is_delete(&self) -> bool { self.kind == ListOpKind::Del }

    /// Length of the content in chars.
    pub fn len(&self) -> usize {
        count_chars(&self.content)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Changes are kept ordered by offset, with deletes before inserts at the same offset. This is
    /// only used to pick a slot for *new* changes.
    pub(crate) fn sort_key(&self) -> (usize, u8) {
        (self.pos, match self.kind {
            ListOpKind::Del => 0,
            ListOpKind::Ins => 1,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Change {
    pub id: ChangeId,
    pub op: ChangeOp,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: Metadata,
}

impl Change {
    pub fn new(id: &str, op: ChangeOp, metadata: Metadata) -> Self {
        Self { id: id.into(), op, metadata }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommentOp {
    #[cfg_attr(feature = "serde", serde(rename = "p"))]
    pub pos: usize,
    /// The commented text.
    #[cfg_attr(feature = "serde", serde(rename = "c"))]
    pub content: SmartString,
    #[cfg_attr(feature = "serde", serde(rename = "t"))]
    pub thread: ThreadId,
}

impl CommentOp {
    pub fn len(&self) -> usize {
        count_chars(&self.content)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Resolution {
    pub user_id: SmartString,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Comment {
    pub id: CommentId,
    pub op: CommentOp,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: Metadata,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub resolved: Option<Resolution>,
}

impl Comment {
    pub fn new(id: &str, pos: usize, content: &str, thread: &str) -> Self {
        Self {
            id: id.into(),
            op: CommentOp { pos, content: content.into(), thread: thread.into() },
            metadata: Metadata::default(),
            resolved: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Everything the tracker knows about, in the shape it's persisted in. This is what gets loaded
/// when a document is opened, and written back out after it's been edited.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ranges {
    #[cfg_attr(feature = "serde", serde(default))]
    pub changes: Vec<Change>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub comments: Vec<Comment>,
}

impl Ranges {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.comments.is_empty()
    }
}

#[cfg(feature = "serde")]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChangeOp {
    p: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    i: Option<SmartString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<SmartString>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawChangeOp> for ChangeOp {
    type Error = crate::op::InvalidOp;

    fn try_from(raw: RawChangeOp) -> Result<Self, Self::Error> {
        match (raw.i, raw.d) {
            (Some(content), None) => Ok(ChangeOp { pos: raw.p, kind: ListOpKind::Ins, content }),
            (None, Some(content)) => Ok(ChangeOp { pos: raw.p, kind: ListOpKind::Del, content }),
            _ => Err(crate::op::InvalidOp::new("tracked change needs exactly one of i and d")),
        }
    }
}

#[cfg(feature = "serde")]
impl From<ChangeOp> for RawChangeOp {
    fn from(op: ChangeOp) -> Self {
        match op.kind {
            ListOpKind::Ins => RawChangeOp { p: op.pos, i: Some(op.content), d: None },
            ListOpKind::Del => RawChangeOp { p: op.pos, i: None, d: Some(op.content) },
        }
    }
}
