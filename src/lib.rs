//! This crate keeps track changes and comments attached to the right parts of a collaboratively
//! edited text document.
//!
//! The document itself is edited by a stream of positional ops (ShareJS style text ops), already
//! transformed and put in order by an OT layer upstream. Alongside the document we keep a set of
//! *ranges*:
//!
//! - Tracked changes. These are inserts and deletes attributed to a user, which haven't been
//!   accepted or rejected yet (like track changes in Word).
//! - Comments, anchored to a span of text and grouped into threads.
//!
//! Every time an op is applied to the document, the [`RangesTracker`](ranges::RangesTracker) moves
//! every range to match. Ranges never drift: replaying the same ops from the same starting point
//! always gives the same offsets.
//!
//! ## Example
//!
//! ```
//! use tracked_ranges::*;
//!
//! let mut tracker = RangesTracker::empty();
//! tracker.track_changes = true;
//!
//! // "hello world" -> "hello big world"
//! tracker.apply_op(&Op::new_insert(6, "big "), Metadata::for_user("fred")).unwrap();
//! assert_eq!(tracker.changes()[0].op.pos, 6);
//!
//! // And someone else typed at the start of the document.
//! tracker.track_changes = false;
//! tracker.apply_op(&Op::new_insert(0, "Oh, "), Metadata::for_user("george")).unwrap();
//! assert_eq!(tracker.changes()[0].op.pos, 10);
//! ```
//!
//! When a client replaces the whole document, [`diff_as_ops`](diff::diff_as_ops) turns the new
//! content into ops. [`DocSession`](session::DocSession) puts all of it together: it holds the
//! document text, its version and its ranges, and applies versioned updates in order.
//!
//! ## Offsets
//!
//! All offsets and lengths in this crate are counted in unicode characters (scalar values), not
//! bytes.
//!
//! ## Ids
//!
//! Change and comment ids are opaque strings. They usually look like mongo ObjectIds, but they
//! are *not* guaranteed to be unique. Merged histories sometimes duplicate them. So every method
//! which takes an id acts on all entries with that id.

#![allow(clippy::len_without_is_empty)]

use smartstring::alias::String as SmartString;

pub mod error;
pub mod unicount;
pub mod op;
pub mod ranges;
pub mod diff;
pub mod history;
pub mod session;

#[cfg(test)]
mod fuzzer_tools;

pub type ChangeId = SmartString;
pub type CommentId = SmartString;
pub type ThreadId = SmartString;

pub use error::{RangesError, Result};
pub use op::{ListOpKind, Op};
pub use ranges::{Change, ChangeOp, CoincidentDeletes, Comment, CommentOp, DirtySet, DirtyState, IdGenerator, Metadata, Ranges, RangesTracker, Resolution};
pub use diff::{diff_as_ops, diff_as_ops_with, diff_str_as_ops, diff_str_as_ops_with, DiffAlgorithm, DiffOptions, Granularity};
pub use history::{Update, UpdateLog, UpdateMeta};
pub use session::{DocSession, SessionOptions};
