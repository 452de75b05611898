//! Versioned updates, and the log of updates waiting to be persisted.
//!
//! An update is one batch of ops from one user, applied at one version of the document. Once a
//! session has applied an update it goes into the [`UpdateLog`], where it waits for the history
//! service to pick it up.

use chrono::{DateTime, Utc};
use smartstring::alias::String as SmartString;
use crate::error::{RangesError, Result};
use crate::op::Op;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UpdateMeta {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub user_id: Option<SmartString>,

    /// When the update was made. On the wire this is milliseconds since the epoch.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"))]
    pub ts: Option<DateTime<Utc>>,

    /// Set when this update should be tracked. The value is an opaque id from the client.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub tc: Option<SmartString>,

    /// Which client connection (or service) the update came from.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub source: Option<SmartString>,

    /// Eg "external" for whole-document sets.
    #[cfg_attr(feature = "serde", serde(default, rename = "type", skip_serializing_if = "Option::is_none"))]
    pub kind: Option<SmartString>,
}

impl UpdateMeta {
    pub fn for_user(user_id: &str) -> Self {
        Self { user_id: Some(user_id.into()), ..Default::default() }
    }

    pub fn is_tracked(&self) -> bool {
        self.tc.is_some()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Update {
    /// The document version the ops apply to.
    pub v: u64,
    #[cfg_attr(feature = "serde", serde(rename = "op"))]
    pub ops: Vec<Op>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub meta: UpdateMeta,
}

impl Update {
    pub fn new(v: u64, ops: Vec<Op>, meta: UpdateMeta) -> Self {
        Self { v, ops, meta }
    }
}

/// Updates applied to a document but not yet persisted, in version order.
///
/// Versions must be contiguous. The log remembers the last version it saw even after the pending
/// updates are taken, so a gap across a flush is still caught.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    pending: Vec<Update>,
    last_version: Option<u64>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a log for a document whose last persisted update was at `version`.
    pub fn starting_after(version: u64) -> Self {
        Self { pending: Vec::new(), last_version: Some(version) }
    }

    pub fn append(&mut self, update: Update) -> Result<()> {
        if update.ops.is_empty() {
            tracing::warn!(v = update.v, "refusing to record empty update");
            return Err(RangesError::EmptyBatch);
        }

        if let Some(last) = self.last_version {
            if update.v != last + 1 {
                tracing::warn!(expected = last + 1, actual = update.v, "update log version gap");
                return Err(RangesError::VersionMismatch { expected: last + 1, actual: update.v });
            }
        }

        self.last_version = Some(update.v);
        self.pending.push(update);
        Ok(())
    }

    pub fn pending(&self) -> &[Update] {
        &self.pending
    }

    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand over everything pending, eg to flush it to the history service.
    pub fn take_pending(&mut self) -> Vec<Update> {
        std::mem::take(&mut self.pending)
    }
}
