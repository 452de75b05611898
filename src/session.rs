use jumprope::JumpRope;
use crate::diff::{diff_str_as_ops_with, DiffOptions};
use crate::error::{RangesError, Result};
use crate::history::{Update, UpdateLog, UpdateMeta};
use crate::op::Op;
use crate::ranges::{Metadata, Ranges, RangesTracker};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionOptions {
    /// Updates which would grow the document past this many chars are refused.
    pub max_doc_length: usize,

    /// Used when a whole new document is set with [`DocSession::set_doc`].
    pub diff: DiffOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_doc_length: 2 * 1024 * 1024,
            diff: DiffOptions::default(),
        }
    }
}

/// An open document. This owns the document text, its version, the ranges attached to it, and
/// the updates which haven't been flushed yet.
///
/// Updates must be applied one at a time, in version order. If applying an update fails the
/// session is in an undefined state, and should be dropped and reloaded.
#[derive(Debug)]
pub struct DocSession {
    content: JumpRope,
    version: u64,
    ranges: RangesTracker,
    log: UpdateLog,
    opts: SessionOptions,
}

impl DocSession {
    pub fn new(content: &str, version: u64, ranges: Ranges) -> Self {
        Self::with_options(content, version, ranges, SessionOptions::default())
    }

    pub fn with_options(content: &str, version: u64, ranges: Ranges, opts: SessionOptions) -> Self {
        Self {
            content: JumpRope::from(content),
            version,
            ranges: ranges.into(),
            log: version.checked_sub(1).map_or_else(UpdateLog::new, UpdateLog::starting_after),
            opts,
        }
    }

    pub fn content(&self) -> &JumpRope {
        &self.content
    }

    pub fn text(&self) -> String {
        self.content.to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().split('\n').map(String::from).collect()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn ranges(&self) -> &RangesTracker {
        &self.ranges
    }

    /// Accepting / rejecting changes and resolving threads all happen here.
    pub fn ranges_mut(&mut self) -> &mut RangesTracker {
        &mut self.ranges
    }

    pub fn log(&self) -> &UpdateLog {
        &self.log
    }

    pub fn take_pending_updates(&mut self) -> Vec<Update> {
        self.log.take_pending()
    }

    /// Apply an update to the document and its ranges, and record it in the log.
    ///
    /// The update must be at exactly the current version.
    pub fn apply_update(&mut self, update: Update) -> Result<()> {
        if update.v != self.version {
            tracing::warn!(expected = self.version, actual = update.v, "update at wrong version");
            return Err(RangesError::VersionMismatch { expected: self.version, actual: update.v });
        }
        if update.ops.is_empty() {
            return Err(RangesError::EmptyBatch);
        }

        self.ranges.track_changes = update.meta.is_tracked();
        let metadata = Metadata {
            user_id: update.meta.user_id.clone(),
            ts: update.meta.ts,
        };

        for op in update.ops.iter() {
            op.apply_to_rope(&mut self.content)?;

            let len = self.content.len_chars();
            if len > self.opts.max_doc_length {
                tracing::warn!(len, max = self.opts.max_doc_length, "document too large");
                return Err(RangesError::DocTooLarge { len, max: self.opts.max_doc_length });
            }

            self.ranges.apply_op(op, metadata.clone())?;
        }

        tracing::debug!(v = update.v, ops = update.ops.len(), tracked = self.ranges.track_changes, "applied update");
        self.version += 1;
        self.log.append(update)
    }

    /// Replace the whole document. The change is diffed into ops, which are applied as a normal
    /// (untracked) update.
    ///
    /// With `undoing` set, inserts restore tracked deletes they match.
    ///
    /// Returns the version the ops were applied at, or None if the document didn't change.
    pub fn set_doc(&mut self, new_lines: &[&str], user_id: &str, undoing: bool) -> Result<Option<u64>> {
        let old = self.text();
        let new = new_lines.join("\n");

        let mut ops = diff_str_as_ops_with(&old, &new, &self.opts.diff);
        if ops.is_empty() {
            return Ok(None);
        }
        if undoing {
            ops = ops.into_iter().map(Op::into_undo).collect();
        }

        let v = self.version;
        let meta = UpdateMeta {
            kind: Some("external".into()),
            ..UpdateMeta::for_user(user_id)
        };
        self.apply_update(Update::new(v, ops, meta))?;
        Ok(Some(v))
    }
}
