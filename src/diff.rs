//! Turn a whole-document overwrite into positional ops.
//!
//! When a client sends us the full new content of a document (rather than ops), we diff it against
//! what we have and emit the equivalent insert / delete ops. Those feed into the ranges tracker
//! and the rest of the pipeline exactly like ops typed by a user.

use std::time::Duration;
use similar::{Algorithm, ChangeTag, TextDiff};
use similar::utils::TextDiffRemapper;
use crate::op::Op;
use crate::unicount::count_chars;

/// How finely to split the documents before diffing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Granularity {
    #[default]
    Chars,
    Words,
    Lines,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DiffAlgorithm {
    #[default]
    Myers,
    Patience,
}

impl From<DiffAlgorithm> for Algorithm {
    fn from(alg: DiffAlgorithm) -> Self {
        match alg {
            DiffAlgorithm::Myers => Algorithm::Myers,
            DiffAlgorithm::Patience => Algorithm::Patience,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiffOptions {
    pub granularity: Granularity,
    pub algorithm: DiffAlgorithm,

    /// Give up on finding a minimal diff after this long. The ops are still correct after a
    /// timeout, just larger than they need to be.
    pub timeout: Option<Duration>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Chars,
            algorithm: DiffAlgorithm::Myers,
            timeout: Some(Duration::from_millis(100)),
        }
    }
}

/// Diff two documents given as arrays of lines. Lines are joined with `"\n"`.
///
/// Applying the returned ops in order to `before` produces `after`.
pub fn diff_as_ops(before: &[&str], after: &[&str]) -> Vec<Op> {
    diff_as_ops_with(before, after, &DiffOptions::default())
}

pub fn diff_as_ops_with(before: &[&str], after: &[&str], opts: &DiffOptions) -> Vec<Op> {
    diff_str_as_ops_with(&before.join("\n"), &after.join("\n"), opts)
}

pub fn diff_str_as_ops(before: &str, after: &str) -> Vec<Op> {
    diff_str_as_ops_with(before, after, &DiffOptions::default())
}

pub fn diff_str_as_ops_with(before: &str, after: &str, opts: &DiffOptions) -> Vec<Op> {
    let mut config = TextDiff::configure();
    config.algorithm(opts.algorithm.into());
    if let Some(timeout) = opts.timeout {
        config.timeout(timeout);
    }

    let diff = match opts.granularity {
        Granularity::Chars => config.diff_chars(before, after),
        Granularity::Words => config.diff_words(before, after),
        Granularity::Lines => config.diff_lines(before, after),
    };
    let remapper = TextDiffRemapper::from_text_diff(&diff, before, after);

    let mut result: Vec<Op> = Vec::new();
    let mut pos = 0;
    for (tag, s) in diff.ops().iter()
        .flat_map(move |x| remapper.iter_slices(x)) {

        let len = count_chars(s);
        match tag {
            ChangeTag::Equal => pos += len,
            ChangeTag::Delete => {
                push_or_extend(&mut result, Op::new_delete(pos, s));
            }
            ChangeTag::Insert => {
                push_or_extend(&mut result, Op::new_insert(pos, s));
                pos += len;
            }
        }
    }

    tracing::trace!(ops = result.len(), "diffed document");
    result
}

/// The remapper can hand back a single hunk in a few slices. Glue them back together, so each
/// hunk becomes one op.
fn push_or_extend(ops: &mut Vec<Op>, op: Op) {
    if let Some(last) = ops.last_mut() {
        match (last, &op) {
            (Op::Delete { pos: last_pos, content: last }, Op::Delete { pos, content })
                if *last_pos == *pos =>
            {
                last.push_str(content);
                return;
            }
            (Op::Insert { pos: last_pos, content: last }, Op::Insert { pos, content })
                if *last_pos + count_chars(last.as_str()) == *pos =>
            {
                last.push_str(content);
                return;
            }
            _ => {}
        }
    }
    ops.push(op);
}
