use std::collections::BTreeSet;
use smartstring::alias::String as SmartString;

/// Ids of the entries touched since the last reset. The persistence layer uses this to write back
/// only what changed.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DirtySet {
    pub added: BTreeSet<SmartString>,
    pub moved: BTreeSet<SmartString>,
    pub removed: BTreeSet<SmartString>,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.moved.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DirtyState {
    pub change: DirtySet,
    pub comment: DirtySet,
}

impl DirtyState {
    pub fn is_empty(&self) -> bool {
        self.change.is_empty() && self.comment.is_empty()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Dirty { Added, Moved, Removed }

impl DirtySet {
    pub(crate) fn mark(&mut self, id: &str, action: Dirty) {
        let set = match action {
            Dirty::Added => &mut self.added,
            Dirty::Moved => &mut self.moved,
            Dirty::Removed => &mut self.removed,
        };
        set.insert(id.into());
    }
}
