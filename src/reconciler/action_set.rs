use std::cmp::Reverse;

use derive_more::Display;

use crate::filesystem::{RelativePath, TreeEntry, TreeListing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ActionKind {
    Created,
    Copied,
    Removed,
}

/// Outcome of classifying a source listing against a destination listing.
///
/// `created` holds source-only entries shallowest first, `removed` holds
/// destination-only entries deepest first and `copied` holds entries present
/// on both sides in walk order. Together they cover every path of both trees
/// exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    created: Vec<TreeEntry>,
    removed: Vec<TreeEntry>,
    copied: Vec<TreeEntry>,
}

impl ActionSet {
    pub fn classify(source: &TreeListing, destination: &TreeListing) -> Self {
        let (copied, mut created): (Vec<_>, Vec<_>) = source
            .iter()
            .partition(|entry| destination.contains(&entry.path));
        let mut removed: Vec<_> = destination
            .iter()
            .filter(|entry| !source.contains(&entry.path))
            .collect();

        // Stable sorts keep walk order between entries of equal depth.
        created.sort_by_key(|entry| entry.path.depth());
        removed.sort_by_key(|entry| Reverse(entry.path.depth()));

        Self {
            created,
            removed,
            copied,
        }
    }

    /// Entries whose source kind is used to create them, in application order.
    pub fn created(&self) -> &[TreeEntry] {
        &self.created
    }

    /// Entries whose destination kind is used to remove them, in application
    /// order.
    pub fn removed(&self) -> &[TreeEntry] {
        &self.removed
    }

    pub fn copied(&self) -> &[TreeEntry] {
        &self.copied
    }

    /// Direct children of the root among the copied entries. Overwriting these
    /// covers every nested copied entry as well.
    pub fn top_level_copied(&self) -> impl Iterator<Item = &TreeEntry> {
        self.copied.iter().filter(|entry| entry.path.is_top_level())
    }

    /// Whether the pass had anything to create or remove.
    #[cfg(test)]
    pub fn has_structural_changes(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }

    /// Actions in the order they are applied: created, top-level copied,
    /// removed.
    pub fn applied_actions(&self) -> impl Iterator<Item = (ActionKind, &RelativePath)> {
        let created = self
            .created
            .iter()
            .map(|entry| (ActionKind::Created, &entry.path));
        let copied = self
            .top_level_copied()
            .map(|entry| (ActionKind::Copied, &entry.path));
        let removed = self
            .removed
            .iter()
            .map(|entry| (ActionKind::Removed, &entry.path));
        created.chain(copied).chain(removed)
    }
}
