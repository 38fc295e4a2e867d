use std::fs::FileType;
use std::path::{Path, PathBuf, StripPrefixError};

use derive_more::Display;
use hashlink::LinkedHashMap;
use snafu::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::filesystem::{RelativePath, RelativePathError};

/// Kind of a filesystem node. Anything that is not a directory is
/// synchronized as a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn of(file_type: FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{path} ({kind})")]
pub struct TreeEntry {
    pub path: RelativePath,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn new(path: RelativePath, kind: EntryKind) -> Self {
        Self { path, kind }
    }
}

/// Every entry found below a root, keyed by relative path.
///
/// Iteration follows the walk order: parents come before their children and
/// siblings are sorted by file name, so two scans of an unchanged tree list
/// the same entries in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeListing {
    entries: LinkedHashMap<RelativePath, EntryKind>,
}

impl TreeListing {
    /// Lists `root` as it is on disk. A symbolic link is listed as a file and
    /// never descended into.
    pub fn scan(root: &Path) -> Result<Self, ListingError> {
        Self::walk(root, false)
    }

    /// Lists `root` with symbolic links resolved: a link to a directory is
    /// listed as a directory together with its contents. Dangling links and
    /// link cycles are skipped.
    pub fn scan_following_links(root: &Path) -> Result<Self, ListingError> {
        Self::walk(root, true)
    }

    fn walk(root: &Path, follow_links: bool) -> Result<Self, ListingError> {
        debug!("Scanning tree under {}", root.display());

        let mut listing = Self::default();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Err(error) if is_unresolvable_link(&error) => continue,
                entry => entry.context(WalkSnafu { root })?,
            };
            let relative = entry.path().strip_prefix(root).context(OutsideRootSnafu {
                path: entry.path(),
                root,
            })?;
            let relative = RelativePath::from_path(relative).context(InvalidPathSnafu)?;
            listing.insert(relative, EntryKind::of(entry.file_type()));
        }

        debug!(
            "Found {} entries under {}",
            listing.entries.len(),
            root.display()
        );
        Ok(listing)
    }

    pub fn insert(&mut self, path: RelativePath, kind: EntryKind) -> Option<EntryKind> {
        self.entries.insert(path, kind)
    }

    pub fn get(&self, path: &RelativePath) -> Option<EntryKind> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = TreeEntry> {
        self.entries
            .iter()
            .map(|(path, kind)| TreeEntry::new(path.clone(), *kind))
    }
}

impl FromIterator<TreeEntry> for TreeListing {
    fn from_iter<I: IntoIterator<Item = TreeEntry>>(iter: I) -> Self {
        let mut listing = Self::default();
        for entry in iter {
            listing.insert(entry.path, entry.kind);
        }
        listing
    }
}

/// True for walk errors caused by a dangling symbolic link or a link cycle,
/// which are logged and left out of the walk.
pub(super) fn is_unresolvable_link(error: &walkdir::Error) -> bool {
    if let Some(ancestor) = error.loop_ancestor() {
        warn!("Skipping link cycle back to {}", ancestor.display());
        return true;
    }

    match error.path() {
        Some(path) if is_dangling_link(path) => {
            warn!("Skipping dangling link {}", path.display());
            true
        }
        _ => false,
    }
}

fn is_dangling_link(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_symlink())
        && std::fs::metadata(path).is_err()
}

#[derive(Debug, Snafu)]
pub enum ListingError {
    #[snafu(display("Failed to walk the tree under {}", root.display()))]
    WalkError {
        root: PathBuf,
        source: walkdir::Error,
    },
    #[snafu(display("Walked to {} which is outside of {}", path.display(), root.display()))]
    OutsideRootError {
        path: PathBuf,
        root: PathBuf,
        source: StripPrefixError,
    },
    #[snafu(display("Found an entry that cannot be synchronized"))]
    InvalidPathError { source: RelativePathError },
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn paths(listing: &TreeListing) -> Vec<String> {
        listing.iter().map(|entry| entry.path.to_string()).collect()
    }

    #[test]
    fn scan_of_empty_root_is_empty() {
        let root = TempDir::new().expect("Failed to create temp directory");

        let listing = TreeListing::scan(root.path()).unwrap();

        assert_eq!(listing.iter().count(), 0);
    }

    #[test]
    fn scan_lists_nested_entries_relative_to_root() {
        let root = TempDir::new().expect("Failed to create temp directory");
        fs::write(root.path().join("a.txt"), "a").unwrap();
        fs::create_dir_all(root.path().join("b").join("c")).unwrap();
        fs::write(root.path().join("b").join("c").join("d.txt"), "d").unwrap();

        let listing = TreeListing::scan(root.path()).unwrap();

        assert_eq!(paths(&listing), vec!["a.txt", "b", "b/c", "b/c/d.txt"]);
        let kind = |path: &str| listing.get(&RelativePath::try_from(path).unwrap());
        assert_eq!(kind("a.txt"), Some(EntryKind::File));
        assert_eq!(kind("b"), Some(EntryKind::Directory));
        assert_eq!(kind("b/c"), Some(EntryKind::Directory));
        assert_eq!(kind("b/c/d.txt"), Some(EntryKind::File));
        assert_eq!(kind("missing"), None);
    }

    #[test]
    fn scan_includes_hidden_entries() {
        let root = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(root.path().join(".git")).unwrap();
        fs::write(root.path().join(".git").join("HEAD"), "ref").unwrap();
        fs::write(root.path().join(".env"), "KEY=1").unwrap();

        let listing = TreeListing::scan(root.path()).unwrap();

        assert_eq!(paths(&listing), vec![".env", ".git", ".git/HEAD"]);
    }

    #[test]
    fn scan_of_missing_root_fails() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let missing = root.path().join("does-not-exist");

        let result = TreeListing::scan(&missing);

        assert!(matches!(result, Err(ListingError::WalkError { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn scan_keeps_links_as_files() {
        let root = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(root.path().join("real")).unwrap();
        fs::write(root.path().join("real").join("x.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("link")).unwrap();

        let listing = TreeListing::scan(root.path()).unwrap();

        assert_eq!(paths(&listing), vec!["link", "real", "real/x.txt"]);
        assert_eq!(
            listing.get(&RelativePath::try_from("link").unwrap()),
            Some(EntryKind::File)
        );
    }

    #[cfg(unix)]
    #[test]
    fn scan_following_links_lists_linked_directories() {
        let root = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(root.path().join("real")).unwrap();
        fs::write(root.path().join("real").join("x.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("link")).unwrap();

        let listing = TreeListing::scan_following_links(root.path()).unwrap();

        assert_eq!(
            paths(&listing),
            vec!["link", "link/x.txt", "real", "real/x.txt"]
        );
        assert_eq!(
            listing.get(&RelativePath::try_from("link").unwrap()),
            Some(EntryKind::Directory)
        );
    }

    #[cfg(unix)]
    #[test]
    fn scan_following_links_skips_cycles_and_dangling_links() {
        let root = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(root.path().join("dir")).unwrap();
        std::os::unix::fs::symlink(root.path(), root.path().join("dir").join("up")).unwrap();
        std::os::unix::fs::symlink(root.path().join("gone"), root.path().join("dangling")).unwrap();
        fs::write(root.path().join("kept.txt"), "kept").unwrap();

        let listing = TreeListing::scan_following_links(root.path()).unwrap();

        assert_eq!(paths(&listing), vec!["dir", "kept.txt"]);
    }

    #[test]
    fn listing_collects_from_entries() {
        let listing: TreeListing = [
            TreeEntry::new(RelativePath::try_from("b").unwrap(), EntryKind::Directory),
            TreeEntry::new(RelativePath::try_from("b/c.txt").unwrap(), EntryKind::File),
        ]
        .into_iter()
        .collect();

        assert_eq!(paths(&listing), vec!["b", "b/c.txt"]);
        assert!(listing.contains(&RelativePath::try_from("b/c.txt").unwrap()));
    }
}
