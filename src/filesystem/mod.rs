//! Filesystem side of synchronization.
//!
//! Trees are enumerated into flat listings keyed by relative path, and every
//! mutation of the destination goes through [`FilesystemService`].

mod relative_path;
mod service;
mod tree;

pub use relative_path::{RelativePath, RelativePathError};
pub use service::{FilesystemError, FilesystemService, LocalFilesystem};
pub use tree::{EntryKind, ListingError, TreeEntry, TreeListing};
