use std::path::{Component, Path, PathBuf};

use derive_more::{Deref, Display};
use snafu::prelude::*;

/// Path of a tree entry relative to its root, stored with `/` between segments
/// so that source and destination entries compare equal on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Deref)]
pub struct RelativePath(String);

impl RelativePath {
    pub fn from_path(relative: &Path) -> Result<Self, RelativePathError> {
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str().context(NonUtf8Snafu {
                        path: relative.to_path_buf(),
                    })?;
                    segments.push(segment);
                }
                Component::CurDir => {}
                _ => {
                    return NotRelativeSnafu {
                        path: relative.to_path_buf(),
                    }
                    .fail();
                }
            }
        }
        ensure!(!segments.is_empty(), EmptySnafu);

        Ok(Self(segments.join("/")))
    }

    /// Number of path segments, `1` for direct children of the root.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn is_top_level(&self) -> bool {
        !self.0.contains('/')
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Proper prefixes of this path, closest to the root first.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.0.match_indices('/').map(|(index, _)| &self.0[..index])
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.segments()
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = RelativePathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_path(Path::new(value))
    }
}

#[derive(Debug, Snafu)]
pub enum RelativePathError {
    #[snafu(display("Path {} is not valid UTF-8", path.display()))]
    NonUtf8Error { path: PathBuf },
    #[snafu(display("Path {} is not a plain relative path", path.display()))]
    NotRelative { path: PathBuf },
    #[snafu(display("Relative path has no segments"))]
    Empty,
}
