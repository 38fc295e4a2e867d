use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf, StripPrefixError};

use compio::fs;
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use filetime::FileTime;
use snafu::prelude::*;
use tempfile::TempPath;
use tracing::debug;
use walkdir::WalkDir;

use crate::filesystem::EntryKind;
use crate::filesystem::tree::is_unresolvable_link;

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem primitives the reconciler applies to the destination tree.
///
/// Every operation is best effort: a failure leaves whatever was already
/// written in place and is reported with the path it failed on.
pub trait FilesystemService {
    async fn create_dir(&self, path: &Path) -> Result<(), FilesystemError>;

    /// Copies content, permission bits and access/modification times.
    async fn copy_file_with_metadata(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), FilesystemError>;

    /// Merges the `source` subtree into `destination`, creating it when absent
    /// and overwriting every file it contains. Destination entries with no
    /// source counterpart are left alone.
    async fn overwrite_directory_tree(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), FilesystemError>;

    async fn remove_file(&self, path: &Path) -> Result<(), FilesystemError>;

    /// Removes an empty directory.
    async fn remove_dir(&self, path: &Path) -> Result<(), FilesystemError>;

    /// Removes a file, or a directory together with everything below it.
    async fn remove_entry_recursive(&self, path: &Path) -> Result<(), FilesystemError>;

    /// Kind of the entry at `path` without following symbolic links, `None`
    /// when nothing exists there.
    fn entry_kind(&self, path: &Path) -> Result<Option<EntryKind>, FilesystemError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Creates an empty file with a unique name in the destination's
    /// directory. It is deleted again when dropped without being persisted.
    fn staging_file(destination: &Path) -> Result<TempPath, FilesystemError> {
        let directory = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".treesync-")
            .tempfile_in(directory)
            .context(WriteSnafu { path: directory })?;
        Ok(staging.into_temp_path())
    }

    /// Streams `source` into `staging` one chunk at a time.
    async fn copy_contents(source: &Path, staging: &Path) -> Result<u64, FilesystemError> {
        let reader = fs::File::open(source)
            .await
            .context(ReadSnafu { path: source })?;
        let mut writer = fs::OpenOptions::new()
            .write(true)
            .open(staging)
            .await
            .context(WriteSnafu { path: staging })?;

        let mut buffer = Vec::with_capacity(COPY_CHUNK_SIZE);
        let mut position = 0;
        loop {
            buffer.clear();
            let read = reader.read_at(buffer, position).await;
            buffer = read.1;
            let length = read.0.context(ReadSnafu { path: source })?;
            if length == 0 {
                break;
            }

            let written = writer.write_all_at(buffer, position).await;
            buffer = written.1;
            written.0.context(WriteSnafu { path: staging })?;
            position += length as u64;
        }

        Ok(position)
    }
}

impl FilesystemService for LocalFilesystem {
    async fn create_dir(&self, path: &Path) -> Result<(), FilesystemError> {
        debug!("Creating directory {}", path.display());
        fs::create_dir(path).await.context(CreateDirSnafu { path })
    }

    async fn copy_file_with_metadata(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), FilesystemError> {
        debug!("Copying {} to {}", source.display(), destination.display());
        let metadata = std::fs::metadata(source).context(MetadataSnafu { path: source })?;

        // Content lands next to the destination first so a reader never sees a
        // half-written file and a read-only file from an earlier pass is
        // replaced rather than reopened for writing.
        let staging = Self::staging_file(destination)?;
        let staging_path = staging.to_path_buf();
        let copied = Self::copy_contents(source, &staging).await?;
        apply_metadata(&staging, &metadata)?;
        staging
            .persist(destination)
            .map_err(|error| error.error)
            .context(RenameSnafu {
                from: staging_path,
                to: destination,
            })?;

        debug!("Copied {} bytes to {}", copied, destination.display());
        Ok(())
    }

    async fn overwrite_directory_tree(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), FilesystemError> {
        debug!(
            "Overwriting {} with the contents of {}",
            destination.display(),
            source.display()
        );

        let mut directories = Vec::new();
        for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Err(error) if is_unresolvable_link(&error) => continue,
                entry => entry.context(WalkSnafu { root: source })?,
            };
            let relative = entry.path().strip_prefix(source).context(OutsideRootSnafu {
                path: entry.path(),
                root: source,
            })?;
            let target = if relative.as_os_str().is_empty() {
                destination.to_path_buf()
            } else {
                destination.join(relative)
            };
            let existing = self.entry_kind(&target)?;

            if entry.file_type().is_dir() {
                match existing {
                    Some(EntryKind::Directory) => {}
                    Some(EntryKind::File) => {
                        self.remove_file(&target).await?;
                        self.create_dir(&target).await?;
                    }
                    None => self.create_dir(&target).await?,
                }
                directories.push((entry.into_path(), target));
            } else {
                if existing == Some(EntryKind::Directory) {
                    self.remove_entry_recursive(&target).await?;
                }
                self.copy_file_with_metadata(entry.path(), &target).await?;
            }
        }

        // Writing children bumps a directory's modification time, so directory
        // metadata is applied last and deepest first.
        for (source_dir, target) in directories.iter().rev() {
            let metadata =
                std::fs::metadata(source_dir).context(MetadataSnafu { path: source_dir })?;
            apply_metadata(target, &metadata)?;
        }

        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), FilesystemError> {
        debug!("Removing file {}", path.display());
        fs::remove_file(path).await.context(RemoveFileSnafu { path })
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), FilesystemError> {
        debug!("Removing directory {}", path.display());
        fs::remove_dir(path).await.context(RemoveDirSnafu { path })
    }

    async fn remove_entry_recursive(&self, path: &Path) -> Result<(), FilesystemError> {
        match self.entry_kind(path)? {
            Some(EntryKind::Directory) => {
                debug!("Removing directory tree {}", path.display());
                std::fs::remove_dir_all(path).context(RemoveDirSnafu { path })
            }
            Some(EntryKind::File) => self.remove_file(path).await,
            None => Ok(()),
        }
    }

    fn entry_kind(&self, path: &Path) -> Result<Option<EntryKind>, FilesystemError> {
        match std::fs::symlink_metadata(path) {
            Ok(metadata) => Ok(Some(EntryKind::of(metadata.file_type()))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error).context(MetadataSnafu { path }),
        }
    }
}

fn apply_metadata(path: &Path, metadata: &Metadata) -> Result<(), FilesystemError> {
    let accessed = FileTime::from_last_access_time(metadata);
    let modified = FileTime::from_last_modification_time(metadata);
    filetime::set_file_times(path, accessed, modified).context(TimestampsSnafu { path })?;
    std::fs::set_permissions(path, metadata.permissions()).context(PermissionsSnafu { path })
}

#[derive(Debug, Snafu)]
pub enum FilesystemError {
    #[snafu(display("Failed to create directory {}", path.display()))]
    CreateDirError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read {}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write {}", path.display()))]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to move {} to {}", from.display(), to.display()))]
    RenameError {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read metadata of {}", path.display()))]
    MetadataError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to set permissions of {}", path.display()))]
    PermissionsError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to set timestamps of {}", path.display()))]
    TimestampsError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to remove file {}", path.display()))]
    RemoveFileError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to remove directory {}", path.display()))]
    RemoveDirError {
        path: PathBuf,
        source: std::io::Error,
    },
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
}
