use std::collections::HashSet;
use std::path::Path;

use snafu::prelude::*;
use tracing::{debug, info};

use crate::filesystem::{
    EntryKind, FilesystemError, FilesystemService, ListingError, LocalFilesystem, TreeEntry,
    TreeListing,
};
use crate::reconciler::ActionSet;
use crate::scheduler::ShutdownSignal;

/// Makes a destination tree's relative file set match a source tree's.
pub struct Reconciler<F = LocalFilesystem> {
    filesystem: F,
}

struct Pass<'a> {
    source_root: &'a Path,
    destination_root: &'a Path,
    destination: &'a TreeListing,
    shutdown: &'a ShutdownSignal,
}

impl Pass<'_> {
    fn checkpoint(&self) -> Result<(), ReconcileError> {
        ensure!(!self.shutdown.is_requested(), InterruptedSnafu);
        Ok(())
    }
}

impl<F: FilesystemService> Reconciler<F> {
    pub fn new(filesystem: F) -> Self {
        Self { filesystem }
    }

    /// Runs one pass: enumerate both trees, classify, then apply creates,
    /// top-level copies and removals in that order.
    ///
    /// The shutdown signal is checked before every filesystem operation; once
    /// it is set the pass stops with [`ReconcileError::Interrupted`] and the
    /// destination keeps whatever was applied so far.
    pub async fn sync(
        &self,
        source_root: &Path,
        destination_root: &Path,
        shutdown: &ShutdownSignal,
    ) -> Result<ActionSet, ReconcileError> {
        let source = TreeListing::scan_following_links(source_root).context(ListSourceSnafu)?;
        let destination = TreeListing::scan(destination_root).context(ListDestinationSnafu)?;

        let actions = ActionSet::classify(&source, &destination);
        info!(
            "Classified {} created, {} copied and {} removed entries",
            actions.created().len(),
            actions.copied().len(),
            actions.removed().len()
        );

        let pass = Pass {
            source_root,
            destination_root,
            destination: &destination,
            shutdown,
        };
        let replaced = self.replace_kind_mismatches(&pass, &actions).await?;
        self.apply_creates(&pass, &actions).await?;
        self.apply_copies(&pass, &actions).await?;
        self.apply_removals(&pass, &actions, &replaced).await?;

        Ok(actions)
    }

    /// Copied entries that are a file on one side and a directory on the other
    /// are removed from the destination and recreated from the source before
    /// anything is created below them.
    async fn replace_kind_mismatches<'a>(
        &self,
        pass: &Pass<'_>,
        actions: &'a ActionSet,
    ) -> Result<HashSet<&'a str>, ReconcileError> {
        let mut replaced = HashSet::new();

        for entry in actions.copied() {
            if pass.destination.get(&entry.path) == Some(entry.kind) {
                continue;
            }
            pass.checkpoint()?;
            debug!("Replacing {} in destination", entry);

            let target = entry.path.resolve(pass.destination_root);
            self.filesystem
                .remove_entry_recursive(&target)
                .await
                .context(FilesystemSnafu)?;
            self.create(pass, entry).await?;
            replaced.insert(entry.path.as_str());
        }

        Ok(replaced)
    }

    async fn apply_creates(&self, pass: &Pass<'_>, actions: &ActionSet) -> Result<(), ReconcileError> {
        for entry in actions.created() {
            pass.checkpoint()?;
            self.create(pass, entry).await?;
        }
        Ok(())
    }

    async fn create(&self, pass: &Pass<'_>, entry: &TreeEntry) -> Result<(), ReconcileError> {
        let target = entry.path.resolve(pass.destination_root);
        let result = match entry.kind {
            EntryKind::Directory => self.filesystem.create_dir(&target).await,
            EntryKind::File => {
                let source = entry.path.resolve(pass.source_root);
                self.filesystem.copy_file_with_metadata(&source, &target).await
            }
        };
        result.context(FilesystemSnafu)
    }

    async fn apply_copies(&self, pass: &Pass<'_>, actions: &ActionSet) -> Result<(), ReconcileError> {
        for entry in actions.top_level_copied() {
            pass.checkpoint()?;
            let source = entry.path.resolve(pass.source_root);
            let target = entry.path.resolve(pass.destination_root);

            let result = match entry.kind {
                EntryKind::Directory => {
                    self.filesystem
                        .overwrite_directory_tree(&source, &target)
                        .await
                }
                EntryKind::File => {
                    self.filesystem
                        .copy_file_with_metadata(&source, &target)
                        .await
                }
            };
            result.context(FilesystemSnafu)?;
        }
        Ok(())
    }

    async fn apply_removals(
        &self,
        pass: &Pass<'_>,
        actions: &ActionSet,
        replaced: &HashSet<&str>,
    ) -> Result<(), ReconcileError> {
        for entry in actions.removed() {
            // Entries below a replaced path went away with it.
            if entry.path.ancestors().any(|ancestor| replaced.contains(ancestor)) {
                debug!("{} was removed along with a replaced ancestor", entry.path);
                continue;
            }

            pass.checkpoint()?;
            let target = entry.path.resolve(pass.destination_root);

            let result = match entry.kind {
                EntryKind::Directory => self.filesystem.remove_dir(&target).await,
                EntryKind::File => self.filesystem.remove_file(&target).await,
            };
            result.context(FilesystemSnafu)?;
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ReconcileError {
    #[snafu(display("Failed to enumerate the source tree"))]
    ListSourceError { source: ListingError },
    #[snafu(display("Failed to enumerate the destination tree"))]
    ListDestinationError { source: ListingError },
    #[snafu(display("Failed to apply a filesystem operation"))]
    FilesystemError { source: FilesystemError },
    #[snafu(display("Synchronization pass was interrupted by a shutdown request"))]
    Interrupted,
}
