//! Local staging area for uploads in flight.
//!
//! Every request gets its own slot directory under the staging root, so
//! concurrent uploads never share a path. Slots are removed when the request
//! finishes; anything left behind by a crash is removed by [`Staging::sweep`]
//! on the next start.

use std::path::{Path, PathBuf};

/// Name of the file the multipart body is streamed into before it is renamed.
const INCOMING_FILE: &str = ".incoming";

pub struct Staging {
    root: PathBuf,
}

/// Outcome of a startup sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Which exit path released a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The content reached the remote store.
    Published,
    /// The request failed somewhere after the slot was reserved.
    Failed,
}

/// One request's private staging directory.
///
/// Dropping a slot that was never released removes it synchronously, so a
/// cancelled request cannot leave files behind.
#[derive(Debug)]
pub struct StagingSlot {
    dir: PathBuf,
    released: bool,
}

impl Staging {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, std::io::Error> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove everything under the staging root. Errors are logged, never returned.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(dir = %self.root.display(), error = %e, "Failed to read staging directory");
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(dir = %self.root.display(), error = %e, "Failed to read staging directory");
                    break;
                }
            };

            let path = entry.path();
            let result = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
                _ => tokio::fs::remove_file(&path).await,
            };

            match result {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Cleaned up leftover staging entry");
                    report.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete staging entry");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Create a fresh slot for one request.
    pub async fn reserve(&self) -> Result<StagingSlot, std::io::Error> {
        let dir = self.root.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir(&dir).await?;
        Ok(StagingSlot {
            dir,
            released: false,
        })
    }
}

impl StagingSlot {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the raw request body is written.
    pub fn incoming_path(&self) -> PathBuf {
        self.dir.join(INCOMING_FILE)
    }

    pub fn staged_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Move the received body to its stamped name.
    pub async fn stage(&self, file_name: &str) -> Result<PathBuf, std::io::Error> {
        let staged = self.staged_path(file_name);
        tokio::fs::rename(self.incoming_path(), &staged).await?;
        Ok(staged)
    }

    /// Best-effort removal of the slot and whatever is still in it.
    pub async fn release(mut self, reason: Release) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::debug!(dir = %self.dir.display(), ?reason, "Released staging slot");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    ?reason,
                    error = %e,
                    "Failed to clean up staging slot"
                );
            }
        }
    }
}

impl Drop for StagingSlot {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!(dir = %self.dir.display(), "Removed abandoned staging slot");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove abandoned staging slot"
                );
            }
        }
    }
}
