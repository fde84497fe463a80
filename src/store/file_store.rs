use crate::error::SnapshotError;
use crate::state::StateSnapshot;
use crate::store::{LoadFuture, SaveFuture, SnapshotStore};
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Snapshot store backed by a pretty-printed JSON file
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the snapshot is written to before it replaces the original
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write(&self, snapshot: &StateSnapshot) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = snapshot.to_json_pretty()?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &self.path).await
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            let json = match tokio::fs::read_to_string(&self.path).await {
                Ok(json) => json,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(SnapshotError::NotFound(self.path.display().to_string()));
                }
                Err(e) => return Err(SnapshotError::IoError(e)),
            };

            let snapshot = StateSnapshot::from_json(&json)?;
            debug!(
                "Loaded snapshot with {} entries from {}",
                snapshot.len(),
                self.path.display()
            );
            Ok(snapshot)
        })
    }

    fn save<'a>(&'a self, snapshot: &'a StateSnapshot) -> SaveFuture<'a> {
        Box::pin(async move {
            self.write(snapshot)
                .await
                .map_err(|e| SnapshotError::Write(format!("{}: {}", self.path.display(), e)))?;
            info!(
                "Saved snapshot with {} entries to {}",
                snapshot.len(),
                self.path.display()
            );
            Ok(())
        })
    }
}
