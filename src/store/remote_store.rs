use crate::error::SnapshotError;
use crate::state::StateSnapshot;
use crate::store::{FileSnapshotStore, LoadFuture, SaveFuture, SnapshotStore};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Store that loads the published snapshot from object storage
///
/// The deployed site serves the snapshot from a public bucket, so the
/// previous state is whatever was last published there. Saving writes the
/// local file the deploy step uploads.
pub struct RemoteSnapshotStore {
    client: Client,
    url: String,
    local: FileSnapshotStore,
}

impl RemoteSnapshotStore {
    pub fn new(url: String, local: FileSnapshotStore, timeout: Duration) -> Result<Self, SnapshotError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnapshotError::Fetch(e.to_string()))?;

        Ok(Self { client, url, local })
    }

    async fn fetch(&self) -> Result<String, SnapshotError> {
        debug!("Fetching snapshot from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SnapshotError::Fetch(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SnapshotError::NotFound(self.url.clone()));
        }
        if !status.is_success() {
            return Err(SnapshotError::Fetch(format!(
                "{}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status")
            )));
        }

        response
            .text()
            .await
            .map_err(|e| SnapshotError::Fetch(format!("{}: {}", self.url, e)))
    }
}

impl SnapshotStore for RemoteSnapshotStore {
    fn load(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            let body = self.fetch().await?;
            let snapshot = StateSnapshot::from_json(&body)?;
            info!(
                "Loaded published snapshot with {} entries from {}",
                snapshot.len(),
                self.url
            );
            Ok(snapshot)
        })
    }

    fn save<'a>(&'a self, snapshot: &'a StateSnapshot) -> SaveFuture<'a> {
        self.local.save(snapshot)
    }
}
