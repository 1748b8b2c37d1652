//! Dead-letter sink for updates that exhausted redelivery.
//!
//! An append-only directory of quarantined update bodies, one file per
//! failure, named by ISO-8601 timestamp. The gateway never reads these back;
//! replay is an operator action.

use std::path::{Path, PathBuf};

use chrono::Utc;
use metrics::counter;
use tokio::fs;

#[derive(Clone)]
pub struct FailureStore {
    directory: PathBuf,
}

impl FailureStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist a failed update body verbatim as `<timestamp>.sparql`.
    pub async fn persist(&self, body: &str) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.directory).await?;

        let file_name = format!("{}.sparql", Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"));
        let path = self.directory.join(file_name);
        fs::write(&path, body).await?;

        counter!("failure_store_persisted_total").increment(1);
        tracing::info!(path = %path.display(), "persisted failed update");
        Ok(path)
    }
}
