//! Filesystem-driven bulk ingestion.

pub mod graph_cache;
pub mod migration;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use metrics::counter;
use tokio::fs;
use tokio::sync::watch;

pub use graph_cache::GraphNameCache;
pub use migration::{IngestOutcome, MigrationLoader};

use crate::config::MigrationConfig;
use crate::services::notification::{EventType, NotificationEmitter, NotificationEvent};

/// Subdirectory receiving successfully processed files.
pub const ARCHIVED_SUBDIR: &str = "archived";
/// Subdirectory receiving files whose ingestion terminally failed.
pub const FAILED_SUBDIR: &str = "failed";

/// Polls the migration directory and drives each file through the loader.
///
/// Files are processed in name-then-modification-time order, so a sidecar
/// declaration that sorts before its data file is cached before the data
/// file is read. Every file is moved out of the scan root after processing,
/// whether it succeeded or terminally failed.
pub struct MigrationWatcher {
    loader: Arc<MigrationLoader>,
    notifier: Arc<dyn NotificationEmitter>,
    config: MigrationConfig,
}

impl MigrationWatcher {
    pub fn new(
        loader: Arc<MigrationLoader>,
        notifier: Arc<dyn NotificationEmitter>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            loader,
            notifier,
            config,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("migration watcher shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.scan().await {
                        tracing::error!(error = %e, "migration scan failed");
                    }
                }
            }
        }
    }

    /// Scan the migration directory once. Returns the number of files
    /// processed (successfully or not).
    pub async fn scan(&self) -> std::io::Result<usize> {
        let directory = &self.config.directory;
        if !fs::try_exists(directory).await.unwrap_or(false) {
            return Ok(0);
        }

        let mut files = Vec::new();
        let mut entries = fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((name, modified, entry.path()));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let processed = files.len();
        for (name, _, path) in files {
            self.process_file(&name, &path).await;
        }
        Ok(processed)
    }

    async fn process_file(&self, name: &str, path: &Path) {
        tracing::info!(file = name, "receiving file, will execute migration to the triplestore");

        let payload = match fs::read(path).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(file = name, error = %e, "failed to read migration file");
                return;
            }
        };

        match self.loader.ingest(name, &payload).await {
            Ok(outcome) => {
                counter!("migration_files_total", "result" => "ok").increment(1);
                self.notify(name, &outcome);
                self.archive(name, path, ARCHIVED_SUBDIR).await;
            }
            Err(e) => {
                counter!("migration_files_total", "result" => "error").increment(1);
                tracing::error!(file = name, error = %e, "migration failed");
                self.archive(name, path, FAILED_SUBDIR).await;
            }
        }
    }

    fn notify(&self, file_name: &str, outcome: &IngestOutcome) {
        let correlation_id = match outcome {
            IngestOutcome::SidecarCached => return,
            IngestOutcome::ScriptExecuted { correlation_id }
            | IngestOutcome::GraphLoaded { correlation_id, .. } => *correlation_id,
        };
        let event = NotificationEvent {
            event_type: EventType::SyncFileTriplestore,
            title: format!("'{file_name}' has been executed to the triplestore"),
            correlation_id: correlation_id.to_string(),
        };
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move { notifier.emit(event).await });
    }

    async fn archive(&self, name: &str, path: &Path, subdir: &str) {
        let target_dir: PathBuf = self.config.directory.join(subdir);
        let result = async {
            fs::create_dir_all(&target_dir).await?;
            fs::rename(path, target_dir.join(name)).await
        }
        .await;
        if let Err(e) = result {
            tracing::error!(file = name, error = %e, "failed to archive migration file");
        }
    }
}
