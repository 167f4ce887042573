//! Durable checkpoint file.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{CHECKPOINT_SCHEMA_VERSION, Checkpoint};
use crate::storage::LocalStorage;

/// Reads and writes the crawler checkpoint as versioned JSON.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    storage: LocalStorage,
    file_name: String,
}

impl CheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::config(format!("Invalid checkpoint path: {path:?}")))?;
        let parent = path.parent().unwrap_or_else(|| Path::new(""));

        Ok(Self {
            storage: LocalStorage::new(parent),
            file_name,
        })
    }

    /// Full path of the checkpoint file.
    pub fn path(&self) -> std::path::PathBuf {
        self.storage.path(&self.file_name)
    }

    /// Load the checkpoint.
    ///
    /// Returns `None` when no file exists or its schema version differs, in
    /// which case the caller starts a fresh run.
    pub async fn load(&self) -> Result<Option<Checkpoint>> {
        let Some(value) = self
            .storage
            .read_json::<serde_json::Value>(&self.file_name)
            .await?
        else {
            return Ok(None);
        };

        let version = value.get("schema_version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(CHECKPOINT_SCHEMA_VERSION)) {
            log::warn!(
                "Ignoring checkpoint {:?}: schema version {:?}, expected {}. Starting fresh.",
                self.path(),
                version,
                CHECKPOINT_SCHEMA_VERSION
            );
            return Ok(None);
        }

        let checkpoint: Checkpoint = serde_json::from_value(value)
            .map_err(|e| AppError::checkpoint(format!("{:?}: {e}", self.path())))?;
        log::info!(
            "Loaded checkpoint {} (repo index {}, {} repos, {} contributions)",
            checkpoint.timestamp,
            checkpoint.last_processed_repo_index,
            checkpoint.processed_repos.len(),
            checkpoint.processed_contributors.len()
        );
        Ok(Some(checkpoint))
    }

    /// Persist the checkpoint atomically.
    pub async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.touch();
        self.storage.write_json(&self.file_name, checkpoint).await?;
        log::debug!(
            "Checkpoint saved at repo index {}",
            checkpoint.last_processed_repo_index
        );
        Ok(())
    }
}
