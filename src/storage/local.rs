//! Local filesystem storage implementation.
//!
//! All keys are file names relative to the storage root. Whole-file writes
//! go through a temporary file and a rename so readers never observe a
//! half-written table or checkpoint; appends extend the file in place.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::table::{Table, TableRecord, decode_table, encode_records};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Whether a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(key)).await?)
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Append bytes, creating the file if needed.
    pub async fn append_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// File names directly under the root, `None` if the root is missing.
    pub async fn list_files(&self) -> Result<Option<Vec<String>>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Some(names))
    }

    /// Overwrite a table with the given records.
    pub async fn write_table<T: Serialize>(
        &self,
        key: &str,
        records: &[T],
        columns: &[&str],
    ) -> Result<()> {
        let bytes = encode_records(records, Some(columns), true)?;
        self.write_bytes(key, &bytes).await
    }

    /// Append records to a table, writing the header first if the file is new.
    pub async fn append_table<T: Serialize>(
        &self,
        key: &str,
        records: &[T],
        columns: &[&str],
    ) -> Result<()> {
        let needs_header = match tokio::fs::metadata(self.path(key)).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(AppError::Io(e)),
        };
        let bytes = encode_records(records, Some(columns), needs_header)?;
        self.append_bytes(key, &bytes).await
    }

    /// Create an empty table (header only) unless it already exists.
    pub async fn ensure_table(&self, key: &str, columns: &[&str]) -> Result<()> {
        if self.exists(key).await? {
            return Ok(());
        }
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))?;
        self.write_bytes(key, &bytes).await
    }

    /// Read and decode a table.
    pub async fn read_table(&self, key: &str) -> Result<Option<Table>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(decode_table(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read a table as typed records.
    pub async fn read_records<T: TableRecord>(&self, key: &str) -> Result<Option<Vec<T>>> {
        Ok(self.read_table(key).await?.map(|table| table.records()))
    }
}
