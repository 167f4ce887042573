//! Read side: loads the latest snapshot and answers dashboard queries.
//!
//! Every query reads the files again, so a crawl finishing in the background
//! becomes visible on the next request. Nothing here writes to storage.

pub mod filter;
pub mod stats;
pub mod views;

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Contributor, Repository};
use crate::storage::snapshot::parse_file_name;
use crate::storage::{LocalStorage, SnapshotFiles, TableKind, latest_timestamp};

pub use filter::{
    ContributorQuery, ContributorSort, Page, PageParams, PageRequest, RepositoryQuery,
    RepositorySort, SortOrder, filter_contributors, filter_repositories,
};
pub use stats::{DashboardStats, ExtendedStats, dashboard_stats, extended_stats};
pub use views::{ContributorView, RepositoryView, contributor_view, repository_view};

/// The three tables of one crawl run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub timestamp: String,
    /// Search results
    pub repositories: Vec<Repository>,
    /// Detail rows, the source for listings and stats
    pub repositories_detailed: Vec<Repository>,
    pub contributors: Vec<Contributor>,
}

/// Header row of one snapshot file.
#[derive(Debug, Clone, Serialize)]
pub struct FileHeaders {
    pub table: String,
    pub file: String,
    pub headers: Vec<String>,
    pub rows: usize,
    pub skipped_rows: usize,
}

/// Raw rows of one table, as stored.
#[derive(Debug, Clone, Serialize)]
pub struct TableSample {
    pub table: String,
    pub file: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Query service over a data directory.
#[derive(Debug, Clone)]
pub struct QueryService {
    storage: LocalStorage,
}

impl QueryService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: LocalStorage::new(data_dir),
        }
    }

    /// File names of the newest complete snapshot.
    pub async fn latest_files(&self) -> Result<SnapshotFiles> {
        let names = self
            .storage
            .list_files()
            .await?
            .ok_or_else(|| AppError::not_found("No data directory found"))?;
        let timestamp =
            latest_timestamp(&names).ok_or_else(|| AppError::not_found("No data files found"))?;
        let files = SnapshotFiles::new(timestamp);

        for kind in TableKind::ALL {
            if !names.contains(&files.key(kind)) {
                return Err(AppError::not_found(format!("{kind} data file not found")));
            }
        }
        Ok(files)
    }

    pub async fn latest_snapshot(&self) -> Result<Snapshot> {
        let files = self.latest_files().await?;
        Ok(Snapshot {
            repositories: self.records(&files, TableKind::Repositories).await?,
            repositories_detailed: self
                .records(&files, TableKind::RepositoriesDetailed)
                .await?,
            contributors: self.records(&files, TableKind::Contributors).await?,
            timestamp: files.timestamp,
        })
    }

    async fn records<T: crate::storage::TableRecord>(
        &self,
        files: &SnapshotFiles,
        kind: TableKind,
    ) -> Result<Vec<T>> {
        let key = files.key(kind);
        self.storage
            .read_records(&key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{kind} data file not found")))
    }

    /// Headers of every snapshot file in the data directory, newest first.
    pub async fn table_headers(&self) -> Result<Vec<FileHeaders>> {
        let names = self
            .storage
            .list_files()
            .await?
            .ok_or_else(|| AppError::not_found("No data directory found"))?;

        let mut snapshot_files: Vec<(String, TableKind, String)> = names
            .iter()
            .filter_map(|name| {
                parse_file_name(name).map(|(kind, ts)| (ts.to_string(), kind, name.clone()))
            })
            .collect();
        snapshot_files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.2.cmp(&b.2)));

        let mut result = Vec::with_capacity(snapshot_files.len());
        for (_, kind, file) in snapshot_files {
            if let Some(table) = self.storage.read_table(&file).await? {
                result.push(FileHeaders {
                    table: kind.to_string(),
                    file,
                    headers: table.headers,
                    rows: table.rows.len(),
                    skipped_rows: table.skipped,
                });
            }
        }
        Ok(result)
    }

    /// First `limit` raw rows of one table in the latest snapshot.
    pub async fn sample_rows(&self, kind: TableKind, limit: usize) -> Result<TableSample> {
        let files = self.latest_files().await?;
        let file = files.key(kind);
        let table = self
            .storage
            .read_table(&file)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{kind} data file not found")))?;

        Ok(TableSample {
            table: kind.to_string(),
            file,
            rows: table
                .rows
                .iter()
                .take(limit)
                .map(|row| row.values().to_vec())
                .collect(),
            headers: table.headers,
        })
    }
}
