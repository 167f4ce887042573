//! Crawler checkpoint: durable progress marker for resumable runs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bumped whenever the checkpoint layout changes incompatibly.
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// A `(contributor, repository)` pair already folded into the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContributionKey {
    pub username: String,
    pub repository: String,
}

impl ContributionKey {
    pub fn new(username: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            repository: repository.into(),
        }
    }
}

/// Progress of one crawl run, tied to its snapshot timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub schema_version: u32,

    /// Run timestamp shared with the snapshot files (`YYYYMMDD_HHMMSS`)
    pub timestamp: String,

    /// Index into the search results of the repository being processed
    pub last_processed_repo_index: usize,

    /// Repository ids fully processed
    pub processed_repos: BTreeSet<u64>,

    /// Contributor/repository pairs already aggregated
    pub processed_contributors: BTreeSet<ContributionKey>,

    /// Whether the search table for this run is complete
    #[serde(default)]
    pub search_complete: bool,

    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint for a new run.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            timestamp: timestamp.into(),
            last_processed_repo_index: 0,
            processed_repos: BTreeSet::new(),
            processed_contributors: BTreeSet::new(),
            search_complete: false,
            updated_at: Utc::now(),
        }
    }

    pub fn is_repo_processed(&self, id: u64) -> bool {
        self.processed_repos.contains(&id)
    }

    pub fn mark_repo_processed(&mut self, id: u64) {
        self.processed_repos.insert(id);
    }

    pub fn is_contribution_processed(&self, key: &ContributionKey) -> bool {
        self.processed_contributors.contains(key)
    }

    pub fn mark_contribution_processed(&mut self, key: ContributionKey) {
        self.processed_contributors.insert(key);
    }

    /// Refresh the modification time before persisting.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_layout_is_explicit() {
        let mut checkpoint = Checkpoint::new("20250101_120000");
        checkpoint.mark_repo_processed(12);
        checkpoint.mark_contribution_processed(ContributionKey::new("octo", "a/b"));

        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["schema_version"], CHECKPOINT_SCHEMA_VERSION);
        assert_eq!(value["processed_repos"], serde_json::json!([12]));
        assert_eq!(
            value["processed_contributors"],
            serde_json::json!([{"username": "octo", "repository": "a/b"}])
        );

        let back: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(back, checkpoint);
    }

    #[test]
    fn pairs_are_distinct_per_repository() {
        let mut checkpoint = Checkpoint::new("20250101_120000");
        checkpoint.mark_contribution_processed(ContributionKey::new("octo", "a/b"));
        assert!(checkpoint.is_contribution_processed(&ContributionKey::new("octo", "a/b")));
        assert!(!checkpoint.is_contribution_processed(&ContributionKey::new("octo", "a/c")));
        assert!(!checkpoint.is_contribution_processed(&ContributionKey::new("Octo", "a/b")));
    }
}
