//! Snapshot file naming and discovery.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Timestamp layout shared by snapshot files and checkpoints.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SNAPSHOT_FILE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(repositories_detailed|repositories|contributors)_(\d{8}_\d{6})\.csv$").ok()
});

/// Timestamp for a new crawl run, in local time.
pub fn new_run_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// The three tables that make up a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Repositories,
    RepositoriesDetailed,
    Contributors,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [
        TableKind::Repositories,
        TableKind::RepositoriesDetailed,
        TableKind::Contributors,
    ];

    /// File name prefix before the timestamp.
    pub fn prefix(self) -> &'static str {
        match self {
            TableKind::Repositories => "repositories",
            TableKind::RepositoriesDetailed => "repositories_detailed",
            TableKind::Contributors => "contributors",
        }
    }

    /// Parse the name used by the debug endpoints.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == name)
    }

    pub fn file_name(self, timestamp: &str) -> String {
        format!("{}_{timestamp}.csv", self.prefix())
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// File names of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFiles {
    pub timestamp: String,
}

impl SnapshotFiles {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
        }
    }

    /// Storage key of one table.
    pub fn key(&self, kind: TableKind) -> String {
        kind.file_name(&self.timestamp)
    }
}

/// Split a snapshot file name into its table and timestamp.
pub fn parse_file_name(name: &str) -> Option<(TableKind, &str)> {
    let caps = SNAPSHOT_FILE.as_ref()?.captures(name)?;
    let kind = TableKind::from_name(caps.get(1)?.as_str())?;
    Some((kind, caps.get(2)?.as_str()))
}

/// Largest snapshot timestamp among the given file names.
///
/// The result does not depend on the order the names were listed in.
pub fn latest_timestamp<I, S>(names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| parse_file_name(name.as_ref()).map(|(_, ts)| ts.to_string()))
        .max()
}
