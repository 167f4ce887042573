//! Repository data structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::table::{Row, TableRecord};

/// A repository captured from search results or the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    /// Stable numeric identifier, unique within a snapshot
    pub id: u64,

    /// Short name
    pub name: String,

    /// Owner-qualified name (`owner/name`)
    pub full_name: String,

    pub html_url: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub updated_at: String,

    #[serde(default)]
    pub pushed_at: String,

    #[serde(default)]
    pub homepage: String,

    /// Size in kilobytes
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub stargazers_count: u64,

    #[serde(default)]
    pub watchers_count: u64,

    #[serde(default)]
    pub forks_count: u64,

    #[serde(default)]
    pub open_issues_count: u64,

    /// Primary language
    #[serde(default)]
    pub language: String,

    #[serde(default)]
    pub license: String,

    #[serde(default)]
    pub topics: Vec<String>,

    /// Language name to byte count
    #[serde(default)]
    pub languages: BTreeMap<String, u64>,

    #[serde(default)]
    pub default_branch: String,

    #[serde(default)]
    pub visibility: String,

    #[serde(default)]
    pub archived: bool,

    /// Search keyword that first produced this repository
    #[serde(default)]
    pub matched_keyword: String,
}

impl TableRecord for Repository {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "full_name",
        "html_url",
        "description",
        "created_at",
        "updated_at",
        "pushed_at",
        "homepage",
        "size",
        "stargazers_count",
        "watchers_count",
        "forks_count",
        "open_issues_count",
        "language",
        "license",
        "topics",
        "languages",
        "default_branch",
        "visibility",
        "archived",
        "matched_keyword",
    ];

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("id"),
            name: row.text("name"),
            full_name: row.text("full_name"),
            html_url: row.text("html_url"),
            description: row.text("description"),
            created_at: row.text("created_at"),
            updated_at: row.text("updated_at"),
            pushed_at: row.text("pushed_at"),
            homepage: row.text("homepage"),
            size: row.int("size"),
            stargazers_count: row.int("stargazers_count"),
            watchers_count: row.int("watchers_count"),
            forks_count: row.int("forks_count"),
            open_issues_count: row.int("open_issues_count"),
            language: row.text("language"),
            license: row.text("license"),
            topics: row.list("topics"),
            languages: row.counts("languages"),
            default_branch: row.text("default_branch"),
            visibility: row.text("visibility"),
            archived: row.flag("archived"),
            matched_keyword: row.text("matched_keyword"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::{decode_table, encode_records};

    #[test]
    fn table_round_trip() {
        let repo = Repository {
            id: 42,
            name: "flow".into(),
            full_name: "acme/flow".into(),
            description: "A, \"quoted\" description".into(),
            size: 2048,
            stargazers_count: 900,
            topics: vec!["etl".into(), "airflow".into()],
            languages: BTreeMap::from([("Python".into(), 10), ("Shell".into(), 2)]),
            archived: true,
            matched_keyword: "ETL".into(),
            ..Repository::default()
        };

        let bytes = encode_records(&[repo.clone()], Some(Repository::COLUMNS), true).unwrap();
        let table = decode_table(&bytes).unwrap();
        let loaded: Vec<Repository> = table.records();

        assert_eq!(loaded, vec![repo]);
    }

    #[test]
    fn malformed_cells_normalize() {
        let row = Row::from_pairs([
            ("id", "7"),
            ("name", "x"),
            ("size", "abc"),
            ("topics", "{broken"),
            ("language", "null"),
        ]);
        let repo = Repository::from_row(&row);
        assert_eq!(repo.id, 7);
        assert_eq!(repo.size, 0);
        assert!(repo.topics.is_empty());
        assert_eq!(repo.language, "");
    }
}
