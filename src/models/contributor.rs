//! Contributor and contribution record structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::table::{Row, TableRecord};

/// One (contributor, repository) pairing captured at fetch time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContributionRecord {
    /// Owner-qualified repository name
    pub repository: String,

    pub contributions: u64,

    /// Repository star count when the record was captured
    #[serde(default)]
    pub repository_stars: u64,

    #[serde(default)]
    pub repository_language: String,
}

impl ContributionRecord {
    /// Lenient conversion from a stored JSON object.
    ///
    /// Missing or null fields fall back to defaults.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let count = |key: &str| {
            object.get(key).map_or(0, |v| {
                v.as_u64()
                    .or_else(|| v.as_str().map(crate::storage::table::coerce_int))
                    .unwrap_or(0)
            })
        };

        let repository = text("repository");
        if repository.is_empty() {
            return None;
        }
        Some(Self {
            repository,
            contributions: count("contributions"),
            repository_stars: count("repository_stars"),
            repository_language: text("repository_language"),
        })
    }
}

/// A contributor profile plus its per-repository contributions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contributor {
    pub id: u64,

    /// Login, unique and case-sensitive
    pub username: String,

    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub blog: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub twitter_username: String,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub public_gists: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default, rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub site_admin: bool,

    /// Sum of `repository_contributions[*].contributions` at capture time
    #[serde(default)]
    pub total_contributions: u64,

    #[serde(default)]
    pub repository_contributions: Vec<ContributionRecord>,
}

impl Contributor {
    /// Append a contribution record and update the running total.
    pub fn add_contribution(&mut self, record: ContributionRecord) {
        self.total_contributions += record.contributions;
        self.repository_contributions.push(record);
    }

    /// Whether any record names a repository containing `needle` (case-insensitive).
    pub fn contributed_to_matching(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.repository_contributions
            .iter()
            .any(|r| r.repository.to_lowercase().contains(&needle))
    }

    /// Record for one repository (case-insensitive name match).
    pub fn contribution_to(&self, full_name: &str) -> Option<&ContributionRecord> {
        self.repository_contributions
            .iter()
            .find(|r| r.repository.eq_ignore_ascii_case(full_name))
    }
}

impl TableRecord for Contributor {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "name",
        "company",
        "blog",
        "location",
        "email",
        "bio",
        "twitter_username",
        "public_repos",
        "public_gists",
        "followers",
        "following",
        "created_at",
        "updated_at",
        "html_url",
        "type",
        "site_admin",
        "total_contributions",
        "repository_contributions",
    ];

    fn from_row(row: &Row) -> Self {
        let repository_contributions = match row.json("repository_contributions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(ContributionRecord::from_value)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            id: row.int("id"),
            username: row.text("username"),
            name: row.text("name"),
            company: row.text("company"),
            blog: row.text("blog"),
            location: row.text("location"),
            email: row.text("email"),
            bio: row.text("bio"),
            twitter_username: row.text("twitter_username"),
            public_repos: row.int("public_repos"),
            public_gists: row.int("public_gists"),
            followers: row.int("followers"),
            following: row.int("following"),
            created_at: row.text("created_at"),
            updated_at: row.text("updated_at"),
            html_url: row.text("html_url"),
            account_type: row.text("type"),
            site_admin: row.flag("site_admin"),
            total_contributions: row.int("total_contributions"),
            repository_contributions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::{decode_table, encode_records};

    fn record(repo: &str, contributions: u64) -> ContributionRecord {
        ContributionRecord {
            repository: repo.into(),
            contributions,
            repository_stars: 10,
            repository_language: "Rust".into(),
        }
    }

    #[test]
    fn add_contribution_keeps_total_in_sync() {
        let mut c = Contributor {
            username: "octo".into(),
            ..Contributor::default()
        };
        c.add_contribution(record("a/one", 5));
        c.add_contribution(record("b/two", 7));
        assert_eq!(c.total_contributions, 12);
        assert_eq!(c.repository_contributions.len(), 2);
        assert!(c.contributed_to_matching("B/TW"));
        assert!(c.contribution_to("A/ONE").is_some());
    }

    #[test]
    fn table_round_trip_with_records() {
        let mut c = Contributor {
            id: 9,
            username: "Octo".into(),
            location: "Berlin".into(),
            account_type: "User".into(),
            followers: 31,
            ..Contributor::default()
        };
        c.add_contribution(record("a/one", 5));

        let bytes = encode_records(&[c.clone()], Some(Contributor::COLUMNS), true).unwrap();
        let table = decode_table(&bytes).unwrap();
        assert!(table.headers.contains(&"type".to_string()));
        let loaded: Vec<Contributor> = table.records();
        assert_eq!(loaded, vec![c]);
    }

    #[test]
    fn lenient_record_parsing() {
        let value = serde_json::json!({
            "repository": "a/one",
            "contributions": "12",
            "repository_stars": null
        });
        let parsed = ContributionRecord::from_value(&value).unwrap();
        assert_eq!(parsed.contributions, 12);
        assert_eq!(parsed.repository_stars, 0);
        assert_eq!(parsed.repository_language, "");

        assert!(ContributionRecord::from_value(&serde_json::json!({"contributions": 1})).is_none());
        assert!(ContributionRecord::from_value(&serde_json::json!(3)).is_none());
    }
}
