//! Dashboard aggregates over one snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{Contributor, Repository};

/// Entries kept by every top-N breakdown.
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryStars {
    pub name: String,
    pub full_name: String,
    pub stars: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorFollowers {
    pub username: String,
    pub name: String,
    pub followers: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_repositories: usize,
    pub total_contributors: usize,
    pub top_languages: Vec<NameCount>,
    pub top_topics: Vec<NameCount>,
    pub repositories_by_stars: Vec<RepositoryStars>,
    pub contributors_by_followers: Vec<ContributorFollowers>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendedStats {
    #[serde(flatten)]
    pub base: DashboardStats,
    pub activity_timeline: Vec<DateCount>,
    pub size_distribution: Vec<CategoryCount>,
    pub top_companies: Vec<NameCount>,
}

/// Repository size band in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBand {
    Small,
    Medium,
    Large,
    VeryLarge,
}

impl SizeBand {
    pub const ALL: [SizeBand; 4] = [
        SizeBand::Small,
        SizeBand::Medium,
        SizeBand::Large,
        SizeBand::VeryLarge,
    ];

    pub fn from_kilobytes(size_kb: u64) -> Self {
        let size_mb = size_kb as f64 / 1024.0;
        if size_mb < 1.0 {
            SizeBand::Small
        } else if size_mb < 10.0 {
            SizeBand::Medium
        } else if size_mb < 100.0 {
            SizeBand::Large
        } else {
            SizeBand::VeryLarge
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeBand::Small => "Small (<1MB)",
            SizeBand::Medium => "Medium (1-10MB)",
            SizeBand::Large => "Large (10-100MB)",
            SizeBand::VeryLarge => "Very Large (>100MB)",
        }
    }
}

/// Contributor appearing in several repositories.
#[derive(Debug, Clone, Serialize)]
pub struct MultiRepoContributor {
    pub username: String,
    pub name: String,
    pub repositories: Vec<String>,
    pub repository_count: usize,
    pub total_contributions: u64,
    pub followers: u64,
    pub location: String,
    pub company: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationMember {
    pub username: String,
    pub name: String,
    pub followers: u64,
    pub contributions: u64,
    pub repositories: Vec<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationGroup {
    pub location: String,
    pub count: usize,
    pub contributors: Vec<LocationMember>,
}

/// Whether a free-text field is blank or a textual null.
fn is_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("null") || value.eq_ignore_ascii_case("none")
}

/// Collapse blank and null-like locations into `Unknown`.
pub fn normalize_location(raw: &str) -> String {
    if is_blank(raw) {
        "Unknown".to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Count values and keep the `n` most frequent; equal counts keep first-seen order.
pub fn top_counts<I, S>(values: I, n: usize) -> Vec<NameCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<NameCount> = Vec::new();

    for value in values {
        let value = value.as_ref();
        match index.get(value) {
            Some(&idx) => counts[idx].count += 1,
            None => {
                index.insert(value.to_string(), counts.len());
                counts.push(NameCount {
                    name: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

pub fn dashboard_stats(repositories: &[Repository], contributors: &[Contributor]) -> DashboardStats {
    let total_repositories = repositories.iter().map(|r| r.id).collect::<HashSet<_>>().len();
    let total_contributors = contributors
        .iter()
        .map(|c| c.username.as_str())
        .collect::<HashSet<_>>()
        .len();

    let top_languages = top_counts(
        repositories
            .iter()
            .map(|r| r.language.as_str())
            .filter(|lang| !lang.is_empty()),
        TOP_N,
    );
    let top_topics = top_counts(
        repositories.iter().flat_map(|r| r.topics.iter()),
        TOP_N,
    );

    let mut by_stars: Vec<&Repository> = repositories.iter().collect();
    by_stars.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    let repositories_by_stars = by_stars
        .into_iter()
        .take(TOP_N)
        .map(|r| RepositoryStars {
            name: r.name.clone(),
            full_name: r.full_name.clone(),
            stars: r.stargazers_count,
        })
        .collect();

    let mut by_followers: Vec<&Contributor> = contributors.iter().collect();
    by_followers.sort_by(|a, b| b.followers.cmp(&a.followers));
    let contributors_by_followers = by_followers
        .into_iter()
        .take(TOP_N)
        .map(|c| ContributorFollowers {
            username: c.username.clone(),
            name: c.name.clone(),
            followers: c.followers,
        })
        .collect();

    DashboardStats {
        total_repositories,
        total_contributors,
        top_languages,
        top_topics,
        repositories_by_stars,
        contributors_by_followers,
    }
}

pub fn extended_stats(repositories: &[Repository], contributors: &[Contributor]) -> ExtendedStats {
    ExtendedStats {
        base: dashboard_stats(repositories, contributors),
        activity_timeline: activity_timeline(repositories),
        size_distribution: size_distribution(repositories),
        top_companies: top_companies(contributors),
    }
}

/// `YYYY-MM` bucket of a timestamp, `None` when unparsable.
fn month_of(timestamp: &str) -> Option<String> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.format("%Y-%m").to_string());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, format) {
            return Some(dt.format("%Y-%m").to_string());
        }
    }
    NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m").to_string())
}

/// Repositories created per month, ascending.
pub fn activity_timeline(repositories: &[Repository]) -> Vec<DateCount> {
    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for repo in repositories {
        if let Some(month) = month_of(&repo.created_at) {
            *months.entry(month).or_default() += 1;
        }
    }
    months
        .into_iter()
        .map(|(date, count)| DateCount { date, count })
        .collect()
}

/// Repository counts per size band, every band present.
pub fn size_distribution(repositories: &[Repository]) -> Vec<CategoryCount> {
    SizeBand::ALL
        .into_iter()
        .map(|band| CategoryCount {
            category: band.label().to_string(),
            count: repositories
                .iter()
                .filter(|r| SizeBand::from_kilobytes(r.size) == band)
                .count(),
        })
        .collect()
}

/// Most common companies; each username counts once per company.
pub fn top_companies(contributors: &[Contributor]) -> Vec<NameCount> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    top_counts(
        contributors
            .iter()
            .map(|c| (c.company.trim(), c.username.as_str()))
            .filter(|(company, _)| !is_blank(company))
            .filter(|&pair| seen.insert(pair))
            .map(|(company, _)| company),
        TOP_N,
    )
}

/// Contributors whose distinct repository count is at least `min_repos`.
pub fn multi_repo_contributors(
    contributors: &[Contributor],
    min_repos: usize,
) -> Vec<MultiRepoContributor> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<MultiRepoContributor> = Vec::new();

    for contributor in contributors {
        if contributor.username.is_empty() {
            continue;
        }
        let idx = *index.entry(contributor.username.as_str()).or_insert_with(|| {
            grouped.push(MultiRepoContributor {
                username: contributor.username.clone(),
                name: contributor.name.clone(),
                repositories: Vec::new(),
                repository_count: 0,
                total_contributions: 0,
                followers: contributor.followers,
                location: normalize_location(&contributor.location),
                company: contributor.company.clone(),
                html_url: contributor.html_url.clone(),
            });
            grouped.len() - 1
        });

        let entry = &mut grouped[idx];
        for record in &contributor.repository_contributions {
            if !entry.repositories.contains(&record.repository) {
                entry.repositories.push(record.repository.clone());
            }
            entry.total_contributions += record.contributions;
        }
    }

    let mut result: Vec<MultiRepoContributor> = grouped
        .into_iter()
        .map(|mut c| {
            c.repository_count = c.repositories.len();
            c
        })
        .filter(|c| c.repository_count >= min_repos)
        .collect();
    result.sort_by(|a, b| b.repository_count.cmp(&a.repository_count));
    result
}

/// Contributors bucketed by normalized location, largest bucket first.
pub fn contributors_by_location(contributors: &[Contributor]) -> Vec<LocationGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<LocationGroup> = Vec::new();

    for contributor in contributors {
        let location = normalize_location(&contributor.location);
        let idx = match index.get(&location) {
            Some(&idx) => idx,
            None => {
                index.insert(location.clone(), groups.len());
                groups.push(LocationGroup {
                    location,
                    count: 0,
                    contributors: Vec::new(),
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[idx];
        if group
            .contributors
            .iter()
            .any(|m| m.username == contributor.username)
        {
            continue;
        }
        group.count += 1;
        group.contributors.push(LocationMember {
            username: contributor.username.clone(),
            name: contributor.name.clone(),
            followers: contributor.followers,
            contributions: contributor.total_contributions,
            repositories: contributor
                .repository_contributions
                .iter()
                .map(|r| r.repository.clone())
                .collect(),
            html_url: contributor.html_url.clone(),
        });
    }

    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContributionRecord;

    fn repo(id: u64, language: &str, topics: &[&str], created_at: &str, size: u64) -> Repository {
        Repository {
            id,
            name: format!("r{id}"),
            full_name: format!("acme/r{id}"),
            stargazers_count: id * 10,
            language: language.into(),
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
            created_at: created_at.into(),
            size,
            ..Repository::default()
        }
    }

    fn contributor(username: &str, location: &str, repos: &[&str]) -> Contributor {
        let mut c = Contributor {
            username: username.into(),
            location: location.into(),
            ..Contributor::default()
        };
        for r in repos {
            c.add_contribution(ContributionRecord {
                repository: (*r).into(),
                contributions: 2,
                ..ContributionRecord::default()
            });
        }
        c
    }

    #[test]
    fn top_counts_ties_keep_first_seen_order() {
        let counts = top_counts(["go", "rust", "python", "rust", "go", "c"], 3);
        assert_eq!(
            counts,
            vec![
                NameCount { name: "go".into(), count: 2 },
                NameCount { name: "rust".into(), count: 2 },
                NameCount { name: "python".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn dashboard_totals_and_tops() {
        let repos = vec![
            repo(1, "Python", &["etl", "airflow"], "", 0),
            repo(2, "", &["etl"], "", 0),
            repo(3, "Python", &[], "", 0),
            repo(3, "Python", &[], "", 0),
        ];
        let contributors = vec![contributor("a", "", &[]), contributor("b", "", &[])];

        let stats = dashboard_stats(&repos, &contributors);
        assert_eq!(stats.total_repositories, 3);
        assert_eq!(stats.total_contributors, 2);
        assert_eq!(stats.top_languages[0], NameCount { name: "Python".into(), count: 3 });
        assert_eq!(stats.top_languages.len(), 1);
        assert_eq!(stats.top_topics[0], NameCount { name: "etl".into(), count: 2 });
        assert_eq!(stats.repositories_by_stars[0].stars, 30);
    }

    #[test]
    fn malformed_size_is_small() {
        let row = crate::storage::Row::from_pairs([("id", "1"), ("size", "abc")]);
        let parsed = <Repository as crate::storage::TableRecord>::from_row(&row);
        let bands = size_distribution(&[parsed]);
        assert_eq!(bands[0], CategoryCount { category: "Small (<1MB)".into(), count: 1 });
        assert!(bands[1..].iter().all(|b| b.count == 0));
    }

    #[test]
    fn size_band_edges() {
        assert_eq!(SizeBand::from_kilobytes(1023), SizeBand::Small);
        assert_eq!(SizeBand::from_kilobytes(1024), SizeBand::Medium);
        assert_eq!(SizeBand::from_kilobytes(10 * 1024), SizeBand::Large);
        assert_eq!(SizeBand::from_kilobytes(100 * 1024), SizeBand::VeryLarge);
    }

    #[test]
    fn timeline_is_ascending_and_skips_bad_dates() {
        let repos = vec![
            repo(1, "", &[], "2021-03-04T10:00:00Z", 0),
            repo(2, "", &[], "2020-12-01T00:00:00Z", 0),
            repo(3, "", &[], "2021-03-30T23:59:59+02:00", 0),
            repo(4, "", &[], "yesterday", 0),
            repo(5, "", &[], "", 0),
            repo(6, "", &[], "2019-07-15", 0),
            repo(7, "", &[], "2019-07-04 10:00:00", 0),
        ];
        let timeline = activity_timeline(&repos);
        let dates: Vec<(&str, usize)> = timeline.iter().map(|d| (d.date.as_str(), d.count)).collect();
        assert_eq!(dates, vec![("2019-07", 2), ("2020-12", 1), ("2021-03", 2)]);
    }

    #[test]
    fn multi_repo_selects_by_distinct_count() {
        let contributors = vec![
            contributor("c2", "", &["x/one"]),
            contributor("c1", "", &["x/one", "x/two", "x/three", "x/two"]),
        ];
        let multi = multi_repo_contributors(&contributors, 2);
        assert_eq!(multi.len(), 1);
        assert_eq!(multi[0].username, "c1");
        assert_eq!(multi[0].repository_count, 3);
        assert_eq!(multi[0].total_contributions, 8);
    }

    #[test]
    fn location_normalization_and_dedup() {
        assert_eq!(normalize_location("  "), "Unknown");
        assert_eq!(normalize_location("NULL"), "Unknown");
        assert_eq!(normalize_location("None"), "Unknown");
        assert_eq!(normalize_location("Berlin"), "Berlin");

        let contributors = vec![
            contributor("a", "Berlin", &["x/1"]),
            contributor("b", "null", &[]),
            contributor("c", "", &[]),
            contributor("a", "Berlin", &["x/2"]),
            contributor("d", "None", &[]),
        ];
        let groups = contributors_by_location(&contributors);
        assert_eq!(groups[0].location, "Unknown");
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[1].location, "Berlin");
        assert_eq!(groups[1].count, 1);
    }

    #[test]
    fn companies_exclude_blank() {
        let mut a = contributor("a", "", &[]);
        a.company = "Acme".into();
        let mut b = contributor("b", "", &[]);
        b.company = "none".into();
        let mut c = contributor("c", "", &[]);
        c.company = "Acme".into();
        let companies = top_companies(&[a, b, c, contributor("d", "", &[])]);
        assert_eq!(companies, vec![NameCount { name: "Acme".into(), count: 2 }]);
    }

    #[test]
    fn companies_count_each_username_once() {
        let rows: Vec<Contributor> = [("alice", "Acme"), ("alice", "Acme"), ("bob", "Acme")]
            .into_iter()
            .map(|(username, company)| {
                let mut c = contributor(username, company, &[]);
                c.company = company.into();
                c
            })
            .collect();

        let companies = top_companies(&rows);
        let locations = contributors_by_location(&rows);
        assert_eq!(companies, vec![NameCount { name: "Acme".into(), count: 2 }]);
        assert_eq!(locations[0].count, companies[0].count);
    }
}
