//! Filtering, sorting and pagination over snapshot records.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Contributor, Repository};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositorySort {
    #[default]
    Stars,
    Forks,
    Issues,
    Watchers,
    Size,
    Name,
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributorSort {
    #[default]
    Contributions,
    Followers,
    Repositories,
    PublicRepos,
    Username,
}

/// Validated page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: usize = 100;
    pub const MAX_PER_PAGE: usize = 1000;

    pub fn new(page: Option<usize>, per_page: Option<usize>) -> Result<Self> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(Self::DEFAULT_PER_PAGE);
        if page == 0 {
            return Err(AppError::validation("page must be >= 1"));
        }
        if per_page == 0 || per_page > Self::MAX_PER_PAGE {
            return Err(AppError::validation(format!(
                "per_page must be between 1 and {}",
                Self::MAX_PER_PAGE
            )));
        }
        Ok(Self { page, per_page })
    }

    /// Cut one page out of the full result list.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let start = (self.page - 1).saturating_mul(self.per_page);
        let items: Vec<T> = items.into_iter().skip(start).take(self.per_page).collect();
        Page {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
            total_pages: total.div_ceil(self.per_page),
        }
    }
}

/// One page of results with totals.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// Page parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    #[serde(alias = "limit")]
    pub per_page: Option<usize>,
}

impl PageParams {
    pub fn request(&self) -> Result<PageRequest> {
        PageRequest::new(self.page, self.per_page)
    }
}

/// Repository listing parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryQuery {
    /// Substring of name, description or matched keyword
    pub keyword: Option<String>,
    /// Exact language, case-insensitive
    pub language: Option<String>,
    pub min_stars: Option<u64>,
    #[serde(default)]
    pub sort: RepositorySort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<usize>,
    #[serde(alias = "limit")]
    pub per_page: Option<usize>,
}

impl RepositoryQuery {
    fn matches(&self, repo: &Repository, keyword: Option<&str>, language: Option<&str>) -> bool {
        if let Some(keyword) = keyword {
            let hit = [&repo.name, &repo.description, &repo.matched_keyword]
                .iter()
                .any(|field| field.to_lowercase().contains(keyword));
            if !hit {
                return false;
            }
        }
        if let Some(language) = language {
            if repo.language.to_lowercase() != language {
                return false;
            }
        }
        self.min_stars
            .is_none_or(|min| repo.stargazers_count >= min)
    }
}

/// Contributor listing parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributorQuery {
    /// Substring of the username
    pub username: Option<String>,
    /// Substring of any contributed repository name
    pub repository: Option<String>,
    pub min_contributions: Option<u64>,
    pub min_followers: Option<u64>,
    #[serde(default)]
    pub sort: ContributorSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<usize>,
    #[serde(alias = "limit")]
    pub per_page: Option<usize>,
}

impl ContributorQuery {
    fn matches(&self, contributor: &Contributor, username: Option<&str>) -> bool {
        if let Some(username) = username {
            if !contributor.username.to_lowercase().contains(username) {
                return false;
            }
        }
        if let Some(repository) = non_blank(&self.repository) {
            if !contributor.contributed_to_matching(repository) {
                return false;
            }
        }
        self.min_contributions
            .is_none_or(|min| contributor.total_contributions >= min)
            && self
                .min_followers
                .is_none_or(|min| contributor.followers >= min)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn lowered(value: &Option<String>) -> Option<String> {
    non_blank(value).map(str::to_lowercase)
}

fn compare_repositories(a: &Repository, b: &Repository, sort: RepositorySort) -> Ordering {
    match sort {
        RepositorySort::Stars => a.stargazers_count.cmp(&b.stargazers_count),
        RepositorySort::Forks => a.forks_count.cmp(&b.forks_count),
        RepositorySort::Issues => a.open_issues_count.cmp(&b.open_issues_count),
        RepositorySort::Watchers => a.watchers_count.cmp(&b.watchers_count),
        RepositorySort::Size => a.size.cmp(&b.size),
        RepositorySort::Name => a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()),
        RepositorySort::Created => a.created_at.cmp(&b.created_at),
        RepositorySort::Updated => a.updated_at.cmp(&b.updated_at),
    }
}

fn compare_contributors(a: &Contributor, b: &Contributor, sort: ContributorSort) -> Ordering {
    match sort {
        ContributorSort::Contributions => a.total_contributions.cmp(&b.total_contributions),
        ContributorSort::Followers => a.followers.cmp(&b.followers),
        ContributorSort::Repositories => a
            .repository_contributions
            .len()
            .cmp(&b.repository_contributions.len()),
        ContributorSort::PublicRepos => a.public_repos.cmp(&b.public_repos),
        ContributorSort::Username => a.username.to_lowercase().cmp(&b.username.to_lowercase()),
    }
}

/// Filter, sort and paginate repositories. Ties keep file order.
pub fn filter_repositories(
    repositories: &[Repository],
    query: &RepositoryQuery,
) -> Result<Page<Repository>> {
    let page = PageRequest::new(query.page, query.per_page)?;
    let keyword = lowered(&query.keyword);
    let language = lowered(&query.language);

    let mut matched: Vec<Repository> = repositories
        .iter()
        .filter(|repo| query.matches(repo, keyword.as_deref(), language.as_deref()))
        .cloned()
        .collect();
    matched.sort_by(|a, b| query.order.apply(compare_repositories(a, b, query.sort)));

    Ok(page.apply(matched))
}

/// Filter, sort and paginate contributors. Ties keep file order.
pub fn filter_contributors(
    contributors: &[Contributor],
    query: &ContributorQuery,
) -> Result<Page<Contributor>> {
    let page = PageRequest::new(query.page, query.per_page)?;
    let username = lowered(&query.username);

    let mut matched: Vec<Contributor> = contributors
        .iter()
        .filter(|c| query.matches(c, username.as_deref()))
        .cloned()
        .collect();
    matched.sort_by(|a, b| query.order.apply(compare_contributors(a, b, query.sort)));

    Ok(page.apply(matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContributionRecord;

    fn repo(id: u64, name: &str, stars: u64, language: &str) -> Repository {
        Repository {
            id,
            name: name.into(),
            full_name: format!("acme/{name}"),
            stargazers_count: stars,
            language: language.into(),
            ..Repository::default()
        }
    }

    fn contributor(username: &str, total: u64, followers: u64, repos: &[&str]) -> Contributor {
        let mut c = Contributor {
            username: username.into(),
            followers,
            ..Contributor::default()
        };
        for r in repos {
            c.add_contribution(ContributionRecord {
                repository: (*r).into(),
                contributions: total / repos.len().max(1) as u64,
                ..ContributionRecord::default()
            });
        }
        c.total_contributions = total;
        c
    }

    #[test]
    fn min_stars_filter_sorted_desc() {
        let repos = vec![
            repo(1, "a", 10, "Rust"),
            repo(2, "b", 500, "Rust"),
            repo(3, "c", 100, "Go"),
            repo(4, "d", 5, "Rust"),
        ];
        let query = RepositoryQuery {
            min_stars: Some(50),
            ..RepositoryQuery::default()
        };
        let page = filter_repositories(&repos, &query).unwrap();
        let ids: Vec<u64> = page.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn ties_keep_file_order() {
        let repos = vec![
            repo(1, "a", 10, ""),
            repo(2, "b", 20, ""),
            repo(3, "c", 10, ""),
            repo(4, "d", 20, ""),
        ];
        let desc = filter_repositories(&repos, &RepositoryQuery::default()).unwrap();
        let ids: Vec<u64> = desc.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);

        let asc = filter_repositories(
            &repos,
            &RepositoryQuery {
                order: SortOrder::Asc,
                ..RepositoryQuery::default()
            },
        )
        .unwrap();
        let ids: Vec<u64> = asc.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 2, 4]);
    }

    #[test]
    fn keyword_and_language_are_case_insensitive() {
        let mut tagged = repo(3, "other", 1, "python");
        tagged.matched_keyword = "Data Pipeline".into();
        let repos = vec![repo(1, "FlowKit", 5, "Python"), repo(2, "x", 9, "Pythonic"), tagged];

        let query = RepositoryQuery {
            language: Some("PYTHON".into()),
            ..RepositoryQuery::default()
        };
        let ids: Vec<u64> = filter_repositories(&repos, &query)
            .unwrap()
            .items
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        let query = RepositoryQuery {
            keyword: Some("pipeline".into()),
            ..RepositoryQuery::default()
        };
        let page = filter_repositories(&repos, &query).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, 3);
    }

    #[test]
    fn contributor_filters() {
        let contributors = vec![
            contributor("alice", 50, 10, &["acme/flow", "acme/kafka-tools"]),
            contributor("bob", 5, 100, &["other/flow"]),
            contributor("alina", 20, 1, &["acme/dbt"]),
        ];

        let query = ContributorQuery {
            username: Some("AL".into()),
            ..ContributorQuery::default()
        };
        let names: Vec<String> = filter_contributors(&contributors, &query)
            .unwrap()
            .items
            .into_iter()
            .map(|c| c.username)
            .collect();
        assert_eq!(names, vec!["alice", "alina"]);

        let query = ContributorQuery {
            repository: Some("KAFKA".into()),
            ..ContributorQuery::default()
        };
        assert_eq!(filter_contributors(&contributors, &query).unwrap().total, 1);

        let query = ContributorQuery {
            min_followers: Some(10),
            sort: ContributorSort::Followers,
            ..ContributorQuery::default()
        };
        let names: Vec<String> = filter_contributors(&contributors, &query)
            .unwrap()
            .items
            .into_iter()
            .map(|c| c.username)
            .collect();
        assert_eq!(names, vec!["bob", "alice"]);

        let query = ContributorQuery {
            min_contributions: Some(20),
            ..ContributorQuery::default()
        };
        assert_eq!(filter_contributors(&contributors, &query).unwrap().total, 2);
    }

    #[test]
    fn pagination() {
        let repos: Vec<Repository> = (1..=25).map(|i| repo(i, "r", 100 - i, "")).collect();
        let query = RepositoryQuery {
            page: Some(3),
            per_page: Some(10),
            ..RepositoryQuery::default()
        };
        let page = filter_repositories(&repos, &query).unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].id, 21);
        assert_eq!(page.total_pages, 3);

        let beyond = PageRequest::new(Some(9), Some(10)).unwrap().apply(repos);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 25);
    }

    #[test]
    fn invalid_page_parameters() {
        assert!(matches!(
            PageRequest::new(Some(0), None),
            Err(AppError::Validation(_))
        ));
        assert!(PageRequest::new(None, Some(0)).is_err());
        assert!(PageRequest::new(None, Some(1001)).is_err());
        assert_eq!(PageRequest::new(None, None).unwrap(), PageRequest::default());
    }
}
