//! Single repository and single contributor views.
//!
//! Contribution records stored on each contributor are the join between the
//! two tables. When a record carries no star count the current value from
//! the detailed repository table is used instead.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Contributor, Repository};
use crate::query::Snapshot;
use crate::query::filter::{Page, PageRequest};

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryContributor {
    pub username: String,
    pub name: String,
    pub contributions: u64,
    pub followers: u64,
    pub location: String,
    pub company: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryView {
    pub repository: Repository,
    pub contributors: Page<RepositoryContributor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContributionView {
    pub repository: String,
    pub contributions: u64,
    pub repository_stars: u64,
    pub repository_language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContributorView {
    pub contributor: Contributor,
    pub repositories: Page<ContributionView>,
}

/// Repository by owner-qualified name with its contributors, most active first.
pub fn repository_view(
    snapshot: &Snapshot,
    full_name: &str,
    page: PageRequest,
) -> Result<RepositoryView> {
    let repository = snapshot
        .repositories_detailed
        .iter()
        .chain(snapshot.repositories.iter())
        .find(|r| r.full_name.eq_ignore_ascii_case(full_name))
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("Repository {full_name} not found")))?;

    let mut contributors: Vec<RepositoryContributor> = snapshot
        .contributors
        .iter()
        .filter_map(|c| {
            let record = c.contribution_to(&repository.full_name)?;
            Some(RepositoryContributor {
                username: c.username.clone(),
                name: c.name.clone(),
                contributions: record.contributions,
                followers: c.followers,
                location: c.location.clone(),
                company: c.company.clone(),
                html_url: c.html_url.clone(),
            })
        })
        .collect();
    contributors.sort_by(|a, b| b.contributions.cmp(&a.contributions));

    Ok(RepositoryView {
        repository,
        contributors: page.apply(contributors),
    })
}

/// Contributor by exact username with paginated contribution records.
pub fn contributor_view(
    snapshot: &Snapshot,
    username: &str,
    page: PageRequest,
) -> Result<ContributorView> {
    let mut contributor = snapshot
        .contributors
        .iter()
        .find(|c| c.username == username)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("Contributor {username} not found")))?;

    let current: HashMap<String, &Repository> = snapshot
        .repositories_detailed
        .iter()
        .map(|r| (r.full_name.to_lowercase(), r))
        .collect();

    let records: Vec<ContributionView> = std::mem::take(&mut contributor.repository_contributions)
        .into_iter()
        .map(|record| {
            let known = current.get(&record.repository.to_lowercase());
            let repository_stars = match (record.repository_stars, known) {
                (0, Some(repo)) => repo.stargazers_count,
                (stars, _) => stars,
            };
            let repository_language = match known {
                Some(repo) if record.repository_language.is_empty() => repo.language.clone(),
                _ => record.repository_language,
            };
            ContributionView {
                repository: record.repository,
                contributions: record.contributions,
                repository_stars,
                repository_language,
            }
        })
        .collect();

    Ok(ContributorView {
        contributor,
        repositories: page.apply(records),
    })
}
