//! Cross-repository contributor aggregation.

use std::collections::HashMap;

use crate::models::{ContributionKey, ContributionRecord, Contributor};

/// Contributors seen in the current run, keyed by username.
///
/// Insertion order is preserved so the persisted table is stable across
/// checkpoints.
#[derive(Debug, Clone, Default)]
pub struct ContributorAccumulator {
    by_username: HashMap<String, usize>,
    contributors: Vec<Contributor>,
}

impl ContributorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a previously persisted contributors table.
    ///
    /// Later duplicates of a username are merged into the first entry.
    pub fn from_contributors(contributors: impl IntoIterator<Item = Contributor>) -> Self {
        let mut acc = Self::new();
        for contributor in contributors {
            if contributor.username.is_empty() {
                continue;
            }
            match acc.by_username.get(&contributor.username) {
                Some(&idx) => {
                    for record in contributor.repository_contributions {
                        acc.contributors[idx].add_contribution(record);
                    }
                }
                None => acc.insert(contributor),
            }
        }
        acc
    }

    fn insert(&mut self, contributor: Contributor) {
        self.by_username
            .insert(contributor.username.clone(), self.contributors.len());
        self.contributors.push(contributor);
    }

    pub fn contains(&self, username: &str) -> bool {
        self.by_username.contains_key(username)
    }

    /// Seed a newly seen contributor from its profile with a first record.
    pub fn seed(&mut self, mut profile: Contributor, record: ContributionRecord) {
        if self.contains(&profile.username) {
            self.record(&profile.username, record);
            return;
        }
        profile.total_contributions = 0;
        profile.repository_contributions.clear();
        profile.add_contribution(record);
        self.insert(profile);
    }

    /// Append a record to a known contributor.
    ///
    /// Returns false when the username has not been seeded.
    pub fn record(&mut self, username: &str, record: ContributionRecord) -> bool {
        match self.by_username.get(username) {
            Some(&idx) => {
                self.contributors[idx].add_contribution(record);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn as_slice(&self) -> &[Contributor] {
        &self.contributors
    }

    /// Every `(username, repository)` pair already aggregated.
    pub fn contribution_keys(&self) -> impl Iterator<Item = ContributionKey> + '_ {
        self.contributors.iter().flat_map(|c| {
            c.repository_contributions
                .iter()
                .map(move |r| ContributionKey::new(c.username.clone(), r.repository.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(username: &str) -> Contributor {
        Contributor {
            username: username.into(),
            followers: 3,
            ..Contributor::default()
        }
    }

    fn record(repo: &str, contributions: u64) -> ContributionRecord {
        ContributionRecord {
            repository: repo.into(),
            contributions,
            ..ContributionRecord::default()
        }
    }

    #[test]
    fn seed_then_record() {
        let mut acc = ContributorAccumulator::new();
        acc.seed(profile("octo"), record("a/one", 4));
        assert!(acc.record("octo", record("b/two", 6)));
        assert!(!acc.record("ghost", record("b/two", 1)));

        let octo = &acc.as_slice()[0];
        assert_eq!(octo.total_contributions, 10);
        assert_eq!(octo.repository_contributions.len(), 2);
        assert_eq!(acc.len(), 1);
        assert!(!acc.is_empty());
        assert!(ContributorAccumulator::new().is_empty());
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let mut acc = ContributorAccumulator::new();
        acc.seed(profile("octo"), record("a/one", 1));
        acc.seed(profile("Octo"), record("a/one", 1));
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn rebuild_preserves_keys_and_order() {
        let mut acc = ContributorAccumulator::new();
        acc.seed(profile("zed"), record("a/one", 1));
        acc.seed(profile("amy"), record("a/one", 2));
        acc.record("zed", record("b/two", 3));

        let rebuilt = ContributorAccumulator::from_contributors(acc.as_slice().to_vec());
        let names: Vec<&str> = rebuilt.as_slice().iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["zed", "amy"]);

        let mut keys: Vec<ContributionKey> = rebuilt.contribution_keys().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ContributionKey::new("amy", "a/one"),
                ContributionKey::new("zed", "a/one"),
                ContributionKey::new("zed", "b/two"),
            ]
        );
    }
}
