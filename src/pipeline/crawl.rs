// src/pipeline/crawl.rs

//! Resumable repository and contributor crawl.
//!
//! A run moves through `Searching -> Detailing -> Contributors ->
//! Checkpointing` for every repository and ends in `Done`. Progress lives in
//! the checkpoint file plus the three snapshot tables, so an interrupted run
//! resumes from the stored index without duplicating rows or counts.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{
    Checkpoint, Config, ContributionKey, ContributionRecord, Contributor, Repository,
};
use crate::pipeline::search::search_repositories;
use crate::services::{
    ContributorAccumulator, GitHubApi, RateLimitObserver, RateLimitedClient, ReqwestTransport,
    RetryPolicy, Transport,
};
use crate::storage::{
    CheckpointStore, LocalStorage, SnapshotFiles, TableKind, TableRecord, new_run_timestamp,
};

/// Crawler state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Searching,
    Detailing,
    Contributors,
    Checkpointing,
    Done,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlPhase::Searching => "SEARCHING",
            CrawlPhase::Detailing => "DETAILING",
            CrawlPhase::Contributors => "CONTRIBUTORS",
            CrawlPhase::Checkpointing => "CHECKPOINTING",
            CrawlPhase::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Options for one crawler invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlOptions {
    /// Ignore an existing checkpoint and start a new snapshot
    pub fresh: bool,
}

/// Summary of a crawl run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    pub timestamp: String,
    pub resumed: bool,
    pub repositories_found: usize,
    pub repositories_detailed: usize,
    pub repositories_skipped: usize,
    pub repository_failures: usize,
    pub contribution_records: usize,
    pub profile_failures: usize,
    pub contributors: usize,
}

/// Mutable state threaded through one run.
struct RunState {
    phase: CrawlPhase,
    checkpoint: Checkpoint,
    contributors: ContributorAccumulator,
    /// Ids already present in the detailed table
    detailed_ids: HashSet<u64>,
    files: SnapshotFiles,
}

impl RunState {
    fn transition(&mut self, next: CrawlPhase) {
        if self.phase == next {
            return;
        }
        match next {
            CrawlPhase::Searching | CrawlPhase::Done => {
                log::info!("Crawler state: {} -> {}", self.phase, next)
            }
            _ => log::debug!("Crawler state: {} -> {}", self.phase, next),
        }
        self.phase = next;
    }
}

/// Sequential GitHub crawler writing one snapshot per run.
pub struct Crawler<T> {
    config: Arc<Config>,
    api: GitHubApi<T>,
    storage: LocalStorage,
    checkpoints: CheckpointStore,
}

impl Crawler<ReqwestTransport> {
    /// Crawler using the real HTTP transport; a token is required.
    pub fn from_config(config: Arc<Config>, token: Option<String>) -> Result<Self> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::config("GITHUB_TOKEN is not set"))?;
        let transport = ReqwestTransport::new(&config.crawler, Some(token))?;
        Self::new(config, transport)
    }
}

impl<T: Transport> Crawler<T> {
    pub fn new(config: Arc<Config>, transport: T) -> Result<Self> {
        let client = RateLimitedClient::new(transport, RetryPolicy::from_config(&config.crawler));
        let api = GitHubApi::new(client, &config.crawler)?;
        Ok(Self {
            storage: LocalStorage::new(&config.paths.data_dir),
            checkpoints: CheckpointStore::new(&config.paths.checkpoint_file)?,
            api,
            config,
        })
    }

    /// Run or resume a crawl.
    pub async fn run(&self, options: CrawlOptions) -> Result<CrawlSummary> {
        let (mut state, resumed) = self.prepare(options).await?;
        let mut summary = CrawlSummary {
            timestamp: state.files.timestamp.clone(),
            resumed,
            ..CrawlSummary::default()
        };

        let repositories = self.load_or_search(&mut state).await?;
        summary.repositories_found = repositories.len();

        for kind in [TableKind::RepositoriesDetailed, TableKind::Contributors] {
            let columns = match kind {
                TableKind::Contributors => Contributor::COLUMNS,
                _ => Repository::COLUMNS,
            };
            self.storage
                .ensure_table(&state.files.key(kind), columns)
                .await?;
        }

        self.detail_all(&mut state, &repositories, &mut summary)
            .await?;

        state.checkpoint.last_processed_repo_index = repositories.len();
        self.save(&mut state).await?;
        state.transition(CrawlPhase::Done);

        summary.contributors = state.contributors.len();
        log::info!(
            "Crawl {} finished: {} repositories detailed, {} skipped, {} failed, {} contributors",
            summary.timestamp,
            summary.repositories_detailed,
            summary.repositories_skipped,
            summary.repository_failures,
            summary.contributors
        );
        Ok(summary)
    }

    /// Load the checkpoint and rebuild run state from the snapshot tables.
    async fn prepare(&self, options: CrawlOptions) -> Result<(RunState, bool)> {
        let existing = if options.fresh {
            None
        } else {
            self.checkpoints.load().await?
        };
        let resumed = existing.is_some();
        let checkpoint = existing.unwrap_or_else(|| Checkpoint::new(new_run_timestamp()));
        let files = SnapshotFiles::new(checkpoint.timestamp.clone());

        let mut state = RunState {
            phase: CrawlPhase::Searching,
            checkpoint,
            contributors: ContributorAccumulator::new(),
            detailed_ids: HashSet::new(),
            files,
        };

        if resumed {
            let contributors_key = state.files.key(TableKind::Contributors);
            if let Some(list) = self
                .storage
                .read_records::<Contributor>(&contributors_key)
                .await?
            {
                state.contributors = ContributorAccumulator::from_contributors(list);
                let keys: Vec<ContributionKey> = state.contributors.contribution_keys().collect();
                for key in keys {
                    state.checkpoint.mark_contribution_processed(key);
                }
            }

            let detailed_key = state.files.key(TableKind::RepositoriesDetailed);
            if let Some(table) = self.storage.read_table(&detailed_key).await? {
                state.detailed_ids = table.rows.iter().map(|row| row.int("id")).collect();
            }

            log::info!(
                "Resuming crawl {} at repository index {} ({} contributors restored)",
                state.files.timestamp,
                state.checkpoint.last_processed_repo_index,
                state.contributors.len()
            );
        } else {
            log::info!("Starting new crawl {}", state.files.timestamp);
        }

        Ok((state, resumed))
    }

    /// Reuse a completed search table or run the keyword search.
    async fn load_or_search(&self, state: &mut RunState) -> Result<Vec<Repository>> {
        let key = state.files.key(TableKind::Repositories);

        if state.checkpoint.search_complete {
            match self.storage.read_records::<Repository>(&key).await? {
                Some(repositories) => {
                    log::info!("Loaded {} repositories from {key}", repositories.len());
                    return Ok(repositories);
                }
                None => {
                    log::warn!("Search table {key} is missing, searching again");
                    state.checkpoint.search_complete = false;
                    state.checkpoint.last_processed_repo_index = 0;
                }
            }
        }

        state.transition(CrawlPhase::Searching);
        let repositories = search_repositories(
            &self.api,
            &self.config.search,
            self.config.crawler.page_delay(),
            &self.guard(state),
        )
        .await;
        log::info!("Found {} unique repositories", repositories.len());

        self.storage
            .write_table(&key, &repositories, Repository::COLUMNS)
            .await?;
        state.checkpoint.search_complete = true;
        self.save(state).await?;
        Ok(repositories)
    }

    async fn detail_all(
        &self,
        state: &mut RunState,
        repositories: &[Repository],
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        let crawler = &self.config.crawler;
        let every = crawler.checkpoint_every.max(1);
        let start = state
            .checkpoint
            .last_processed_repo_index
            .min(repositories.len());
        let total = repositories.len();

        for (index, repo) in repositories.iter().enumerate().skip(start) {
            state.checkpoint.last_processed_repo_index = index;

            if state.checkpoint.is_repo_processed(repo.id) {
                summary.repositories_skipped += 1;
                continue;
            }

            log::info!("[{}/{}] {}", index + 1, total, repo.full_name);
            match self.process_repository(state, repo, summary).await {
                Ok(()) => {
                    state.checkpoint.mark_repo_processed(repo.id);
                    if (index + 1) % every == 0 {
                        self.save(state).await?;
                    }
                }
                Err(e) => {
                    summary.repository_failures += 1;
                    log::error!("Error getting details for {}: {e}", repo.full_name);
                    self.save(state).await?;
                    tokio::time::sleep(crawler.error_delay()).await;
                }
            }

            tokio::time::sleep(crawler.request_delay()).await;
        }

        Ok(())
    }

    /// Detail, languages and contributors of one repository.
    async fn process_repository(
        &self,
        state: &mut RunState,
        repo: &Repository,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        state.transition(CrawlPhase::Detailing);
        let mut detail = self
            .api
            .repository(&repo.full_name, &self.guard(state))
            .await?;
        detail.matched_keyword = repo.matched_keyword.clone();
        detail.languages = match self.api.languages(&repo.full_name, &self.guard(state)).await {
            Ok(languages) => languages,
            Err(e) => {
                log::warn!("Languages unavailable for {}: {e}", repo.full_name);
                BTreeMap::new()
            }
        };

        if state.detailed_ids.insert(repo.id) {
            self.storage
                .append_table(
                    &state.files.key(TableKind::RepositoriesDetailed),
                    std::slice::from_ref(&detail),
                    Repository::COLUMNS,
                )
                .await?;
            summary.repositories_detailed += 1;
        } else {
            log::debug!("{} already in detailed table", repo.full_name);
        }

        state.transition(CrawlPhase::Contributors);
        self.collect_contributors(state, &detail, summary).await
    }

    async fn collect_contributors(
        &self,
        state: &mut RunState,
        detail: &Repository,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        let crawler = &self.config.crawler;
        let listing = self
            .api
            .contributors(
                &detail.full_name,
                self.config.search.contributor_limit,
                crawler.page_delay(),
                &self.guard(state),
            )
            .await?;
        log::info!(
            "Found {} contributors for {}",
            listing.len(),
            detail.full_name
        );

        for entry in listing {
            let Some(login) = entry.login.filter(|login| !login.is_empty()) else {
                continue;
            };
            let key = ContributionKey::new(login.clone(), detail.full_name.clone());
            if state.checkpoint.is_contribution_processed(&key) {
                continue;
            }

            let record = ContributionRecord {
                repository: detail.full_name.clone(),
                contributions: entry.contributions,
                repository_stars: detail.stargazers_count,
                repository_language: detail.language.clone(),
            };

            if state.contributors.contains(&login) {
                state.contributors.record(&login, record);
            } else {
                match self.api.user(&login, &self.guard(state)).await {
                    Ok(user) => {
                        let mut profile = Contributor::from(user);
                        profile.username = login.clone();
                        if profile.html_url.is_empty() {
                            profile.html_url = entry.html_url.unwrap_or_default();
                        }
                        state.contributors.seed(profile, record);
                    }
                    Err(e) => {
                        summary.profile_failures += 1;
                        log::warn!("Error getting details for contributor {login}: {e}");
                        continue;
                    }
                }
                tokio::time::sleep(crawler.profile_delay()).await;
            }

            state.checkpoint.mark_contribution_processed(key);
            summary.contribution_records += 1;
        }

        Ok(())
    }

    /// Observer persisting progress before a rate-limit sleep.
    fn guard<'a>(&'a self, state: &'a RunState) -> SaveOnThrottle<'a, T> {
        SaveOnThrottle {
            crawler: self,
            state,
        }
    }

    async fn save(&self, state: &mut RunState) -> Result<()> {
        let previous = state.phase;
        state.transition(CrawlPhase::Checkpointing);
        self.persist(&mut state.checkpoint, &state.contributors, &state.files)
            .await?;
        state.transition(previous);
        Ok(())
    }

    /// Rewrite the contributors table, then the checkpoint.
    async fn persist(
        &self,
        checkpoint: &mut Checkpoint,
        contributors: &ContributorAccumulator,
        files: &SnapshotFiles,
    ) -> Result<()> {
        self.storage
            .write_table(
                &files.key(TableKind::Contributors),
                contributors.as_slice(),
                Contributor::COLUMNS,
            )
            .await?;
        self.checkpoints.save(checkpoint).await?;
        log::info!(
            "Checkpoint saved: index {}, {} repositories, {} contributors",
            checkpoint.last_processed_repo_index,
            checkpoint.processed_repos.len(),
            contributors.len()
        );
        Ok(())
    }
}

struct SaveOnThrottle<'a, T> {
    crawler: &'a Crawler<T>,
    state: &'a RunState,
}

#[async_trait]
impl<T: Transport> RateLimitObserver for SaveOnThrottle<'_, T> {
    async fn before_sleep(&self, delay: Duration) {
        log::info!(
            "Saving checkpoint before sleeping {}s for rate limit",
            delay.as_secs()
        );
        let mut checkpoint = self.state.checkpoint.clone();
        if let Err(e) = self
            .crawler
            .persist(&mut checkpoint, &self.state.contributors, &self.state.files)
            .await
        {
            log::error!("Failed to save checkpoint: {e}");
        }
    }
}
