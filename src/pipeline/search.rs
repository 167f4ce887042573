// src/pipeline/search.rs

//! Keyword search across the configured keyword list.

use std::collections::HashSet;
use std::time::Duration;

use crate::models::{Repository, SearchConfig};
use crate::services::github::SEARCH_PAGE_SIZE;
use crate::services::{GitHubApi, RateLimitObserver, Transport};

/// The search API serves at most 1000 results per query.
const MAX_SEARCH_PAGES: u32 = 10;

/// Run every keyword query and merge the results.
///
/// Repositories are deduplicated by id; the first keyword that produced a
/// repository is recorded in `matched_keyword`. A failing query ends that
/// keyword and moves on to the next.
pub async fn search_repositories<T: Transport>(
    api: &GitHubApi<T>,
    search: &SearchConfig,
    page_delay: Duration,
    observer: &dyn RateLimitObserver,
) -> Vec<Repository> {
    let limit = search.repo_limit;
    let mut seen = HashSet::new();
    let mut results: Vec<Repository> = Vec::new();

    'keywords: for keyword in &search.keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        let query = search.query_for(keyword);
        log::info!("Searching repositories: {query}");

        let mut page = 1u32;
        while results.len() < limit && page <= MAX_SEARCH_PAGES {
            let response = match api.search(&query, page, observer).await {
                Ok(response) => response,
                Err(e) => {
                    log::error!("Error searching repositories for '{keyword}': {e}");
                    break;
                }
            };

            if page == 1 {
                log::info!("Keyword '{keyword}': {} matches", response.total_count);
            }
            let count = response.items.len();
            if count == 0 {
                break;
            }

            for item in response.items {
                if !seen.insert(item.id) {
                    continue;
                }
                let mut repo = Repository::from(item);
                repo.matched_keyword = keyword.to_string();
                results.push(repo);
                if results.len() >= limit {
                    log::info!("Repository limit of {limit} reached");
                    break 'keywords;
                }
            }

            log::info!(
                "Keyword '{keyword}' page {page}: {count} results ({} unique so far)",
                results.len()
            );
            if count < SEARCH_PAGE_SIZE {
                break;
            }
            page += 1;
            tokio::time::sleep(page_delay).await;
        }
    }

    results
}
