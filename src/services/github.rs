//! Typed access to the GitHub REST endpoints used by the crawler.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Contributor, CrawlerConfig, Repository};
use crate::services::client::{RateLimitObserver, RateLimitedClient, Transport};
use crate::utils::ApiUrls;

/// Contributors requested per page.
pub const CONTRIBUTORS_PER_PAGE: usize = 100;

/// Results per search page.
pub const SEARCH_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiLicense {
    #[serde(default)]
    pub name: Option<String>,
}

/// Repository object as returned by search and detail endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRepository {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
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
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub license: Option<ApiLicense>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl From<ApiRepository> for Repository {
    fn from(api: ApiRepository) -> Self {
        Self {
            id: api.id,
            name: api.name,
            full_name: api.full_name,
            html_url: api.html_url,
            description: api.description.unwrap_or_default(),
            created_at: api.created_at.unwrap_or_default(),
            updated_at: api.updated_at.unwrap_or_default(),
            pushed_at: api.pushed_at.unwrap_or_default(),
            homepage: api.homepage.unwrap_or_default(),
            size: api.size,
            stargazers_count: api.stargazers_count,
            watchers_count: api.watchers_count,
            forks_count: api.forks_count,
            open_issues_count: api.open_issues_count,
            language: api.language.unwrap_or_default(),
            license: api.license.and_then(|l| l.name).unwrap_or_default(),
            topics: api.topics,
            languages: BTreeMap::new(),
            default_branch: api.default_branch.unwrap_or_default(),
            visibility: api.visibility.unwrap_or_default(),
            archived: api.archived,
            matched_keyword: String::new(),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<ApiRepository>,
}

/// Entry of the contributors listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiContributor {
    /// Absent for anonymous contributors
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub contributions: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// User profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiUser {
    #[serde(default)]
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub public_gists: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default)]
    pub site_admin: bool,
}

impl From<ApiUser> for Contributor {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            username: user.login,
            name: user.name.unwrap_or_default(),
            company: user.company.unwrap_or_default(),
            blog: user.blog.unwrap_or_default(),
            location: user.location.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            bio: user.bio.unwrap_or_default(),
            twitter_username: user.twitter_username.unwrap_or_default(),
            public_repos: user.public_repos,
            public_gists: user.public_gists,
            followers: user.followers,
            following: user.following,
            created_at: user.created_at.unwrap_or_default(),
            updated_at: user.updated_at.unwrap_or_default(),
            html_url: user.html_url.unwrap_or_default(),
            account_type: user.account_type.unwrap_or_default(),
            site_admin: user.site_admin,
            total_contributions: 0,
            repository_contributions: Vec::new(),
        }
    }
}

/// GitHub endpoints on top of the rate-limited client.
#[derive(Debug, Clone)]
pub struct GitHubApi<T> {
    client: RateLimitedClient<T>,
    urls: ApiUrls,
    grace: Duration,
    search_grace: Duration,
}

impl<T: Transport> GitHubApi<T> {
    pub fn new(client: RateLimitedClient<T>, config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client,
            urls: ApiUrls::new(&config.api_base)?,
            grace: config.rate_limit_grace(),
            search_grace: config.search_rate_limit_grace(),
        })
    }

    async fn fetch<D: DeserializeOwned + Default>(
        &self,
        url: &str,
        grace: Duration,
        observer: &dyn RateLimitObserver,
    ) -> Result<D> {
        let value = self.client.request(url, grace, observer).await?;
        if value.is_null() {
            return Ok(D::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// One page of repository search results.
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        observer: &dyn RateLimitObserver,
    ) -> Result<SearchPage> {
        let url = self.urls.search_repositories(query, page)?;
        self.fetch(&url, self.search_grace, observer).await
    }

    /// Repository detail.
    pub async fn repository(
        &self,
        full_name: &str,
        observer: &dyn RateLimitObserver,
    ) -> Result<Repository> {
        let url = self.urls.repository(full_name)?;
        let api: ApiRepository = self.fetch(&url, self.grace, observer).await?;
        Ok(api.into())
    }

    /// Language name to byte count.
    pub async fn languages(
        &self,
        full_name: &str,
        observer: &dyn RateLimitObserver,
    ) -> Result<BTreeMap<String, u64>> {
        let url = self.urls.languages(full_name)?;
        self.fetch(&url, self.grace, observer).await
    }

    /// Up to `limit` contributors, paging until a short or empty page.
    pub async fn contributors(
        &self,
        full_name: &str,
        limit: usize,
        page_delay: Duration,
        observer: &dyn RateLimitObserver,
    ) -> Result<Vec<ApiContributor>> {
        let mut collected = Vec::new();
        let mut page = 1u32;

        while collected.len() < limit {
            let url = self
                .urls
                .contributors(full_name, page, CONTRIBUTORS_PER_PAGE)?;
            let value = self.client.request(&url, self.grace, observer).await?;
            let Value::Array(items) = value else {
                break;
            };

            let count = items.len();
            collected.extend(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<ApiContributor>(item).ok()),
            );
            if count < CONTRIBUTORS_PER_PAGE {
                break;
            }
            page += 1;
            tokio::time::sleep(page_delay).await;
        }

        collected.truncate(limit);
        Ok(collected)
    }

    /// User profile.
    pub async fn user(&self, login: &str, observer: &dyn RateLimitObserver) -> Result<ApiUser> {
        let url = self.urls.user(login)?;
        let value = self.client.request(&url, self.grace, observer).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::client::testing::*;
    use crate::services::client::{HttpResponse, NoopObserver, RetryPolicy};

    fn api(transport: Arc<ScriptedTransport>) -> GitHubApi<Arc<ScriptedTransport>> {
        let config = CrawlerConfig::default();
        let client = RateLimitedClient::new(transport, RetryPolicy::from_config(&config));
        GitHubApi::new(client, &config).unwrap()
    }

    fn contributor_page(start: usize, count: usize) -> HttpResponse {
        let items: Vec<Value> = (start..start + count)
            .map(|i| serde_json::json!({"login": format!("user{i}"), "id": i, "contributions": 1}))
            .collect();
        ok(&Value::Array(items).to_string())
    }

    #[tokio::test]
    async fn repository_nulls_become_empty() {
        let transport = Arc::new(ScriptedTransport::new([ok(r#"{
            "id": 5, "name": "flow", "full_name": "acme/flow",
            "html_url": "https://github.com/acme/flow",
            "description": null, "language": null,
            "license": {"key": "mit", "name": "MIT License"},
            "topics": ["etl"], "stargazers_count": 12, "size": 300
        }"#)]));
        let repo = api(transport).repository("acme/flow", &NoopObserver).await.unwrap();

        assert_eq!(repo.id, 5);
        assert_eq!(repo.description, "");
        assert_eq!(repo.language, "");
        assert_eq!(repo.license, "MIT License");
        assert_eq!(repo.topics, vec!["etl"]);
    }

    #[tokio::test(start_paused = true)]
    async fn contributors_page_until_short_page() {
        let transport = Arc::new(ScriptedTransport::new([
            contributor_page(0, 100),
            contributor_page(100, 20),
        ]));
        let list = api(Arc::clone(&transport))
            .contributors("acme/flow", 500, Duration::from_secs(1), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(list.len(), 120);
        assert_eq!(transport.call_count(), 2);
        assert!(transport.calls.lock().unwrap()[1].contains("page=2"));
    }

    #[tokio::test(start_paused = true)]
    async fn contributors_respect_limit() {
        let transport = Arc::new(ScriptedTransport::new([
            contributor_page(0, 100),
            contributor_page(100, 100),
        ]));
        let list = api(Arc::clone(&transport))
            .contributors("acme/flow", 100, Duration::from_secs(1), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(list.len(), 100);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_repository_has_no_contributors() {
        let transport = Arc::new(ScriptedTransport::new([status(204)]));
        let list = api(transport)
            .contributors("acme/empty", 100, Duration::ZERO, &NoopObserver)
            .await
            .unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn user_converts_to_contributor() {
        let user: ApiUser = serde_json::from_value(serde_json::json!({
            "login": "octo", "id": 1, "name": null, "location": "Berlin",
            "followers": 10, "type": "User"
        }))
        .unwrap();
        let contributor = Contributor::from(user);
        assert_eq!(contributor.username, "octo");
        assert_eq!(contributor.name, "");
        assert_eq!(contributor.account_type, "User");
        assert_eq!(contributor.total_contributions, 0);
    }
}
