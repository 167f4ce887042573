//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP, retry and politeness settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Search keywords and limits
    #[serde(default)]
    pub search: SearchConfig,

    /// On-disk locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Query API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.api_base.trim().is_empty() {
            return Err(AppError::validation("crawler.api_base is empty"));
        }
        url::Url::parse(&self.crawler.api_base)?;
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_attempts == 0 {
            return Err(AppError::validation("crawler.max_attempts must be > 0"));
        }
        if self.crawler.checkpoint_every == 0 {
            return Err(AppError::validation("crawler.checkpoint_every must be > 0"));
        }
        if self.search.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation("No search keywords defined"));
        }
        if self.search.repo_limit == 0 {
            return Err(AppError::validation("search.repo_limit must be > 0"));
        }
        if self.search.contributor_limit == 0 {
            return Err(AppError::validation(
                "search.contributor_limit must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client, retry and politeness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the REST API
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between repositories in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Delay after each profile fetch in milliseconds
    #[serde(default = "defaults::profile_delay")]
    pub profile_delay_ms: u64,

    /// Delay between result pages in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Attempts per request before giving up (rate limiting excluded)
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay before retrying a failed request
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,

    /// Extra seconds slept past the rate-limit reset time
    #[serde(default = "defaults::rate_limit_grace")]
    pub rate_limit_grace_secs: u64,

    /// Extra seconds slept past the reset time for search calls
    #[serde(default = "defaults::search_rate_limit_grace")]
    pub search_rate_limit_grace_secs: u64,

    /// Pause after a per-repository failure
    #[serde(default = "defaults::error_delay")]
    pub error_delay_secs: u64,

    /// Persist the checkpoint every N repositories
    #[serde(default = "defaults::checkpoint_every")]
    pub checkpoint_every: usize,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn profile_delay(&self) -> Duration {
        Duration::from_millis(self.profile_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn rate_limit_grace(&self) -> Duration {
        Duration::from_secs(self.rate_limit_grace_secs)
    }

    pub fn search_rate_limit_grace(&self) -> Duration {
        Duration::from_secs(self.search_rate_limit_grace_secs)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.error_delay_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            profile_delay_ms: defaults::profile_delay(),
            page_delay_ms: defaults::page_delay(),
            max_attempts: defaults::max_attempts(),
            retry_delay_secs: defaults::retry_delay(),
            rate_limit_grace_secs: defaults::rate_limit_grace(),
            search_rate_limit_grace_secs: defaults::search_rate_limit_grace(),
            error_delay_secs: defaults::error_delay(),
            checkpoint_every: defaults::checkpoint_every(),
        }
    }
}

/// Repository search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Keywords searched in order; earlier keywords win the `matched_keyword` tag
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,

    /// Search qualifier field (`in:<qualifier>`), empty to search everywhere
    #[serde(default = "defaults::qualifier")]
    pub qualifier: String,

    /// Minimum star count
    #[serde(default = "defaults::min_stars")]
    pub min_stars: u64,

    /// Maximum unique repositories collected across all keywords
    #[serde(default = "defaults::repo_limit")]
    pub repo_limit: usize,

    /// Maximum contributors fetched per repository
    #[serde(default = "defaults::contributor_limit")]
    pub contributor_limit: usize,
}

impl SearchConfig {
    /// Build the search query for one keyword.
    pub fn query_for(&self, keyword: &str) -> String {
        let keyword = keyword.trim();
        if self.qualifier.trim().is_empty() {
            format!("{keyword} stars:>={}", self.min_stars)
        } else {
            format!("{keyword} in:{} stars:>={}", self.qualifier.trim(), self.min_stars)
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: defaults::keywords(),
            qualifier: defaults::qualifier(),
            min_stars: defaults::min_stars(),
            repo_limit: defaults::repo_limit(),
            contributor_limit: defaults::contributor_limit(),
        }
    }
}

/// On-disk locations for snapshots and the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            checkpoint_file: defaults::checkpoint_file(),
        }
    }
}

/// Query API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default = "defaults::cors_origins")]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            cors_origins: defaults::cors_origins(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn api_base() -> String {
        "https://api.github.com".into()
    }
    pub fn user_agent() -> String {
        "repo-census/0.1 (+https://github.com)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn profile_delay() -> u64 {
        200
    }
    pub fn page_delay() -> u64 {
        1000
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        10
    }
    pub fn rate_limit_grace() -> u64 {
        1
    }
    pub fn search_rate_limit_grace() -> u64 {
        10
    }
    pub fn error_delay() -> u64 {
        5
    }
    pub fn checkpoint_every() -> usize {
        10
    }

    // Search defaults
    pub fn keywords() -> Vec<String> {
        [
            "data pipeline",
            "ETL",
            "data engineering",
            "data warehouse",
            "data lake",
            "data orchestration",
            "stream processing",
            "Apache Airflow",
            "Apache Spark",
            "Apache Kafka",
            "dbt",
            "lakehouse",
            "data quality",
            "data lineage",
            "workflow orchestration",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn qualifier() -> String {
        "description".into()
    }
    pub fn min_stars() -> u64 {
        50
    }
    pub fn repo_limit() -> usize {
        5000
    }
    pub fn contributor_limit() -> usize {
        100
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("github_data")
    }
    pub fn checkpoint_file() -> PathBuf {
        PathBuf::from("checkpoints/crawler_checkpoint.json")
    }

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        8000
    }
    pub fn cors_origins() -> Vec<String> {
        vec!["http://localhost:3000".into()]
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.crawler.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_keywords() {
        let mut config = Config::default();
        config.search.keywords = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [search]
            keywords = ["rust"]
            min_stars = 10

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.search.keywords, vec!["rust".to_string()]);
        assert_eq!(config.search.repo_limit, 5000);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.crawler.max_attempts, 3);
        assert_eq!(config.crawler.checkpoint_every, 10);
    }

    #[test]
    fn query_includes_qualifier_and_threshold() {
        let search = SearchConfig {
            min_stars: 500,
            ..SearchConfig::default()
        };
        assert_eq!(
            search.query_for("machine learning"),
            "machine learning in:description stars:>=500"
        );

        let unqualified = SearchConfig {
            qualifier: String::new(),
            min_stars: 10,
            ..SearchConfig::default()
        };
        assert_eq!(unqualified.query_for(" nlp "), "nlp stars:>=10");
    }
}
