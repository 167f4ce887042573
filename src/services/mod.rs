//! Service layer for the crawler application.
//!
//! This module contains the outbound side of the crawler:
//! - Rate-limited request client (`RateLimitedClient`)
//! - GitHub endpoint wrapper (`GitHubApi`)
//! - Contributor aggregation (`ContributorAccumulator`)

pub mod client;
mod contributors;
pub mod github;

pub use client::{
    HttpResponse, NoopObserver, RateLimitObserver, RateLimitedClient, ReqwestTransport,
    RetryPolicy, Transport, rate_limit_delay,
};
pub use contributors::ContributorAccumulator;
pub use github::{ApiContributor, ApiRepository, ApiUser, GitHubApi, SearchPage};
