//! Pipeline entry points for crawler operations.
//!
//! - `search_repositories`: Keyword search with deduplication
//! - `Crawler::run`: Resumable detail and contributor crawl

pub mod crawl;
pub mod search;

pub use crawl::{CrawlOptions, CrawlPhase, CrawlSummary, Crawler};
pub use search::search_repositories;
