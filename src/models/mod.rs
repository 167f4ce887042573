// src/models/mod.rs

//! Domain models for the crawler and the query service.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod checkpoint;
mod config;
mod contributor;
mod repository;

// Re-export all public types
pub use checkpoint::{CHECKPOINT_SCHEMA_VERSION, Checkpoint, ContributionKey};
pub use config::{
    Config, CrawlerConfig, LoggingConfig, PathsConfig, SearchConfig, ServerConfig,
};
pub use contributor::{ContributionRecord, Contributor};
pub use repository::Repository;
