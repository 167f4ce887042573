// src/lib.rs

//! Repo Census Library
//!
//! Crawls GitHub repositories matching a set of keywords together with their
//! contributors, stores each run as a CSV snapshot and serves aggregates over
//! the latest snapshot.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod query;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
