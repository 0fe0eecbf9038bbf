//! Tunes Rankings - pairwise Elo rankings for a music collection
//!
//! Listeners vote on which of two tracks they prefer; each vote updates
//! the tracks' Elo ratings, is appended to a vote log, and is persisted
//! through a chain of storage backends with in-memory fallback.

pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod server;
pub mod service;
pub mod source;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RankingError, Result};
pub use types::*;

// Re-export key components
pub use rating::RankingEngine;
pub use service::RankingService;
pub use source::TrackSource;
pub use storage::{RankingStore, StorageBackend};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
