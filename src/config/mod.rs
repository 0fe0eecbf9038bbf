//! Configuration management for the tunes-rankings service
//!
//! This module handles all configuration loading from environment variables
//! and TOML files, validation, and default values.

pub mod app;
pub mod rankings;
pub mod storage;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use rankings::RankingsSettings;
pub use storage::{RemoteKvSettings, StorageSettings};
