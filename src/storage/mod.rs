//! Persistence for ranking snapshots and vote logs
//!
//! Backends are tried in priority order: remote key-value stores first, then
//! the local filesystem, with an in-process copy that never fails last.

pub mod backend;
pub mod file;
pub mod memory;
pub mod remote;
pub mod store;

pub use backend::{KeyValueBackend, KeyValueStore, StorageBackend, StorageKeys};
pub use file::FileStore;
pub use memory::MemoryBackend;
pub use remote::RestKvStore;
pub use store::{RankingStore, SaveOutcome, StoreStatus};
