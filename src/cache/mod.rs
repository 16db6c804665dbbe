//! Offline-first cache of finished print jobs.
//!
//! This module provides:
//! - A durable SQLite store mirroring the remote job collection
//! - A sync engine choosing between a paged full download and an incremental
//!   `updated > last_sync` check
//! - A status hub fanning progress and job lists out to any number of
//!   listeners
//! - The mapping from remote records to their cached projection

pub mod engine;
pub mod mapper;
pub mod status;
pub mod storage;
pub mod types;

pub use engine::{SyncEngine, SyncSettings, SyncStrategy};
pub use mapper::{map_remote_to_cache, DatumStyle};
pub use status::{JobsCallback, StatusCallback, StatusHub, Subscription};
pub use storage::{JobStore, SqliteStore};
pub use types::{CacheStatus, CachedJob, StatusPatch, SyncMetadata};
