//! Core types shared by the cache store, the sync engine and its observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the single sync metadata record.
pub const SYNC_META_KEY: &str = "global";

/// Status text shown before anything has happened.
pub const STATUS_INITIALIZING: &str = "Initializing...";
/// Terminal status text of every successful pass.
pub const STATUS_UP_TO_DATE: &str = "Up to date";

/// One finished production job as stored in the local cache.
///
/// Numeric production attributes stay `None` when the remote record leaves them
/// unset; the UI renders that as "unknown", which is not the same as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedJob {
  pub id: String,
  pub order_nr: String,
  pub order_name: String,
  /// `YYYY-MM-DD`
  pub date: String,
  /// Locale formatted copy of `date`
  pub datum: String,
  pub version: String,
  pub pages: Option<i64>,
  pub ex_omw: String,
  pub net_run: Option<i64>,
  pub switch_counts: [Option<i64>; 5],
  pub max_gross: Option<i64>,
  pub green: Option<i64>,
  pub red: Option<i64>,
  pub delta_number: Option<i64>,
  pub delta_percentage: Option<f64>,
  pub startup: bool,
  pub remarks: String,
  pub created: String,
  pub press_id: String,
  pub press_name: String,
  pub performance: String,
}

/// Bookkeeping for incremental sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMetadata {
  /// Start of the last pass that completed successfully
  pub last_sync: DateTime<Utc>,
}

/// In-memory progress snapshot pushed to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
  pub loading: bool,
  pub status_text: String,
  /// Remote total, best known
  pub total_docs: u64,
  /// Local count, best known
  pub cached_docs: u64,
  /// Records applied by incremental checks since start (or the last purge)
  pub new_updates: u64,
  pub last_sync: Option<DateTime<Utc>>,
}

impl Default for CacheStatus {
  fn default() -> Self {
    Self {
      loading: true,
      status_text: STATUS_INITIALIZING.to_string(),
      total_docs: 0,
      cached_docs: 0,
      new_updates: 0,
      last_sync: None,
    }
  }
}

impl CacheStatus {
  /// Shallow merge: fields the patch leaves unset keep their value.
  pub fn apply(&mut self, patch: StatusPatch) {
    if let Some(loading) = patch.loading {
      self.loading = loading;
    }
    if let Some(text) = patch.status_text {
      self.status_text = text;
    }
    if let Some(total) = patch.total_docs {
      self.total_docs = total;
    }
    if let Some(cached) = patch.cached_docs {
      self.cached_docs = cached;
    }
    if let Some(new_updates) = patch.new_updates {
      self.new_updates = new_updates;
    }
    if let Some(last_sync) = patch.last_sync {
      self.last_sync = Some(last_sync);
    }
  }
}

/// Partial update of a [`CacheStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPatch {
  pub loading: Option<bool>,
  pub status_text: Option<String>,
  pub total_docs: Option<u64>,
  pub cached_docs: Option<u64>,
  pub new_updates: Option<u64>,
  pub last_sync: Option<DateTime<Utc>>,
}

impl StatusPatch {
  pub fn text(text: impl Into<String>) -> Self {
    Self {
      status_text: Some(text.into()),
      ..Self::default()
    }
  }

  pub fn loading(mut self, loading: bool) -> Self {
    self.loading = Some(loading);
    self
  }

  pub fn total_docs(mut self, total: u64) -> Self {
    self.total_docs = Some(total);
    self
  }

  pub fn cached_docs(mut self, cached: u64) -> Self {
    self.cached_docs = Some(cached);
    self
  }

  pub fn new_updates(mut self, new_updates: u64) -> Self {
    self.new_updates = Some(new_updates);
    self
  }

  pub fn last_sync(mut self, at: DateTime<Utc>) -> Self {
    self.last_sync = Some(at);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_initializing() {
    let status = CacheStatus::default();
    assert!(status.loading);
    assert_eq!(status.status_text, STATUS_INITIALIZING);
    assert_eq!(status.total_docs, 0);
    assert_eq!(status.cached_docs, 0);
    assert_eq!(status.new_updates, 0);
    assert!(status.last_sync.is_none());
  }

  #[test]
  fn test_apply_keeps_untouched_fields() {
    let mut status = CacheStatus::default();
    status.apply(StatusPatch::text("Downloading...").total_docs(120).cached_docs(50));
    status.apply(StatusPatch::text(STATUS_UP_TO_DATE).loading(false));

    assert!(!status.loading);
    assert_eq!(status.status_text, STATUS_UP_TO_DATE);
    assert_eq!(status.total_docs, 120);
    assert_eq!(status.cached_docs, 50);
  }
}
