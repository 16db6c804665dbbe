//! Sync engine that keeps the local job cache in step with the remote
//! collection.
//!
//! A pass picks one of two strategies:
//! 1. Full resync when nothing has been synced yet or the cache is empty:
//!    a small first page for a fast first paint, then large pages for bulk
//! 2. Delta check otherwise: everything updated since the last sync, in one
//!    unpaginated call
//!
//! Only one pass runs at a time. Overlapping calls return immediately without
//! touching the remote.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::mapper::{map_remote_to_cache, DatumStyle};
use super::status::{JobsCallback, StatusCallback, StatusHub, Subscription};
use super::storage::{sort_newest_first, JobStore};
use super::types::{CacheStatus, CachedJob, StatusPatch, SyncMetadata, STATUS_UP_TO_DATE};
use crate::error::SyncError;
use crate::remote::api_types::value_as_i64;
use crate::remote::{
  Filter, JobPayload, ListOptions, RemoteCollection, RemoteJob, SORT_NEWEST_FIRST,
};
use crate::viewer::Viewer;

/// Size of the first page of a full resync.
pub const FIRST_PAGE_SIZE: u32 = 50;
/// Size of every later page of a full resync.
pub const BULK_PAGE_SIZE: u32 = 150;

pub const STATUS_DOWNLOADING: &str = "Downloading...";
pub const STATUS_CHECKING: &str = "Checking for updates...";
pub const STATUS_SYNC_FAILED: &str = "Sync failed";
pub const STATUS_CHECK_FAILED: &str = "Update check failed";
pub const STATUS_TIMED_OUT: &str = "Sync timed out";
pub const STATUS_SAVE_FAILED: &str = "Save failed";
pub const STATUS_PURGE_FAILED: &str = "Purge failed";

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
  /// Upper bound for a single pass
  pub timeout: Duration,
  pub datum_style: DatumStyle,
}

impl Default for SyncSettings {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(120),
      datum_style: DatumStyle::default(),
    }
  }
}

/// Which way a pass brings the cache up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
  FullResync,
  DeltaCheck { since: DateTime<Utc> },
}

/// Full resync unless there is both a previous sync and something cached.
pub fn choose_strategy(last_sync: Option<DateTime<Utc>>, local_count: u64) -> SyncStrategy {
  match last_sync {
    Some(since) if local_count > 0 => SyncStrategy::DeltaCheck { since },
    _ => SyncStrategy::FullResync,
  }
}

/// Releases the in-flight flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Orchestrates remote fetches, the local store and status reporting.
pub struct SyncEngine {
  remote: Arc<dyn RemoteCollection>,
  store: Arc<dyn JobStore>,
  hub: StatusHub,
  syncing: AtomicBool,
  settings: SyncSettings,
}

impl SyncEngine {
  pub fn new(
    remote: Arc<dyn RemoteCollection>,
    store: Arc<dyn JobStore>,
    settings: SyncSettings,
  ) -> Self {
    Self {
      remote,
      store,
      hub: StatusHub::new(),
      syncing: AtomicBool::new(false),
      settings,
    }
  }

  pub fn status(&self) -> CacheStatus {
    self.hub.status()
  }

  pub fn is_syncing(&self) -> bool {
    self.syncing.load(Ordering::Acquire)
  }

  fn try_begin(&self) -> Option<PassGuard<'_>> {
    self
      .syncing
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| PassGuard(&self.syncing))
  }

  // ==========================================================================
  // Observers
  // ==========================================================================

  /// Register a listener pair.
  ///
  /// `on_status` receives the current status before this returns, followed by
  /// the job list filtered for `viewer` (or the current viewer when `None`).
  pub fn subscribe(
    &self,
    on_jobs: JobsCallback,
    on_status: StatusCallback,
    viewer: Option<Viewer>,
  ) -> Subscription {
    let subscription = self.hub.register(on_jobs, on_status, viewer);

    if let Some(listener) = self.hub.job_listener(subscription.id()) {
      match self.jobs_from_cache(listener.viewer.as_ref()) {
        Ok(jobs) => listener.deliver(jobs),
        Err(e) => error!(error = %e, "failed to read cached jobs for new subscriber"),
      }
    }

    subscription
  }

  /// Cached jobs visible to `viewer`, newest first.
  pub fn jobs_from_cache(&self, viewer: Option<&Viewer>) -> Result<Vec<CachedJob>> {
    let mut jobs = self.store.query_all_sorted_by_date_desc()?;

    if let Some(press_id) = viewer.and_then(Viewer::restricted_press_id) {
      jobs.retain(|job| job.press_id == press_id);
    }
    sort_newest_first(&mut jobs);
    Ok(jobs)
  }

  /// Push fresh job lists to every listener, reading the store once per
  /// distinct viewer.
  fn notify_jobs(&self) -> Result<(), SyncError> {
    // Captured before reading the store so the newest capture carries the
    // newest lists
    let listeners = self.hub.job_listeners();
    let mut lists: HashMap<String, Vec<CachedJob>> = HashMap::new();

    for listener in listeners {
      let viewer = listener.viewer.as_ref();
      let key = viewer.map(Viewer::cache_key).unwrap_or_default();
      let jobs = match lists.get(&key) {
        Some(jobs) => jobs.clone(),
        None => {
          let jobs = self
            .jobs_from_cache(viewer)
            .map_err(SyncError::storage)?;
          lists.insert(key, jobs.clone());
          jobs
        }
      };
      listener.deliver(jobs);
    }
    Ok(())
  }

  // ==========================================================================
  // Sync entry points
  // ==========================================================================

  /// Bring the cache up to date for `viewer`.
  ///
  /// Does nothing if a pass is already running. Failures end up in the status
  /// text and the log, never in the caller.
  pub async fn sync(&self, viewer: &Viewer) {
    let Some(_guard) = self.try_begin() else {
      debug!("sync already in progress, skipping");
      return;
    };
    self.hub.set_current_viewer(viewer);

    let timeout = self.settings.timeout;
    match tokio::time::timeout(timeout, self.run_sync(viewer)).await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => error!(kind = e.kind(), error = %e, "sync failed"),
      Err(_) => self.report_timeout(SyncError::TimedOut(timeout)),
    }
  }

  /// Fetch records updated after `cutoff` (or the last sync, or the epoch)
  /// and merge them into the cache.
  ///
  /// `known_total` is the caller's idea of the remote total; the displayed
  /// total never drops below what is cached.
  pub async fn check_for_updates(
    &self,
    viewer: &Viewer,
    cutoff: Option<DateTime<Utc>>,
    known_total: Option<u64>,
  ) {
    let Some(_guard) = self.try_begin() else {
      debug!("sync already in progress, skipping update check");
      return;
    };
    self.hub.set_current_viewer(viewer);

    let timeout = self.settings.timeout;
    match tokio::time::timeout(timeout, self.delta_check(viewer, cutoff, known_total)).await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => error!(kind = e.kind(), error = %e, "update check failed"),
      Err(_) => self.report_timeout(SyncError::TimedOut(timeout)),
    }
  }

  fn report_timeout(&self, e: SyncError) {
    warn!(kind = e.kind(), error = %e, "sync pass abandoned");
    self
      .hub
      .update(StatusPatch::text(STATUS_TIMED_OUT).loading(false));
  }

  async fn run_sync(&self, viewer: &Viewer) -> Result<(), SyncError> {
    let strategy = match self.read_local_state() {
      Ok((last_sync, local_count)) => choose_strategy(last_sync, local_count),
      Err(e) => {
        self
          .hub
          .update(StatusPatch::text(STATUS_SYNC_FAILED).loading(false));
        return Err(e);
      }
    };

    match strategy {
      SyncStrategy::FullResync => {
        let result = self.full_resync(viewer).await;
        if result.is_err() {
          self
            .hub
            .update(StatusPatch::text(STATUS_SYNC_FAILED).loading(false));
        }
        result
      }
      SyncStrategy::DeltaCheck { since } => {
        let total = self.hub.status().total_docs;
        let known_total = (total > 0).then_some(total);
        self.delta_check(viewer, Some(since), known_total).await
      }
    }
  }

  fn read_local_state(&self) -> Result<(Option<DateTime<Utc>>, u64), SyncError> {
    let last_sync = self
      .store
      .get_sync_metadata()
      .map_err(SyncError::storage)?
      .map(|m| m.last_sync);
    let local_count = self.store.count().map_err(SyncError::storage)?;
    Ok((last_sync, local_count))
  }

  // ==========================================================================
  // Full resync
  // ==========================================================================

  async fn full_resync(&self, viewer: &Viewer) -> Result<(), SyncError> {
    let started = Utc::now();
    let filter = Filter::for_viewer(viewer);

    let total = self
      .remote
      .count(filter.to_expression().as_deref())
      .await
      .map_err(SyncError::remote)?;
    info!(total, filter = ?filter.to_expression(), "starting full resync");

    self.hub.update(
      StatusPatch::text(STATUS_DOWNLOADING)
        .loading(true)
        .total_docs(total),
    );

    let options = ListOptions::filtered(&filter).sorted(SORT_NEWEST_FIRST);

    let first = self
      .remote
      .list(1, FIRST_PAGE_SIZE, &options)
      .await
      .map_err(SyncError::remote)?;
    self.apply_page(first.items, viewer, total)?;
    self.mark_partially_fresh(started)?;

    // Page numbers depend on the page size, so the bulk pages start over at
    // page 1 instead of skipping the records between 50 and 150. This costs
    // one request more than continuing at page 2 (50, 150, 150, 150 for 350
    // records instead of 50, 150, 150); continuing at page 2 loses data.
    if first.total_pages > 1 {
      let mut page = 1;
      loop {
        let batch = self
          .remote
          .list(page, BULK_PAGE_SIZE, &options)
          .await
          .map_err(SyncError::remote)?;
        self.apply_page(batch.items, viewer, total)?;
        debug!(page, total_pages = batch.total_pages, "applied page");

        if page >= batch.total_pages {
          break;
        }
        page += 1;
      }
    }

    self.persist_last_sync(started)?;
    self
      .hub
      .update(StatusPatch::text(STATUS_UP_TO_DATE).loading(false));
    info!(total, "full resync complete");
    Ok(())
  }

  /// Store one page and report progress.
  ///
  /// `cached_docs` is clamped to the remote total so records left over from a
  /// different filter do not inflate it.
  fn apply_page(&self, items: Vec<RemoteJob>, viewer: &Viewer, total: u64) -> Result<(), SyncError> {
    let jobs = self.map_items(&items, viewer);
    self.store.upsert_many(&jobs).map_err(SyncError::storage)?;

    let local = self.store.count().map_err(SyncError::storage)?;
    let cached = local.min(total);
    self.hub.update(
      StatusPatch::text(format!("{} {}/{}", STATUS_DOWNLOADING, cached, total)).cached_docs(cached),
    );
    self.notify_jobs()
  }

  /// Record the sync as fresh after the first page of a full resync, so an
  /// interrupted download still skips the full resync on the next start.
  pub fn mark_partially_fresh(&self, at: DateTime<Utc>) -> Result<(), SyncError> {
    debug!(%at, "first page stored, marking cache fresh");
    self.persist_last_sync(at)
  }

  fn persist_last_sync(&self, at: DateTime<Utc>) -> Result<(), SyncError> {
    self
      .store
      .put_sync_metadata(&SyncMetadata { last_sync: at })
      .map_err(SyncError::storage)?;
    self.hub.update(StatusPatch::default().last_sync(at));
    Ok(())
  }

  fn map_items(&self, items: &[RemoteJob], viewer: &Viewer) -> Vec<CachedJob> {
    items
      .iter()
      .filter_map(|item| {
        let job = map_remote_to_cache(item, viewer, self.settings.datum_style);
        if job.id.is_empty() {
          warn!(order_nr = %job.order_nr, "skipping remote record without id");
          None
        } else {
          Some(job)
        }
      })
      .collect()
  }

  // ==========================================================================
  // Delta check
  // ==========================================================================

  async fn delta_check(
    &self,
    viewer: &Viewer,
    cutoff: Option<DateTime<Utc>>,
    known_total: Option<u64>,
  ) -> Result<(), SyncError> {
    let result = self.fetch_updates(viewer, cutoff, known_total).await;
    if result.is_err() {
      // loading is left alone; an outer pass may still be showing progress
      self.hub.update(StatusPatch::text(STATUS_CHECK_FAILED));
    }
    result
  }

  async fn fetch_updates(
    &self,
    viewer: &Viewer,
    cutoff: Option<DateTime<Utc>>,
    known_total: Option<u64>,
  ) -> Result<(), SyncError> {
    let started = Utc::now();
    let cutoff = match cutoff {
      Some(cutoff) => cutoff,
      None => self
        .store
        .get_sync_metadata()
        .map_err(SyncError::storage)?
        .map(|m| m.last_sync)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    };

    self.hub.update(StatusPatch::text(STATUS_CHECKING));
    let filter = Filter::for_viewer(viewer).updated_after(cutoff);
    debug!(%cutoff, "checking for updates");

    let items = self
      .remote
      .list_all(&ListOptions::filtered(&filter))
      .await
      .map_err(SyncError::remote)?;

    let jobs = self.map_items(&items, viewer);
    self.store.upsert_many(&jobs).map_err(SyncError::storage)?;

    let applied = jobs.len() as u64;
    let local = self.store.count().map_err(SyncError::storage)?;
    let total = known_total.map_or(local, |known| known.max(local));
    let new_updates = self.hub.status().new_updates + applied;

    if applied > 0 {
      info!(applied, "applied incremental updates");
      self.hub.update(
        StatusPatch::text(format!("Synced {} updates", applied))
          .new_updates(new_updates)
          .cached_docs(local)
          .total_docs(total),
      );
      self.notify_jobs()?;
    }

    self.persist_last_sync(started)?;
    self.hub.update(
      StatusPatch::text(STATUS_UP_TO_DATE)
        .loading(false)
        .new_updates(new_updates)
        .cached_docs(local)
        .total_docs(total),
    );
    Ok(())
  }

  // ==========================================================================
  // Single records
  // ==========================================================================

  /// Map and store one record that was just written remotely, then notify.
  pub fn put_record(&self, remote: &RemoteJob, viewer: &Viewer) {
    self.hub.set_current_viewer(viewer);
    if let Err(e) = self.store_single(remote, viewer) {
      error!(kind = e.kind(), error = %e, "failed to store record");
      self.hub.update(StatusPatch::text(STATUS_SAVE_FAILED));
    }
  }

  fn store_single(&self, remote: &RemoteJob, viewer: &Viewer) -> Result<(), SyncError> {
    let job = map_remote_to_cache(remote, viewer, self.settings.datum_style);
    if job.id.is_empty() {
      return Err(SyncError::storage(eyre!("record has no id")));
    }

    self.store.upsert_one(&job).map_err(SyncError::storage)?;
    let local = self.store.count().map_err(SyncError::storage)?;
    self.hub.update(StatusPatch::default().cached_docs(local));
    self.notify_jobs()
  }

  /// Create (`id` is `None`) or update a record remotely and mirror the
  /// result into the cache.
  pub async fn save_record(
    &self,
    id: Option<&str>,
    payload: JobPayload,
    viewer: &Viewer,
  ) -> Result<RemoteJob> {
    let payload = with_gross_total(payload);
    let saved = match id {
      Some(id) => self.remote.update(id, &payload).await?,
      None => self.remote.create(&payload).await?,
    };

    self.put_record(&saved, viewer);
    Ok(saved)
  }

  /// Delete a record remotely. The cached copy stays until a purge.
  pub async fn delete_remote(&self, id: &str) -> Result<()> {
    self.remote.delete(id).await?;
    info!(id, "deleted remote record, cached copy kept");
    Ok(())
  }

  // ==========================================================================
  // Purge
  // ==========================================================================

  /// Wipe the cache and start over from the initial status.
  pub fn purge(&self) {
    if let Err(e) = self.store.clear_all() {
      error!(error = %e, "failed to purge cache");
      self.hub.update(StatusPatch::text(STATUS_PURGE_FAILED));
      return;
    }

    self.syncing.store(false, Ordering::Release);
    self.hub.reset();
    for listener in self.hub.job_listeners() {
      listener.deliver(Vec::new());
    }
    info!("cache purged");
  }
}

/// Fill `max_bruto` with net run plus all switch counters, unset ones
/// counting as zero, unless the payload already carries a value.
fn with_gross_total(mut payload: JobPayload) -> JobPayload {
  let has_total = payload
    .get("max_bruto")
    .is_some_and(|v| value_as_i64(v).is_some());
  if has_total {
    return payload;
  }

  let field = |name: &str| payload.get(name).and_then(value_as_i64).unwrap_or(0);
  let total = field("netto_oplage")
    + (1..=5)
      .map(|n| field(&format!("wissel_{}", n)))
      .sum::<i64>();

  payload.insert("max_bruto".to_string(), Value::from(total));
  payload
}
