//! Durable job store trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::types::{CachedJob, SyncMetadata, SYNC_META_KEY};

/// Trait for durable job storage backends.
///
/// Every write replaces whole records keyed by `id`; there is no partial
/// update.
pub trait JobStore: Send + Sync {
  /// Insert or replace each record by id.
  fn upsert_many(&self, jobs: &[CachedJob]) -> Result<()>;

  fn upsert_one(&self, job: &CachedJob) -> Result<()> {
    self.upsert_many(std::slice::from_ref(job))
  }

  fn count(&self) -> Result<u64>;

  /// All records, newest `date` first, ties broken by newest `created`.
  fn query_all_sorted_by_date_desc(&self) -> Result<Vec<CachedJob>>;

  /// Records sharing an order number and version. Duplicates are normal.
  fn find_by_order(&self, order_nr: &str, version: &str) -> Result<Vec<CachedJob>>;

  fn get_sync_metadata(&self) -> Result<Option<SyncMetadata>>;

  fn put_sync_metadata(&self, meta: &SyncMetadata) -> Result<()>;

  /// Drop every job and the sync metadata.
  fn clear_all(&self) -> Result<()>;
}

/// SQLite-based job store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the store at `path`, creating parent directories.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Store that lives only as long as the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pressjobs").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Cached jobs; data holds the full JSON projection
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    order_nr TEXT NOT NULL,
    version TEXT NOT NULL,
    date TEXT NOT NULL,
    created TEXT NOT NULL,
    press_id TEXT NOT NULL,
    data BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_order_version ON jobs(order_nr, version);
CREATE INDEX IF NOT EXISTS idx_jobs_date ON jobs(date);

-- Single-row sync bookkeeping
CREATE TABLE IF NOT EXISTS sync_meta (
    key TEXT PRIMARY KEY,
    last_sync TEXT NOT NULL
);
"#;

impl JobStore for SqliteStore {
  fn upsert_many(&self, jobs: &[CachedJob]) -> Result<()> {
    if jobs.is_empty() {
      return Ok(());
    }

    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    {
      let mut stmt = tx
        .prepare(
          "INSERT OR REPLACE INTO jobs (id, order_nr, version, date, created, press_id, data)
           VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .map_err(|e| eyre!("Failed to prepare upsert: {}", e))?;

      for job in jobs {
        let data =
          serde_json::to_vec(job).map_err(|e| eyre!("Failed to serialize job: {}", e))?;
        stmt
          .execute(params![
            job.id,
            job.order_nr,
            job.version,
            job.date,
            job.created,
            job.press_id,
            data
          ])
          .map_err(|e| eyre!("Failed to store job {}: {}", job.id, e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn count(&self) -> Result<u64> {
    let conn = self.lock()?;
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count jobs: {}", e))?;
    Ok(count.max(0) as u64)
  }

  fn query_all_sorted_by_date_desc(&self) -> Result<Vec<CachedJob>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT data FROM jobs ORDER BY date DESC")
      .map_err(|e| eyre!("Failed to prepare job query: {}", e))?;

    let mut jobs = decode_rows(&mut stmt, [])?;
    sort_newest_first(&mut jobs);
    Ok(jobs)
  }

  fn find_by_order(&self, order_nr: &str, version: &str) -> Result<Vec<CachedJob>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT data FROM jobs WHERE order_nr = ? AND version = ?")
      .map_err(|e| eyre!("Failed to prepare order lookup: {}", e))?;

    let mut jobs = decode_rows(&mut stmt, params![order_nr, version])?;
    sort_newest_first(&mut jobs);
    Ok(jobs)
  }

  fn get_sync_metadata(&self) -> Result<Option<SyncMetadata>> {
    let conn = self.lock()?;
    let last_sync: Option<String> = conn
      .query_row(
        "SELECT last_sync FROM sync_meta WHERE key = ?",
        params![SYNC_META_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read sync metadata: {}", e))?;

    last_sync
      .map(|s| {
        DateTime::parse_from_rfc3339(&s)
          .map(|dt| SyncMetadata {
            last_sync: dt.with_timezone(&Utc),
          })
          .map_err(|e| eyre!("Failed to parse last sync '{}': {}", s, e))
      })
      .transpose()
  }

  fn put_sync_metadata(&self, meta: &SyncMetadata) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO sync_meta (key, last_sync) VALUES (?, ?)",
        params![SYNC_META_KEY, meta.last_sync.to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to write sync metadata: {}", e))?;
    Ok(())
  }

  fn clear_all(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch("DELETE FROM jobs; DELETE FROM sync_meta;")
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
    Ok(())
  }
}

fn decode_rows<P: rusqlite::Params>(stmt: &mut rusqlite::Statement<'_>, params: P) -> Result<Vec<CachedJob>> {
  let rows = stmt
    .query_map(params, |row| row.get::<_, Vec<u8>>(0))
    .map_err(|e| eyre!("Failed to query jobs: {}", e))?;

  let mut jobs = Vec::new();
  for data in rows {
    let data = data.map_err(|e| eyre!("Failed to read job row: {}", e))?;
    let job =
      serde_json::from_slice(&data).map_err(|e| eyre!("Failed to deserialize job: {}", e))?;
    jobs.push(job);
  }
  Ok(jobs)
}

/// `date` descending, then `created` descending. The date column only has
/// day precision, so the second key orders jobs finished on the same day.
pub fn sort_newest_first(jobs: &mut [CachedJob]) {
  jobs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created.cmp(&a.created)));
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn job(id: &str, date: &str, created: &str) -> CachedJob {
    CachedJob {
      id: id.into(),
      order_nr: "100".into(),
      version: "A".into(),
      date: date.into(),
      created: created.into(),
      press_id: "P1".into(),
      ..CachedJob::default()
    }
  }

  #[test]
  fn test_upsert_is_idempotent_last_write_wins() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut first = job("a", "2024-01-01", "2024-01-01 08:00:00");
    first.remarks = "first".into();
    let mut second = first.clone();
    second.remarks = "second".into();

    store.upsert_many(&[first]).unwrap();
    store.upsert_many(&[second]).unwrap();

    let all = store.query_all_sorted_by_date_desc().unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(all[0].remarks, "second");
  }

  #[test]
  fn test_sorted_by_date_then_created() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .upsert_many(&[
        job("old", "2024-01-01", "2024-01-01 08:00:00"),
        job("early", "2024-02-01", "2024-02-01 06:00:00"),
        job("late", "2024-02-01", "2024-02-01 18:00:00"),
      ])
      .unwrap();

    let ids: Vec<String> = store
      .query_all_sorted_by_date_desc()
      .unwrap()
      .into_iter()
      .map(|j| j.id)
      .collect();
    assert_eq!(ids, vec!["late", "early", "old"]);
  }

  #[test]
  fn test_find_by_order_returns_duplicates() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut other = job("c", "2024-01-01", "x");
    other.version = "B".into();
    store
      .upsert_many(&[job("a", "2024-01-01", "x"), job("b", "2024-01-02", "y"), other])
      .unwrap();

    let found = store.find_by_order("100", "A").unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, "b");
  }

  #[test]
  fn test_sync_metadata_roundtrip_and_clear() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.get_sync_metadata().unwrap().is_none());

    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    store.put_sync_metadata(&SyncMetadata { last_sync: at }).unwrap();
    store.upsert_one(&job("a", "2024-01-01", "x")).unwrap();
    assert_eq!(store.get_sync_metadata().unwrap().unwrap().last_sync, at);

    store.clear_all().unwrap();
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.get_sync_metadata().unwrap().is_none());
  }

  #[test]
  fn test_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let store = SqliteStore::open(&path).unwrap();
      store.upsert_one(&job("a", "2024-01-01", "x")).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
  }
}
