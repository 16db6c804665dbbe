//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::cache::SyncEngine;
use crate::viewer::Viewer;

/// Run `sync` every `every` until the returned handle is aborted.
///
/// The first sync is left to the caller; the first tick fires one interval
/// from now. A tick that lands while a pass is still running is absorbed by
/// the engine's in-flight check.
pub fn spawn_interval_sync(engine: Arc<SyncEngine>, viewer: Viewer, every: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      debug!("interval sync");
      engine.sync(&viewer).await;
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{JobStore, SqliteStore, SyncSettings};
  use crate::remote::fake::{Call, FakeRemote};
  use crate::viewer::VIEW_ALL_PRESSES;

  #[tokio::test]
  async fn test_interval_runs_sync_repeatedly() {
    let remote = Arc::new(FakeRemote::with_records(3));
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let engine = Arc::new(SyncEngine::new(
      remote.clone(),
      store.clone(),
      SyncSettings::default(),
    ));
    let viewer = Viewer::new(Default::default(), [VIEW_ALL_PRESSES]);

    let handle = spawn_interval_sync(engine, viewer, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(110)).await;
    handle.abort();

    // first pass downloads, later ones are delta checks
    let calls = remote.calls();
    assert!(matches!(calls.first(), Some(Call::Count(None))));
    assert!(calls.iter().filter(|c| matches!(c, Call::ListAll(_))).count() >= 1);
    assert_eq!(store.count().unwrap(), 3);
  }
}
