//! Fan-out of cache status and job lists to any number of listeners.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::types::{CacheStatus, CachedJob, StatusPatch};
use crate::viewer::Viewer;

/// Receives the viewer's job list after every change to the cache.
pub type JobsCallback = Arc<dyn Fn(Vec<CachedJob>) + Send + Sync>;

/// Receives the merged status after every status change.
pub type StatusCallback = Arc<dyn Fn(&CacheStatus) + Send + Sync>;

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  // Listener panics must not take the status down with them
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Last snapshot numbers handed to one subscriber.
#[derive(Default)]
struct Delivered {
  status: Option<u64>,
  jobs: Option<u64>,
}

/// Serializes deliveries to one subscriber and drops snapshots older than
/// the last one it saw.
#[derive(Default)]
struct DeliveryGate {
  delivered: Mutex<Delivered>,
}

impl DeliveryGate {
  fn status(&self, seq: u64, deliver: impl FnOnce()) {
    let mut delivered = lock_ignoring_poison(&self.delivered);
    if delivered.status.is_some_and(|last| seq <= last) {
      return;
    }
    delivered.status = Some(seq);
    deliver();
  }

  fn jobs(&self, seq: u64, deliver: impl FnOnce()) {
    let mut delivered = lock_ignoring_poison(&self.delivered);
    if delivered.jobs.is_some_and(|last| seq <= last) {
      return;
    }
    delivered.jobs = Some(seq);
    deliver();
  }
}

struct Subscriber {
  id: u64,
  on_jobs: JobsCallback,
  on_status: StatusCallback,
  viewer: Option<Viewer>,
  gate: Arc<DeliveryGate>,
}

#[derive(Default)]
struct HubState {
  status: CacheStatus,
  /// Number of the current status snapshot
  status_seq: u64,
  /// Number handed to the most recent job list
  jobs_seq: u64,
  subscribers: Vec<Subscriber>,
  next_id: u64,
  /// Viewer of the most recent caller that supplied one; used for
  /// subscribers registered without their own
  current_viewer: Option<Viewer>,
}

/// A job listener captured for one notification.
///
/// The list handed to [`JobListener::deliver`] must be read after the
/// listener was captured, so a later capture always carries newer data.
pub(crate) struct JobListener {
  /// Viewer the list should be filtered for
  pub viewer: Option<Viewer>,
  seq: u64,
  gate: Arc<DeliveryGate>,
  on_jobs: JobsCallback,
}

impl JobListener {
  pub fn deliver(&self, jobs: Vec<CachedJob>) {
    self.gate.jobs(self.seq, || (self.on_jobs)(jobs));
  }
}

/// Shared status plus the registered listeners.
///
/// Callbacks run outside the internal lock, in registration order. Each
/// subscriber receives snapshots one at a time and never an older one after
/// a newer one. A listener may read from the hub but must not push updates
/// from inside its callback.
#[derive(Clone, Default)]
pub struct StatusHub {
  state: Arc<Mutex<HubState>>,
}

impl StatusHub {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HubState> {
    lock_ignoring_poison(&self.state)
  }

  pub fn status(&self) -> CacheStatus {
    self.lock().status.clone()
  }

  pub fn current_viewer(&self) -> Option<Viewer> {
    self.lock().current_viewer.clone()
  }

  pub fn set_current_viewer(&self, viewer: &Viewer) {
    self.lock().current_viewer = Some(viewer.clone());
  }

  pub fn subscriber_count(&self) -> usize {
    self.lock().subscribers.len()
  }

  /// Add a listener and hand it the current status right away.
  pub fn register(
    &self,
    on_jobs: JobsCallback,
    on_status: StatusCallback,
    viewer: Option<Viewer>,
  ) -> Subscription {
    let gate = Arc::new(DeliveryGate::default());
    let (id, seq, status) = {
      let mut state = self.lock();
      let id = state.next_id;
      state.next_id += 1;
      if let Some(viewer) = &viewer {
        state.current_viewer = Some(viewer.clone());
      }
      state.subscribers.push(Subscriber {
        id,
        on_jobs,
        on_status: Arc::clone(&on_status),
        viewer,
        gate: Arc::clone(&gate),
      });
      (id, state.status_seq, state.status.clone())
    };

    gate.status(seq, || on_status(&status));

    Subscription {
      id,
      state: Arc::downgrade(&self.state),
      active: AtomicBool::new(true),
    }
  }

  /// Merge `patch` into the shared status and push the result to everyone.
  pub fn update(&self, patch: StatusPatch) -> CacheStatus {
    let (seq, status, listeners) = {
      let mut state = self.lock();
      state.status.apply(patch);
      state.status_seq += 1;
      let listeners: Vec<(Arc<DeliveryGate>, StatusCallback)> = state
        .subscribers
        .iter()
        .map(|s| (Arc::clone(&s.gate), Arc::clone(&s.on_status)))
        .collect();
      (state.status_seq, state.status.clone(), listeners)
    };

    for (gate, listener) in listeners {
      gate.status(seq, || listener(&status));
    }
    status
  }

  /// Back to the initial status with no current viewer, pushed to everyone.
  pub fn reset(&self) -> CacheStatus {
    {
      let mut state = self.lock();
      state.status = CacheStatus::default();
      state.current_viewer = None;
    }
    self.update(StatusPatch::default())
  }

  /// Job listeners in registration order, each with the viewer its list
  /// should be filtered for.
  pub(crate) fn job_listeners(&self) -> Vec<JobListener> {
    let mut guard = self.lock();
    guard.jobs_seq += 1;
    let state = &*guard;
    state
      .subscribers
      .iter()
      .map(|s| capture(s, state.current_viewer.as_ref(), state.jobs_seq))
      .collect()
  }

  /// Listener and effective viewer for a single subscription.
  pub(crate) fn job_listener(&self, id: u64) -> Option<JobListener> {
    let mut guard = self.lock();
    guard.jobs_seq += 1;
    let state = &*guard;
    state
      .subscribers
      .iter()
      .find(|s| s.id == id)
      .map(|s| capture(s, state.current_viewer.as_ref(), state.jobs_seq))
  }
}

fn capture(subscriber: &Subscriber, current_viewer: Option<&Viewer>, seq: u64) -> JobListener {
  JobListener {
    viewer: subscriber.viewer.clone().or_else(|| current_viewer.cloned()),
    seq,
    gate: Arc::clone(&subscriber.gate),
    on_jobs: Arc::clone(&subscriber.on_jobs),
  }
}

/// Handle returned by [`StatusHub::register`].
pub struct Subscription {
  id: u64,
  state: Weak<Mutex<HubState>>,
  active: AtomicBool,
}

impl Subscription {
  pub fn id(&self) -> u64 {
    self.id
  }

  /// Remove this listener. Calling it again does nothing.
  pub fn unsubscribe(&self) {
    if !self.active.swap(false, Ordering::SeqCst) {
      return;
    }
    if let Some(state) = self.state.upgrade() {
      lock_ignoring_poison(&state)
        .subscribers
        .retain(|s| s.id != self.id);
    }
  }
}
