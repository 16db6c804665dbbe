//! In-memory remote collection for tests. Records every call it receives.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{JobPayload, ListOptions, ListPage, RemoteCollection, RemoteJob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  Count(Option<String>),
  List { page: u32, per_page: u32, filter: Option<String> },
  ListAll(Option<String>),
  Create,
  Update(String),
  Delete(String),
}

#[derive(Default)]
pub struct FakeRemote {
  /// Records served by `count` and `list`, already in server sort order
  pub records: Mutex<Vec<Value>>,
  /// Records served by `list_all`
  pub updates: Mutex<Vec<Value>>,
  pub calls: Mutex<Vec<Call>>,
  pub fail: AtomicBool,
  /// Sleep inside `count`/`list_all`, simulating a slow server
  pub delay: Mutex<Option<Duration>>,
}

pub fn job_value(id: &str, press: &str, date: &str, created: &str) -> Value {
  json!({
    "id": id,
    "order_nr": format!("ORD-{}", id),
    "omschrijving": "Brochure",
    "date": date,
    "versie": "A",
    "pers": press,
    "created": created,
    "expand": {"pers": {"id": press, "naam": format!("Press {}", press)}}
  })
}

impl FakeRemote {
  pub fn with_records(count: usize) -> Self {
    let records = (0..count)
      .map(|i| {
        job_value(
          &format!("job{:04}", i),
          "P1",
          "2024-01-01",
          "2024-01-01 08:00:00.000Z",
        )
      })
      .collect();
    Self {
      records: Mutex::new(records),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn list_calls(&self) -> Vec<(u32, u32)> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::List { page, per_page, .. } => Some((page, per_page)),
        _ => None,
      })
      .collect()
  }

  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  fn record(&self, call: Call) -> Result<()> {
    self.calls.lock().unwrap().push(call);
    if self.fail.load(Ordering::SeqCst) {
      return Err(eyre!("remote unavailable"));
    }
    Ok(())
  }

  async fn maybe_delay(&self) {
    let delay = *self.delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
  }
}

#[async_trait]
impl RemoteCollection for FakeRemote {
  async fn count(&self, filter: Option<&str>) -> Result<u64> {
    self.record(Call::Count(filter.map(String::from)))?;
    self.maybe_delay().await;
    Ok(self.records.lock().unwrap().len() as u64)
  }

  async fn list(&self, page: u32, per_page: u32, options: &ListOptions) -> Result<ListPage> {
    self.record(Call::List {
      page,
      per_page,
      filter: options.filter.clone(),
    })?;
    tokio::task::yield_now().await;

    let records = self.records.lock().unwrap();
    let total = records.len();
    let per_page = per_page.max(1) as usize;
    let start = (page.saturating_sub(1) as usize) * per_page;
    let items = records
      .iter()
      .skip(start)
      .take(per_page)
      .cloned()
      .map(RemoteJob::from_value)
      .collect();

    Ok(ListPage {
      items,
      total_items: total as u64,
      total_pages: total.div_ceil(per_page) as u32,
    })
  }

  async fn list_all(&self, options: &ListOptions) -> Result<Vec<RemoteJob>> {
    self.record(Call::ListAll(options.filter.clone()))?;
    self.maybe_delay().await;
    let updates = self.updates.lock().unwrap().clone();
    Ok(updates.into_iter().map(RemoteJob::from_value).collect())
  }

  async fn create(&self, payload: &JobPayload) -> Result<RemoteJob> {
    self.record(Call::Create)?;
    let mut value = Value::Object(payload.clone());
    value["id"] = json!("created1");
    Ok(RemoteJob::from_value(value))
  }

  async fn update(&self, id: &str, payload: &JobPayload) -> Result<RemoteJob> {
    self.record(Call::Update(id.to_string()))?;
    let mut value = Value::Object(payload.clone());
    value["id"] = json!(id);
    Ok(RemoteJob::from_value(value))
  }

  async fn delete(&self, id: &str) -> Result<()> {
    self.record(Call::Delete(id.to_string()))
  }
}
