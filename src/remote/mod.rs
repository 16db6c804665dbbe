//! Access to the remote job collection.
//!
//! The sync engine only talks to [`RemoteCollection`]; [`client::CollectionClient`]
//! implements it over HTTP.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod filter;

use async_trait::async_trait;
use color_eyre::Result;
use serde_json::{Map, Value};

pub use api_types::RemoteJob;
pub use client::CollectionClient;
pub use filter::Filter;

/// Sort order used for the full download: newest job date first, then newest
/// creation.
pub const SORT_NEWEST_FIRST: &str = "-date,-created";

/// Relation expanded on every read so the press display name comes along.
pub const EXPAND_PRESS: &str = "pers";

/// Body of a create or update call.
pub type JobPayload = Map<String, Value>;

/// Query options shared by the list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
  pub sort: Option<String>,
  pub expand: Option<String>,
  pub filter: Option<String>,
}

impl ListOptions {
  pub fn filtered(filter: &Filter) -> Self {
    Self {
      filter: filter.to_expression(),
      expand: Some(EXPAND_PRESS.to_string()),
      ..Self::default()
    }
  }

  pub fn sorted(mut self, sort: &str) -> Self {
    self.sort = Some(sort.to_string());
    self
  }
}

/// One page of a paginated list call.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
  pub items: Vec<RemoteJob>,
  pub total_items: u64,
  pub total_pages: u32,
}

/// A generic paginated record collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
  /// Number of records matching `filter`.
  async fn count(&self, filter: Option<&str>) -> Result<u64>;

  /// One page of records. Pages are 1-based.
  async fn list(&self, page: u32, per_page: u32, options: &ListOptions) -> Result<ListPage>;

  /// Every matching record without pagination.
  async fn list_all(&self, options: &ListOptions) -> Result<Vec<RemoteJob>>;

  async fn create(&self, payload: &JobPayload) -> Result<RemoteJob>;

  async fn update(&self, id: &str, payload: &JobPayload) -> Result<RemoteJob>;

  async fn delete(&self, id: &str) -> Result<()>;
}
