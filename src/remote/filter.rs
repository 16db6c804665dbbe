//! Builder for the remote collection's filter expressions.
//!
//! The grammar is `field op "literal"` clauses joined with `&&`, where a field
//! may walk a relation with dot access (`pers.naam`).

use chrono::{DateTime, Utc};

use crate::viewer::Viewer;

/// Timestamp layout the server compares `updated` against.
pub const FILTER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A conjunction of filter clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  clauses: Vec<String>,
}

impl Filter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Visibility filter for a viewer: nothing for users who may see every
  /// press, otherwise their own press by id, or by name when only the name is
  /// known.
  pub fn for_viewer(viewer: &Viewer) -> Self {
    let mut filter = Self::new();
    if viewer.can_view_all() {
      return filter;
    }

    let press_id = viewer.user.press_id.as_deref().filter(|p| !p.is_empty());
    let press_name = viewer.user.press.as_deref().filter(|p| !p.is_empty());

    if let Some(id) = press_id {
      filter.push_eq("pers", id);
    } else if let Some(name) = press_name {
      filter.push_eq("pers.naam", name);
    }
    filter
  }

  pub fn push_eq(&mut self, field: &str, value: &str) {
    self.clauses.push(format!("{} = {}", field, quote(value)));
  }

  pub fn updated_after(mut self, cutoff: DateTime<Utc>) -> Self {
    self.clauses.push(format!(
      "updated > {}",
      quote(&cutoff.format(FILTER_TIME_FORMAT).to_string())
    ));
    self
  }

  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty()
  }

  /// Render the expression, `None` when there is nothing to filter on.
  pub fn to_expression(&self) -> Option<String> {
    if self.clauses.is_empty() {
      None
    } else {
      Some(self.clauses.join(" && "))
    }
  }
}

fn quote(value: &str) -> String {
  let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
  format!("\"{}\"", escaped)
}
