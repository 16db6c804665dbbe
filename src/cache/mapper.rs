//! Turns remote job records into their cached projection.

use serde::Deserialize;
use serde_json::Value;

use super::types::CachedJob;
use crate::remote::RemoteJob;
use crate::viewer::Viewer;

/// Fixed display value; performance is not computed yet.
pub const PERFORMANCE_DISPLAY: &str = "100%";

/// How the locale copy of the job date is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatumStyle {
  /// `DD.MM.YYYY`
  #[default]
  Long,
  /// `DD-MM`
  Short,
}

/// Map one remote record for the given viewer.
///
/// Never fails: missing or malformed fields fall back to empty strings and
/// `None`, so one bad record cannot sink a page.
pub fn map_remote_to_cache(remote: &RemoteJob, viewer: &Viewer, style: DatumStyle) -> CachedJob {
  let date = job_date(remote);
  let press_id = remote.pers.clone().unwrap_or_default();

  CachedJob {
    id: remote.id.clone().unwrap_or_default(),
    order_nr: remote.order_nr.clone().unwrap_or_default(),
    order_name: remote.omschrijving.clone().unwrap_or_default(),
    datum: format_datum(&date, style),
    date,
    version: remote.versie.clone().unwrap_or_default(),
    pages: remote.pages,
    ex_omw: value_to_display(&remote.ex_omw),
    net_run: remote.netto_oplage,
    switch_counts: remote.switch_counts(),
    max_gross: remote.max_bruto,
    green: remote.groen,
    red: remote.rood,
    delta_number: remote.delta_nummer,
    delta_percentage: remote.delta_percentage,
    startup: is_truthy(&remote.opstart),
    remarks: remote.opmerking.clone().unwrap_or_default(),
    created: remote.created.clone().unwrap_or_default(),
    press_name: press_name_for(remote, &press_id, viewer),
    press_id,
    performance: PERFORMANCE_DISPLAY.to_string(),
  }
}

/// The viewer's own press label replaces whatever the server expanded when
/// they are restricted to that press.
fn press_name_for(remote: &RemoteJob, press_id: &str, viewer: &Viewer) -> String {
  let expanded = remote.expanded_press_name().unwrap_or_default();

  match (viewer.restricted_press_id(), viewer.user.press.as_deref()) {
    (Some(own_id), Some(own_name)) if own_id == press_id => own_name.to_string(),
    _ => expanded.to_string(),
  }
}

/// `YYYY-MM-DD` from `date`, or from `created` when `date` is empty.
fn job_date(remote: &RemoteJob) -> String {
  [remote.date.as_deref(), remote.created.as_deref()]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(date_part)
    .unwrap_or_default()
}

fn date_part(timestamp: &str) -> String {
  let head = timestamp.split(' ').next().unwrap_or(timestamp);
  // RFC 3339 values use `T` instead of a space
  head.split('T').next().unwrap_or(head).to_string()
}

/// Reverse `YYYY-MM-DD` into the locale form. Anything that does not have
/// three segments is returned unchanged.
pub fn format_datum(date: &str, style: DatumStyle) -> String {
  let parts: Vec<&str> = date.split('-').collect();
  match (parts.as_slice(), style) {
    ([year, month, day], DatumStyle::Long) => format!("{}.{}.{}", day, month, year),
    ([_, month, day], DatumStyle::Short) => format!("{}-{}", day, month),
    _ => date.to_string(),
  }
}

fn value_to_display(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    _ => String::new(),
  }
}

/// Truthiness as the remote clients understand it.
fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}
