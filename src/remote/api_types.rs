//! Serde-deserializable types matching the remote collection's responses.
//!
//! Records come from a schemaless store edited by hand, so every field is read
//! leniently: a value of the wrong type turns into `None` instead of failing
//! the whole page.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Job record
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteJob {
  #[serde(default, deserialize_with = "lenient_string")]
  pub id: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub order_nr: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub omschrijving: Option<String>,
  /// Either `YYYY-MM-DD` or a full `YYYY-MM-DD HH:MM:SS.sssZ` timestamp
  #[serde(default, deserialize_with = "lenient_string")]
  pub date: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub versie: Option<String>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub pages: Option<i64>,
  #[serde(default)]
  pub ex_omw: Value,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub netto_oplage: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub wissel_1: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub wissel_2: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub wissel_3: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub wissel_4: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub wissel_5: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub max_bruto: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub groen: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub rood: Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub delta_nummer: Option<i64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub delta_percentage: Option<f64>,
  #[serde(default)]
  pub opstart: Value,
  #[serde(default, deserialize_with = "lenient_string")]
  pub opmerking: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub created: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub updated: Option<String>,
  /// Press relation id
  #[serde(default, deserialize_with = "lenient_string")]
  pub pers: Option<String>,
  #[serde(default)]
  pub expand: Value,
}

impl RemoteJob {
  /// Convert one raw item. Anything that is not even an object becomes an
  /// empty record rather than an error.
  pub fn from_value(value: Value) -> Self {
    // Arrays would otherwise fill the fields by position
    if !value.is_object() {
      return Self::default();
    }
    serde_json::from_value(value).unwrap_or_default()
  }

  pub fn switch_counts(&self) -> [Option<i64>; 5] {
    [
      self.wissel_1,
      self.wissel_2,
      self.wissel_3,
      self.wissel_4,
      self.wissel_5,
    ]
  }

  /// `expand.pers.naam`, the press display name the server resolved.
  pub fn expanded_press_name(&self) -> Option<&str> {
    self
      .expand
      .get("pers")
      .and_then(|p| p.get("naam"))
      .and_then(Value::as_str)
  }
}

// ============================================================================
// List endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  #[serde(default)]
  pub page: u32,
  #[serde(rename = "perPage", default)]
  pub per_page: u32,
  #[serde(rename = "totalItems", default)]
  pub total_items: u64,
  #[serde(rename = "totalPages", default)]
  pub total_pages: u32,
  #[serde(default)]
  pub items: Vec<Value>,
}

// ============================================================================
// Lenient field readers
// ============================================================================

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(match value {
    Value::String(s) => Some(s),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(value_as_i64(&value))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  })
}

pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
    Value::String(s) => {
      let s = s.trim();
      s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
    }
    _ => None,
  }
}
