//! The user looking at the job list and what they are allowed to see.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Permission that lifts the own-press restriction.
pub const VIEW_ALL_PRESSES: &str = "view_all";

/// Authenticated user as far as the cache cares about it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
  #[serde(default, alias = "user_id")]
  pub id: String,
  /// Identifier of the press this user works on
  pub press_id: Option<String>,
  /// Display name of that press
  pub press: Option<String>,
}

/// A user together with the permissions granted to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Viewer {
  #[serde(flatten)]
  pub user: User,
  #[serde(default)]
  pub permissions: BTreeSet<String>,
}

impl Viewer {
  pub fn new(user: User, permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      user,
      permissions: permissions.into_iter().map(Into::into).collect(),
    }
  }

  pub fn has_permission(&self, permission: &str) -> bool {
    self.permissions.contains(permission)
  }

  pub fn can_view_all(&self) -> bool {
    self.has_permission(VIEW_ALL_PRESSES)
  }

  /// Press the viewer is restricted to, or `None` when they may see every press.
  pub fn restricted_press_id(&self) -> Option<&str> {
    if self.can_view_all() {
      None
    } else {
      self.user.press_id.as_deref().filter(|p| !p.is_empty())
    }
  }

  /// Stable key identifying everything that influences what this viewer sees.
  ///
  /// Two viewers with the same key materialize the same job list.
  pub fn cache_key(&self) -> String {
    let input = format!(
      "{}|{}|{}|{}",
      self.user.id,
      self.user.press_id.as_deref().unwrap_or(""),
      self.user.press.as_deref().unwrap_or(""),
      self.can_view_all()
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn operator(press_id: &str) -> Viewer {
    Viewer::new(
      User {
        id: "u1".into(),
        press_id: Some(press_id.into()),
        press: Some("Press One".into()),
      },
      Vec::<String>::new(),
    )
  }

  #[test]
  fn test_restricted_without_view_all() {
    assert_eq!(operator("P1").restricted_press_id(), Some("P1"));
  }

  #[test]
  fn test_view_all_lifts_restriction() {
    let mut viewer = operator("P1");
    viewer.permissions.insert(VIEW_ALL_PRESSES.to_string());
    assert_eq!(viewer.restricted_press_id(), None);
  }

  #[test]
  fn test_empty_press_id_is_not_a_restriction() {
    assert_eq!(operator("").restricted_press_id(), None);
  }

  #[test]
  fn test_cache_key_tracks_permissions() {
    let plain = operator("P1");
    let mut admin = operator("P1");
    admin.permissions.insert(VIEW_ALL_PRESSES.to_string());

    assert_eq!(plain.cache_key(), operator("P1").cache_key());
    assert_ne!(plain.cache_key(), admin.cache_key());
    assert_ne!(plain.cache_key(), operator("P2").cache_key());
  }
}
