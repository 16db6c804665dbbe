//! Failure classes of a sync pass.

use std::time::Duration;
use thiserror::Error;

/// Why a sync pass stopped.
///
/// The class is only used for logging; every class degrades the visible
/// status the same way.
#[derive(Debug, Error)]
pub enum SyncError {
  /// The remote collection could not be reached or answered with an error
  #[error("remote collection: {0}")]
  Remote(color_eyre::Report),

  /// The local cache could not be read or written
  #[error("local cache: {0}")]
  Storage(color_eyre::Report),

  /// The pass did not finish within the configured deadline
  #[error("sync did not finish within {0:?}")]
  TimedOut(Duration),
}

impl SyncError {
  pub fn remote(report: color_eyre::Report) -> Self {
    Self::Remote(report)
  }

  pub fn storage(report: color_eyre::Report) -> Self {
    Self::Storage(report)
  }

  /// Short label for log fields.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Remote(_) => "remote",
      Self::Storage(_) => "storage",
      Self::TimedOut(_) => "timeout",
    }
  }
}
