use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{DatumStyle, SqliteStore, SyncSettings};
use crate::viewer::Viewer;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  /// Who is looking at the cache and what they may see
  #[serde(default)]
  pub viewer: Viewer,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub display: DisplayConfig,
  /// Override for the SQLite cache location
  pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub url: String,
  #[serde(default = "default_collection")]
  pub collection: String,
}

fn default_collection() -> String {
  "drukwerken".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Seconds between background syncs in the terminal viewer
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  /// Seconds before a hanging pass is abandoned
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
  300
}

fn default_timeout_secs() -> u64 {
  120
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl SyncConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs.max(1))
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DisplayConfig {
  #[serde(default)]
  pub datum_style: DatumStyle,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pressjobs.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pressjobs/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/pressjobs/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pressjobs.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pressjobs").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Where the job cache lives.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache_path {
      Some(path) => Ok(path.clone()),
      None => SqliteStore::default_path(),
    }
  }

  pub fn sync_settings(&self) -> SyncSettings {
    SyncSettings {
      timeout: Duration::from_secs(self.sync.timeout_secs.max(1)),
      datum_style: self.display.datum_style,
    }
  }

  /// API token from the environment, if one is set.
  ///
  /// Checks PRESSJOBS_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("PRESSJOBS_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}
