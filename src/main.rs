use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use pressjobs::app::App;
use pressjobs::cache::{CacheStatus, CachedJob, SqliteStore, SyncEngine};
use pressjobs::config::Config;
use pressjobs::logging;
use pressjobs::remote::{CollectionClient, JobPayload};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pressjobs")]
#[command(about = "Offline-first cache and sync for finished print-press jobs")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pressjobs/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Interactive job table (default)
  Tui,
  /// Run one sync pass and print the result
  Sync,
  /// Check for records updated since a cutoff
  Check {
    /// Cutoff as RFC 3339; defaults to the last sync
    #[arg(long)]
    since: Option<DateTime<Utc>>,
    /// Remote total to report when nothing larger is cached
    #[arg(long)]
    known_total: Option<u64>,
  },
  /// Print the cached jobs visible to the configured viewer
  List,
  /// Wipe the local cache
  Purge,
  /// Create or update a remote record from a JSON file and cache it
  Save {
    #[arg(long)]
    file: PathBuf,
    /// Record to update; creates a new one when omitted
    #[arg(long)]
    id: Option<String>,
  },
  /// Delete a remote record (the cached copy is kept)
  Delete {
    #[arg(long)]
    id: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  let config = Config::load(args.config.as_deref())?;
  let engine = build_engine(&config)?;
  let viewer = config.viewer.clone();

  match args.command.unwrap_or(Command::Tui) {
    Command::Tui => {
      let mut app = App::new(config, engine);
      app.run().await?;
    }
    Command::Sync => {
      engine.sync(&viewer).await;
      print_status(&engine.status());
    }
    Command::Check { since, known_total } => {
      engine.check_for_updates(&viewer, since, known_total).await;
      print_status(&engine.status());
    }
    Command::List => {
      print_jobs(&engine.jobs_from_cache(Some(&viewer))?);
    }
    Command::Purge => {
      engine.purge();
      print_status(&engine.status());
    }
    Command::Save { file, id } => {
      let payload = read_payload(&file)?;
      let saved = engine.save_record(id.as_deref(), payload, &viewer).await?;
      println!("saved {}", saved.id.unwrap_or_default());
      print_status(&engine.status());
    }
    Command::Delete { id } => {
      engine.delete_remote(&id).await?;
      println!("deleted {}", id);
    }
  }

  Ok(())
}

fn build_engine(config: &Config) -> Result<Arc<SyncEngine>> {
  let cache_path = config.cache_path()?;
  let store = SqliteStore::open(&cache_path)?;
  let client = CollectionClient::new(&config.server)?;
  info!(cache = %cache_path.display(), server = %config.server.url, "engine ready");

  Ok(Arc::new(SyncEngine::new(
    Arc::new(client),
    Arc::new(store),
    config.sync_settings(),
  )))
}

fn read_payload(path: &Path) -> Result<JobPayload> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&contents)
    .map_err(|e| eyre!("{} is not a JSON object: {}", path.display(), e))
}

fn print_status(status: &CacheStatus) {
  let last_sync = status
    .last_sync
    .map(|t| t.to_rfc3339())
    .unwrap_or_else(|| "never".to_string());
  println!(
    "{} | {}/{} cached | {} updates | last sync {}",
    status.status_text, status.cached_docs, status.total_docs, status.new_updates, last_sync
  );
}

fn print_jobs(jobs: &[CachedJob]) {
  for job in jobs {
    println!(
      "{:<24} {:<12} {:<14} {:<16} net {:>7} green {:>6} red {:>6}",
      job.datum,
      job.order_nr,
      job.version,
      job.press_name,
      job.net_run.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
      job.green.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
      job.red.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
    );
  }
  println!("{} jobs", jobs.len());
}
