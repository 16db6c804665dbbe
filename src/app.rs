use crate::cache::{CacheStatus, CachedJob, JobsCallback, StatusCallback, SyncEngine};
use crate::commands;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::scheduler::spawn_interval_sync;
use crate::ui;
use crate::viewer::Viewer;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::TableState;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Main application state
pub struct App {
  config: Config,
  engine: Arc<SyncEngine>,
  viewer: Viewer,

  /// Latest job list pushed by the engine
  jobs: Vec<CachedJob>,
  /// Latest status pushed by the engine
  status: CacheStatus,
  table_state: TableState,

  mode: Mode,
  /// Command input buffer (after pressing :)
  command_input: String,
  selected_suggestion: usize,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, engine: Arc<SyncEngine>) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let viewer = config.viewer.clone();
    let status = engine.status();

    Self {
      config,
      engine,
      viewer,
      jobs: Vec::new(),
      status,
      table_state: TableState::default(),
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    let jobs_tx = events.sender();
    let status_tx = events.sender();
    let on_jobs: JobsCallback = Arc::new(move |jobs: Vec<CachedJob>| {
      let _ = jobs_tx.send(Event::Jobs(jobs));
    });
    let on_status: StatusCallback = Arc::new(move |status: &CacheStatus| {
      let _ = status_tx.send(Event::Status(status.clone()));
    });
    let subscription = self
      .engine
      .subscribe(on_jobs, on_status, Some(self.viewer.clone()));

    self.start_sync();
    let scheduler = spawn_interval_sync(
      Arc::clone(&self.engine),
      self.viewer.clone(),
      self.config.sync.interval(),
    );
    info!(every = ?self.config.sync.interval(), "terminal viewer started");

    let result = self.event_loop(&mut terminal, &mut events).await;

    scheduler.abort();
    subscription.unsubscribe();

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {}
      Event::Jobs(jobs) => {
        self.jobs = jobs;
        ui::ensure_valid_selection(&mut self.table_state, self.jobs.len());
      }
      Event::Status(status) => self.status = status,
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      KeyCode::Up | KeyCode::Char('k') => self.table_state.select_previous(),
      KeyCode::Down | KeyCode::Char('j') => self.table_state.select_next(),
      KeyCode::Char('g') => self.table_state.select_first(),
      KeyCode::Char('G') => self.table_state.select_last(),

      KeyCode::Char('r') => self.start_sync(),
      KeyCode::Char('u') => self.start_update_check(),

      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    if self.command_input.trim().is_empty() {
      self.command_input.clear();
      return;
    }

    // Selected suggestion wins over the raw input
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = match suggestions.get(self.selected_suggestion) {
      Some(command) => command.name.to_string(),
      None => self.command_input.trim().to_lowercase(),
    };

    match cmd.as_str() {
      "sync" => self.start_sync(),
      "check" => self.start_update_check(),
      "purge" => self.engine.purge(),
      "quit" => self.should_quit = true,
      _ => {}
    }
    self.command_input.clear();
  }

  fn start_sync(&self) {
    let engine = Arc::clone(&self.engine);
    let viewer = self.viewer.clone();
    tokio::spawn(async move {
      engine.sync(&viewer).await;
    });
  }

  fn start_update_check(&self) {
    let engine = Arc::clone(&self.engine);
    let viewer = self.viewer.clone();
    let known_total = Some(self.status.total_docs);
    tokio::spawn(async move {
      engine.check_for_updates(&viewer, None, known_total).await;
    });
  }

  // Accessors for UI rendering
  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }

  pub fn status(&self) -> &CacheStatus {
    &self.status
  }

  pub fn server_url(&self) -> &str {
    &self.config.server.url
  }

  /// Everything the job table needs, with the selection borrowed mutably.
  pub fn table_parts(&mut self) -> (&[CachedJob], &CacheStatus, &mut TableState) {
    (&self.jobs, &self.status, &mut self.table_state)
  }
}
