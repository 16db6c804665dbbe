mod command_overlay;
mod jobs;
pub mod renderfns;

use crate::app::{App, Mode};
use crate::commands;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, TableState};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Job table
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.server_url(), app.status());

  let (jobs, status, state) = app.table_parts();
  jobs::draw_job_table(frame, chunks[1], jobs, status, state);

  draw_status_bar(frame, chunks[2], app);

  if *app.mode() == Mode::Command {
    let suggestions = commands::get_suggestions(app.command_input());
    command_overlay::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &suggestions,
      app.selected_suggestion(),
    );
  }
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.mode() {
    Mode::Normal => {
      let hint = " :command  j/k:nav  r:sync  u:check updates  q:quit";
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
    Mode::Command => {
      let cmd = format!(":{}", app.command_input());
      (cmd, Style::default().fg(Color::Yellow))
    }
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}

/// Keep the selection inside the list after it shrank or grew
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  if len == 0 {
    state.select(None);
  } else {
    match state.selected() {
      Some(i) if i >= len => state.select(Some(len - 1)),
      None => state.select(Some(0)),
      _ => {}
    }
  }
}
