use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use super::renderfns::{format_count, format_percentage, truncate};
use crate::cache::{CacheStatus, CachedJob};

const HEADERS: [&str; 9] = [
  "Datum", "Order", "Version", "Press", "Pages", "Net run", "Green", "Red", "Delta",
];

fn job_row(job: &CachedJob) -> Row<'static> {
  let delta_style = match job.delta_percentage {
    Some(p) if p > 0.0 => Style::default().fg(Color::Red),
    Some(_) => Style::default().fg(Color::Green),
    None => Style::default().fg(Color::DarkGray),
  };

  Row::new(vec![
    Cell::from(job.datum.clone()),
    Cell::from(truncate(&job.order_nr, 12)).style(Style::default().fg(Color::Cyan)),
    Cell::from(truncate(&job.version, 14)),
    Cell::from(truncate(&job.press_name, 16)),
    Cell::from(format_count(job.pages)),
    Cell::from(format_count(job.net_run)),
    Cell::from(format_count(job.green)),
    Cell::from(format_count(job.red)),
    Cell::from(format_percentage(job.delta_percentage)).style(delta_style),
  ])
}

pub fn draw_job_table(
  frame: &mut Frame,
  area: Rect,
  jobs: &[CachedJob],
  status: &CacheStatus,
  state: &mut TableState,
) {
  let block = Block::default()
    .title(format!(" Jobs ({}) ", jobs.len()))
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if jobs.is_empty() {
    let content = if status.loading {
      "Loading jobs..."
    } else {
      "No cached jobs. Press 'r' to sync."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h)))
    .style(Style::default().fg(Color::Yellow).bold());

  let widths = [
    Constraint::Length(24),
    Constraint::Length(12),
    Constraint::Length(14),
    Constraint::Min(10),
    Constraint::Length(6),
    Constraint::Length(8),
    Constraint::Length(7),
    Constraint::Length(7),
    Constraint::Length(7),
  ];

  let table = Table::new(jobs.iter().map(job_row), widths)
    .header(header)
    .block(block)
    .row_highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  frame.render_stateful_widget(table, area, state);
}
