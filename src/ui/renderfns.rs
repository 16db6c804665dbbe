use chrono::{DateTime, Local, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::cache::types::STATUS_UP_TO_DATE;
use crate::cache::CacheStatus;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Unknown counts render as a dash, which is not the same as zero
pub fn format_count(value: Option<i64>) -> String {
  value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn format_percentage(value: Option<f64>) -> String {
  value
    .map(|v| format!("{:.1}%", v))
    .unwrap_or_else(|| "-".to_string())
}

/// Color for the status text in the header
pub fn status_color(status: &CacheStatus) -> Color {
  if status.status_text.contains("failed") || status.status_text.contains("timed out") {
    Color::Red
  } else if status.loading {
    Color::Yellow
  } else if status.status_text == STATUS_UP_TO_DATE {
    Color::Green
  } else {
    Color::White
  }
}

fn format_last_sync(last_sync: Option<DateTime<Utc>>) -> String {
  last_sync
    .map(|at| at.with_timezone(&Local).format("%d.%m. %H:%M").to_string())
    .unwrap_or_else(|| "never".to_string())
}

/// Draw the header bar with server, sync status and counters
pub fn draw_header(frame: &mut Frame, area: Rect, server_url: &str, status: &CacheStatus) {
  let domain = extract_domain(server_url);

  let header = Line::from(vec![
    Span::styled(" pressjobs ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", status.status_text),
      Style::default().fg(status_color(status)).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::raw(format!(
      " {}/{} cached ",
      status.cached_docs, status.total_docs
    )),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::raw(format!(" +{} updates ", status.new_updates)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" last sync {} ", format_last_sync(status.last_sync)),
      Style::default().fg(Color::DarkGray),
    ),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Extract domain from the server URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
