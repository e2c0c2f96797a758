//! Header view rendering

use crate::models::{CachedResource, CollectionKey};
use crate::transport::{ConnectionState, ConnectionStatus};
use crate::tui::theme::Theme;
use crate::watcher::display_name;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::collections::BTreeMap;

const LOGO: [&str; 3] = [" _   ___     _      _    ", "| |_( _ )___| |__ _| |__ ", "|_\\_\\___/(_-<_/\\__,_|_.__/"];

/// Connection state reduced to what the header shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub text: String,
    pub live: bool,
    pub retrying: bool,
}

impl ConnectionSummary {
    /// `fallback` is shown when there is no connection at all
    pub fn from_status(status: Option<&ConnectionStatus>, fallback: &str) -> Self {
        match status {
            Some(status) => Self {
                text: status.describe(),
                live: status.state == ConnectionState::Open,
                retrying: status.next_retry.is_some()
                    || status.state == ConnectionState::Connecting,
            },
            None => Self {
                text: fallback.to_string(),
                live: false,
                retrying: false,
            },
        }
    }
}

/// Render the header: server, collection totals, status breakdown, connection
pub fn render_header(
    f: &mut Frame,
    area: Rect,
    server: &str,
    collection: CollectionKey,
    resources: &[CachedResource],
    connection: &ConnectionSummary,
    theme: &Theme,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    // Sorted for stable display
    let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
    for resource in resources {
        *by_status.entry(resource.status_label()).or_insert(0) += 1;
    }
    let breakdown = by_status
        .iter()
        .map(|(status, count)| format!("{}:{}", status, count))
        .collect::<Vec<_>>()
        .join(" ");

    let label = Style::default().fg(theme.text_label);
    let lines = vec![
        Line::from(vec![
            Span::styled("Server:     ", label),
            Span::styled(
                server.to_string(),
                Style::default()
                    .fg(theme.header_server)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Collection: ", label),
            Span::styled(
                display_name(collection).to_string(),
                Style::default()
                    .fg(theme.header_collection)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                format!("({})", resources.len()),
                Style::default().fg(theme.header_total),
            ),
        ]),
        Line::from(vec![
            Span::styled("Status:     ", label),
            Span::raw(if breakdown.is_empty() {
                "-".to_string()
            } else {
                breakdown
            }),
        ]),
        Line::from(vec![
            Span::styled("Live:       ", label),
            Span::styled(
                connection.text.clone(),
                theme.connection_style(connection.live, connection.retrying),
            ),
        ]),
    ];

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::NONE)),
        chunks[0],
    );

    let logo: Vec<Line> = LOGO
        .iter()
        .map(|l| Line::from(Span::styled(*l, Style::default().fg(theme.header_ascii))))
        .collect();
    f.render_widget(Paragraph::new(logo), chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_summary_without_connection() {
        let summary = ConnectionSummary::from_status(None, "cannot subscribe: no auth token");
        assert_eq!(summary.text, "cannot subscribe: no auth token");
        assert!(!summary.live);
        assert!(!summary.retrying);
    }

    #[test]
    fn test_summary_retrying() {
        let status = ConnectionStatus {
            state: ConnectionState::Closed,
            reconnect_attempt: 1,
            max_attempts: 5,
            next_retry: Some(Duration::from_millis(1000)),
            outcome: None,
        };
        let summary = ConnectionSummary::from_status(Some(&status), "");
        assert!(summary.retrying);
        assert!(!summary.live);
        assert_eq!(summary.text, "disconnected, retrying in 1.0s (attempt 1/5)");
    }
}
