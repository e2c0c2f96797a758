//! Footer view rendering

use crate::tui::theme::Theme;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

const KEYS: &[(&str, &str)] = &[
    ("j/k", "move"),
    ("tab", "collection"),
    ("enter", "terminal"),
    ("r", "refresh"),
    ("i", "ids"),
    ("L", "logout"),
    ("q", "quit"),
];

/// Render the footer: a status message when one is set, key hints otherwise
pub fn render_footer(
    f: &mut Frame,
    area: Rect,
    status_message: &Option<(String, bool)>,
    theme: &Theme,
) {
    let line = match status_message {
        Some((message, is_error)) => {
            Line::from(Span::styled(message.clone(), theme.message_style(*is_error)))
        }
        None => {
            let mut spans = Vec::with_capacity(KEYS.len() * 3);
            for (key, action) in KEYS {
                spans.push(Span::styled(format!("<{}>", key), theme.footer_key_style()));
                spans.push(Span::raw(format!(" {}", action)));
                spans.push(Span::raw("  "));
            }
            Line::from(spans)
        }
    };

    let paragraph = Paragraph::new(line)
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}
