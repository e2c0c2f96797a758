//! Theme and styling definitions
//!
//! This module provides a centralized place for all color and style definitions.

use crate::models::ResourceStatus;
use ratatui::style::{Color, Modifier, Style};

/// Theme configuration for the TUI
pub struct Theme {
    // Header colors
    pub header_server: Color,
    pub header_collection: Color,
    pub header_total: Color,
    pub header_ascii: Color,

    // Connection colors
    pub connection_live: Color,
    pub connection_pending: Color,
    pub connection_down: Color,

    // Status colors
    pub status_running: Color,
    pub status_provisioning: Color,
    pub status_deleting: Color,
    pub status_error: Color,
    pub status_unknown: Color,

    // Table colors
    pub table_header: Color,
    pub table_selected: Color,
    pub table_selected_bg: Color,

    // Text colors
    pub text_secondary: Color,
    pub text_label: Color,

    // Messages
    pub message_info: Color,
    pub message_error: Color,

    // Footer colors
    pub footer_key: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_server: Color::Yellow,
            header_collection: Color::Green,
            header_total: Color::Yellow,
            header_ascii: Color::Cyan,

            connection_live: Color::Green,
            connection_pending: Color::Yellow,
            connection_down: Color::Red,

            status_running: Color::Green,
            status_provisioning: Color::Yellow,
            status_deleting: Color::Gray,
            status_error: Color::Red,
            status_unknown: Color::Magenta,

            table_header: Color::Cyan,
            table_selected: Color::Blue,
            table_selected_bg: Color::DarkGray,

            text_secondary: Color::Gray,
            text_label: Color::Cyan,

            message_info: Color::Green,
            message_error: Color::Red,

            footer_key: Color::Yellow,
        }
    }
}

impl Theme {
    pub fn status_style(&self, status: Option<&ResourceStatus>) -> Style {
        let color = match status {
            Some(ResourceStatus::Running) => self.status_running,
            Some(ResourceStatus::Provisioning) => self.status_provisioning,
            Some(ResourceStatus::Deleting) => self.status_deleting,
            Some(ResourceStatus::Error) => self.status_error,
            Some(ResourceStatus::Other(_)) => self.status_unknown,
            None => self.text_secondary,
        };
        Style::default().fg(color)
    }

    /// Style for the inline connection status text
    pub fn connection_style(&self, live: bool, retrying: bool) -> Style {
        let color = if live {
            self.connection_live
        } else if retrying {
            self.connection_pending
        } else {
            self.connection_down
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn table_selected_style(&self) -> Style {
        Style::default()
            .fg(self.table_selected)
            .bg(self.table_selected_bg)
    }

    pub fn footer_key_style(&self) -> Style {
        Style::default().fg(self.footer_key)
    }

    pub fn message_style(&self, is_error: bool) -> Style {
        Style::default()
            .fg(if is_error {
                self.message_error
            } else {
                self.message_info
            })
            .add_modifier(Modifier::BOLD)
    }
}
