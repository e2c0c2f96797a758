//! Main application state and logic for the TUI
//!
//! `App` owns only presentation state. The data it draws (cached rows and
//! connection text) is passed in on every frame, so the live session stays
//! the single source of truth.

use crate::models::{CachedResource, CollectionKey};
use crate::tui::theme::Theme;
use crate::tui::views::{ConnectionSummary, render_footer, render_header, render_resource_list};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

/// Something the run loop must do in response to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    /// Show another collection, seeding it if needed
    SwitchCollection(CollectionKey),
    /// Re-fetch the current collection
    Refresh,
    /// Open an interactive terminal on a RUNNING cluster
    OpenTerminal { cluster_id: String, name: String },
    Logout,
}

pub struct App {
    collection: CollectionKey,
    selected_index: usize,
    scroll_offset: usize,
    show_ids: bool,
    status_message: Option<(String, bool)>,
    server: String,
    theme: Theme,
}

impl App {
    pub fn new(server: impl Into<String>, collection: CollectionKey, show_ids: bool) -> Self {
        Self {
            collection,
            selected_index: 0,
            scroll_offset: 0,
            show_ids,
            status_message: None,
            server: server.into(),
            theme: Theme::default(),
        }
    }

    pub fn collection(&self) -> CollectionKey {
        self.collection
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn show_ids(&self) -> bool {
        self.show_ids
    }

    pub fn status_message(&self) -> Option<&(String, bool)> {
        self.status_message.as_ref()
    }

    /// Set a one-line message shown in the footer until the next key press
    pub fn set_status_message(&mut self, message: (String, bool)) {
        self.status_message = Some(message);
    }

    /// Handle a key press against the rows currently on screen
    pub fn handle_key(&mut self, key: KeyEvent, resources: &[CachedResource]) -> Option<AppAction> {
        self.status_message = None;

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(AppAction::Quit)
            }
            KeyCode::Char('q') | KeyCode::Esc => Some(AppAction::Quit),
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_index + 1 < resources.len() {
                    self.selected_index += 1;
                }
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_index = self.selected_index.saturating_sub(1);
                None
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.selected_index = 0;
                None
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.selected_index = resources.len().saturating_sub(1);
                None
            }
            KeyCode::Tab => Some(self.switch_to(self.next_collection())),
            KeyCode::Char(c @ '1'..='9') => {
                let index = (c as usize) - ('1' as usize);
                CollectionKey::all()
                    .get(index)
                    .copied()
                    .map(|collection| self.switch_to(collection))
            }
            KeyCode::Char('r') => Some(AppAction::Refresh),
            KeyCode::Char('i') => {
                self.show_ids = !self.show_ids;
                None
            }
            KeyCode::Char('L') => Some(AppAction::Logout),
            KeyCode::Enter | KeyCode::Char('s') => self.open_terminal(resources),
            _ => None,
        }
    }

    fn next_collection(&self) -> CollectionKey {
        let all = CollectionKey::all();
        let pos = all.iter().position(|c| *c == self.collection).unwrap_or(0);
        all[(pos + 1) % all.len()]
    }

    fn switch_to(&mut self, collection: CollectionKey) -> AppAction {
        if collection != self.collection {
            self.collection = collection;
            self.selected_index = 0;
            self.scroll_offset = 0;
        }
        AppAction::SwitchCollection(collection)
    }

    fn open_terminal(&mut self, resources: &[CachedResource]) -> Option<AppAction> {
        if self.collection != CollectionKey::Clusters {
            return None;
        }
        let cluster = resources.get(self.selected_index)?;
        if !cluster.status.as_ref().is_some_and(|s| s.is_running()) {
            self.status_message = Some((
                format!(
                    "{} is {}; terminals need a RUNNING cluster",
                    cluster.name(),
                    cluster.status_label()
                ),
                true,
            ));
            return None;
        }
        Some(AppAction::OpenTerminal {
            cluster_id: cluster.id.clone(),
            name: cluster.name().to_string(),
        })
    }

    /// Keep the selection inside a collection that may have shrunk
    pub fn clamp_selection(&mut self, len: usize) {
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        resources: &[CachedResource],
        connection: &ConnectionSummary,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(3),
                Constraint::Length(2),
            ])
            .split(f.area());

        render_header(
            f,
            chunks[0],
            &self.server,
            self.collection,
            resources,
            connection,
            &self.theme,
        );
        render_resource_list(
            f,
            chunks[1],
            self.collection,
            resources,
            self.selected_index,
            &mut self.scroll_offset,
            self.show_ids,
            &self.theme,
        );
        render_footer(f, chunks[2], &self.status_message, &self.theme);
    }
}
