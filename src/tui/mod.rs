//! TUI module for k8slab
//!
//! A live list of the cached collections with inline connection status, and
//! a raw-mode interactive terminal for RUNNING clusters.

pub mod app;
pub mod interactive;
pub mod theme;
pub mod views;

pub use app::{App, AppAction};
pub use theme::Theme;

use crate::models::CollectionKey;
use crate::services::{LiveSession, SubscriptionHandle};
use crate::tui::views::ConnectionSummary;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::Duration;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

fn enter_screen() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn leave_screen(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn seed_into(session: &LiveSession, app: &mut App, collection: CollectionKey) {
    match session.seed(collection).await {
        Ok(count) => tracing::debug!("Seeded {} {}", count, collection),
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", collection, e);
            app.set_status_message((format!("Failed to fetch {}: {}", collection, e), true));
        }
    }
}

/// Run the TUI until the user quits
pub async fn run_tui(session: LiveSession, collection: CollectionKey) -> Result<()> {
    let mut terminal = enter_screen()?;
    let result = run_loop(&mut terminal, &session, collection).await;
    // Restore the terminal even when the loop failed
    let restored = leave_screen(&mut terminal);
    result.and(restored)
}

async fn run_loop(terminal: &mut Term, session: &LiveSession, collection: CollectionKey) -> Result<()> {
    let config = session.config();
    let tick = Duration::from_millis(config.ui.tick_ms.max(1));
    let mut app = App::new(config.api_url.clone(), collection, config.ui.show_ids);

    seed_into(session, &mut app, collection).await;
    let mut subscription: SubscriptionHandle = session.watch(collection);
    let mut changes = session.cache().changes();
    let mut last_status = String::new();
    let mut dirty = true;

    loop {
        let resources = session.snapshot(app.collection());
        app.clamp_selection(resources.len());

        let status_text = session.status_line();
        if status_text != last_status {
            tracing::debug!("Connection status: {}", status_text);
            last_status = status_text.clone();
            dirty = true;
        }
        if changes.has_changed().unwrap_or(false) {
            let _ = changes.borrow_and_update();
            dirty = true;
        }

        if dirty {
            let summary = ConnectionSummary::from_status(
                session.connection_status().as_ref(),
                &status_text,
            );
            terminal.draw(|f| app.render(f, &resources, &summary))?;
            dirty = false;
        }

        // Handle input events (blocks for at most one tick)
        if !event::poll(tick)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            dirty = true;
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        dirty = true;

        match app.handle_key(key, &resources) {
            None => {}
            Some(AppAction::Quit) => break,
            Some(AppAction::SwitchCollection(next)) => {
                if !session.cache().is_seeded(next) {
                    seed_into(session, &mut app, next).await;
                }
                if subscription.interest() != &crate::services::Interest::Collection(next) {
                    subscription = session.watch(next);
                }
            }
            Some(AppAction::Refresh) => {
                let current = app.collection();
                seed_into(session, &mut app, current).await;
            }
            Some(AppAction::Logout) => {
                session.logout();
                app.set_status_message(("Logged out".to_string(), false));
            }
            Some(AppAction::OpenTerminal { cluster_id, name }) => {
                let mode = config.terminal.mode;
                match session.start_terminal(&cluster_id, mode) {
                    Ok(mut term_session) => {
                        leave_screen(terminal)?;
                        let outcome = interactive::attach(&mut term_session, &name).await;
                        term_session.close();
                        *terminal = enter_screen()?;
                        terminal.clear()?;
                        match outcome {
                            Ok(interactive::AttachOutcome::Detached) => {}
                            Ok(interactive::AttachOutcome::Closed(reason)) => {
                                app.set_status_message((format!("Terminal: {}", reason), false));
                            }
                            Err(e) => app.set_status_message((format!("Terminal failed: {}", e), true)),
                        }
                    }
                    Err(e) => app.set_status_message((e.to_string(), true)),
                }
            }
        }
    }

    tracing::debug!("TUI shutting down");
    drop(subscription);
    Ok(())
}
