//! Rendering tests for the TUI views
//!
//! Views are drawn into a `TestBackend` and the buffer is read back as text.
//! Run `cargo insta review` to review and accept snapshot changes.

use insta::assert_snapshot;
use k8slab::models::{CachedResource, CollectionKey, ResourceStatus};
use k8slab::transport::{ConnectionState, ConnectionStatus};
use k8slab::tui::views::{
    ConnectionSummary, render_footer, render_header, render_resource_list,
};
use k8slab::tui::{App, Theme};
use ratatui::{Terminal, backend::TestBackend};
use std::time::Duration;

fn clusters() -> Vec<CachedResource> {
    vec![
        CachedResource::new("c-0001", Some(ResourceStatus::Running)).with_field("name", "alpha"),
        CachedResource::new("c-0002", Some(ResourceStatus::Provisioning))
            .with_field("name", "beta"),
        CachedResource::new("c-0003", Some(ResourceStatus::Running)).with_field("name", "gamma"),
        CachedResource::new("c-0004", Some(ResourceStatus::Error)).with_field("name", "delta"),
    ]
}

fn live() -> ConnectionSummary {
    ConnectionSummary {
        text: "live".to_string(),
        live: true,
        retrying: false,
    }
}

/// Buffer contents, one line per row with trailing blanks removed
fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let width = buffer.area.width as usize;
    buffer
        .content
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|cell| cell.symbol())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_header_summarizes_collection() {
    let mut terminal = Terminal::new(TestBackend::new(100, 4)).unwrap();
    let theme = Theme::default();
    let resources = clusters();

    terminal
        .draw(|f| {
            render_header(
                f,
                f.area(),
                "https://lab.example.com/api",
                CollectionKey::Clusters,
                &resources,
                &live(),
                &theme,
            )
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("Server:     https://lab.example.com/api"));
    assert!(text.contains("Collection: Clusters (4)"));
    assert!(text.contains("Status:     ERROR:1 PROVISIONING:1 RUNNING:2"));
    assert!(text.contains("Live:       live"));
}

#[test]
fn test_header_shows_retry_countdown() {
    let status = ConnectionStatus {
        state: ConnectionState::Closed,
        reconnect_attempt: 2,
        max_attempts: 5,
        next_retry: Some(Duration::from_secs(2)),
        outcome: None,
    };
    let summary = ConnectionSummary::from_status(Some(&status), "idle");
    let mut terminal = Terminal::new(TestBackend::new(120, 4)).unwrap();
    let theme = Theme::default();

    terminal
        .draw(|f| {
            render_header(
                f,
                f.area(),
                "http://localhost:8000",
                CollectionKey::Teams,
                &[],
                &summary,
                &theme,
            )
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("Status:     -"));
    assert!(text.contains("disconnected, retrying in 2.0s (attempt 2/5)"));
}

#[test]
fn test_resource_list_columns_and_rows() {
    let mut terminal = Terminal::new(TestBackend::new(100, 10)).unwrap();
    let theme = Theme::default();
    let resources = clusters();
    let mut scroll = 0;

    terminal
        .draw(|f| {
            render_resource_list(
                f,
                f.area(),
                CollectionKey::Clusters,
                &resources,
                1,
                &mut scroll,
                false,
                &theme,
            )
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("Clusters (4)"));
    for column in ["NAME", "STATUS", "EXPIRES"] {
        assert!(text.contains(column), "missing column {}", column);
    }
    assert!(!text.contains("c-0001"));
    for name in ["alpha", "beta", "gamma", "delta"] {
        assert!(text.contains(name), "missing row {}", name);
    }
    assert!(text.contains("PROVISIONING"));
}

#[test]
fn test_resource_list_with_ids() {
    let mut terminal = Terminal::new(TestBackend::new(120, 10)).unwrap();
    let theme = Theme::default();
    let resources = clusters();
    let mut scroll = 0;

    terminal
        .draw(|f| {
            render_resource_list(
                f,
                f.area(),
                CollectionKey::Clusters,
                &resources,
                0,
                &mut scroll,
                true,
                &theme,
            )
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("ID"));
    assert!(text.contains("c-0004"));
}

#[test]
fn test_invitations_show_team_names() {
    let mut terminal = Terminal::new(TestBackend::new(80, 6)).unwrap();
    let theme = Theme::default();
    let invitations = vec![
        CachedResource::new("i1", None)
            .with_field("team", serde_json::json!({"name": "platform"}))
            .with_field("role", "admin"),
    ];
    let mut scroll = 0;

    terminal
        .draw(|f| {
            render_resource_list(
                f,
                f.area(),
                CollectionKey::Invitations,
                &invitations,
                0,
                &mut scroll,
                false,
                &theme,
            )
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("TEAM"));
    assert!(text.contains("ROLE"));
    assert!(text.contains("platform"));
    assert!(text.contains("admin"));
}

#[test]
fn test_empty_collection_shows_waiting_state() {
    let mut terminal = Terminal::new(TestBackend::new(60, 6)).unwrap();
    let theme = Theme::default();
    let mut scroll = 0;

    terminal
        .draw(|f| {
            render_resource_list(
                f,
                f.area(),
                CollectionKey::Clusters,
                &[],
                0,
                &mut scroll,
                false,
                &theme,
            )
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("Clusters (0)"));
    assert!(text.contains("No clusters found"));
    assert!(text.contains("Waiting for the server..."));
}

#[test]
fn test_footer_key_hints() {
    let mut terminal = Terminal::new(TestBackend::new(120, 2)).unwrap();
    let theme = Theme::default();

    terminal
        .draw(|f| render_footer(f, f.area(), &None, &theme))
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains("<enter> terminal"));
    assert!(text.contains("<L> logout"));
    assert!(text.contains("<q> quit"));
}

#[test]
fn test_footer_message() {
    let mut terminal = Terminal::new(TestBackend::new(30, 2)).unwrap();
    let theme = Theme::default();

    terminal
        .draw(|f| render_footer(f, f.area(), &Some(("Logged out".to_string(), false)), &theme))
        .unwrap();

    assert_snapshot!(buffer_text(&terminal), @r"
    ──────────────────────────────
    Logged out
    ");
}

#[test]
fn test_full_screen() {
    let mut terminal = Terminal::new(TestBackend::new(100, 16)).unwrap();
    let mut app = App::new("http://localhost:8000", CollectionKey::Clusters, false);
    let resources = clusters();

    terminal
        .draw(|f| app.render(f, &resources, &live()))
        .unwrap();

    let text = buffer_text(&terminal);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 16);
    assert!(lines[0].starts_with("Server:     http://localhost:8000"));
    assert!(text.contains("Clusters (4)"));
    assert!(lines[15].contains("<j/k> move"));
}
