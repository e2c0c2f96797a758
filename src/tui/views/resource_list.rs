//! Resource list view rendering

use crate::models::{CachedResource, CollectionKey};
use crate::tui::theme::Theme;
use crate::tui::views::helpers::{render_empty_state, update_scroll_offset};
use crate::watcher::display_name;
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
};
use std::cmp;

const SCROLL_BUFFER: usize = 2;

/// Column headers shown for a collection
pub fn columns_for(collection: CollectionKey, show_ids: bool) -> Vec<&'static str> {
    let mut columns = match collection {
        CollectionKey::Clusters => vec!["NAME", "STATUS", "EXPIRES"],
        CollectionKey::Teams => vec!["NAME"],
        CollectionKey::Invitations => vec!["TEAM", "ROLE"],
    };
    if show_ids {
        columns.push("ID");
    }
    columns
}

fn cell_value(resource: &CachedResource, column: &str, now: DateTime<Utc>) -> String {
    match column {
        "NAME" => resource.name().to_string(),
        "STATUS" => resource.status_label().to_string(),
        "EXPIRES" => resource
            .field_str("ttl_expires_at")
            .map(|raw| format_expiry(raw, now))
            .unwrap_or_else(|| "-".to_string()),
        "TEAM" => resource
            .fields
            .get("team")
            .and_then(|team| team.get("name"))
            .and_then(|name| name.as_str())
            .unwrap_or("-")
            .to_string(),
        "ROLE" => resource.field_str("role").unwrap_or("-").to_string(),
        "ID" => resource.id.clone(),
        _ => "-".to_string(),
    }
}

/// Remaining lifetime of a cluster as short text
///
/// Timestamps without an offset are taken as UTC.
pub(crate) fn format_expiry(raw: &str, now: DateTime<Utc>) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc())
        });
    let Ok(expires) = parsed else {
        return raw.to_string();
    };

    let left = expires.signed_duration_since(now);
    if left.num_seconds() <= 0 {
        "expired".to_string()
    } else if left.num_hours() > 0 {
        format!("in {}h{}m", left.num_hours(), left.num_minutes() % 60)
    } else if left.num_minutes() > 0 {
        format!("in {}m", left.num_minutes())
    } else {
        format!("in {}s", left.num_seconds())
    }
}

/// Render the resource table for one collection
#[allow(clippy::too_many_arguments)]
pub fn render_resource_list(
    f: &mut Frame,
    area: Rect,
    collection: CollectionKey,
    resources: &[CachedResource],
    selected_index: usize,
    scroll_offset: &mut usize,
    show_ids: bool,
    theme: &Theme,
) {
    let visible_height = (area.height as usize).saturating_sub(3);
    let title = format!("{} ({})", display_name(collection), resources.len());

    if resources.is_empty() {
        render_empty_state(
            f,
            area,
            &title,
            &format!("No {} found", collection),
            "Waiting for the server...",
            theme,
        );
        return;
    }

    let valid_selected = cmp::min(selected_index, resources.len() - 1);
    update_scroll_offset(valid_selected, visible_height, scroll_offset, SCROLL_BUFFER);

    let columns = columns_for(collection, show_ids);
    let now = Utc::now();

    let header = Row::new(columns.clone()).style(
        Style::default()
            .fg(theme.table_header)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = resources
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(idx, resource)| {
            let cells: Vec<Cell> = columns
                .iter()
                .map(|column| {
                    let value = cell_value(resource, column, now);
                    if *column == "STATUS" {
                        Cell::from(value).style(theme.status_style(resource.status.as_ref()))
                    } else {
                        Cell::from(value)
                    }
                })
                .collect();
            let row = Row::new(cells);
            if idx == valid_selected {
                row.style(theme.table_selected_style())
            } else {
                row
            }
        })
        .collect();

    let constraints: Vec<Constraint> = columns
        .iter()
        .map(|column| match *column {
            "NAME" | "TEAM" => Constraint::Percentage(35),
            "ID" => Constraint::Length(38),
            _ => Constraint::Length(16),
        })
        .collect();

    let table = Table::new(rows, constraints)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_format_expiry() {
        assert_eq!(format_expiry("2024-01-01T13:30:00Z", noon()), "in 1h30m");
        assert_eq!(format_expiry("2024-01-01T12:05:00+00:00", noon()), "in 5m");
        assert_eq!(format_expiry("2024-01-01T12:00:30.123456", noon()), "in 30s");
        assert_eq!(format_expiry("2024-01-01T11:00:00Z", noon()), "expired");
        assert_eq!(format_expiry("tomorrow", noon()), "tomorrow");
    }

    #[test]
    fn test_columns_for() {
        assert_eq!(
            columns_for(CollectionKey::Clusters, true),
            vec!["NAME", "STATUS", "EXPIRES", "ID"]
        );
        assert_eq!(columns_for(CollectionKey::Invitations, false), vec!["TEAM", "ROLE"]);
    }

    #[test]
    fn test_cell_value_nested_team() {
        let invite = CachedResource::new("i1", None)
            .with_field("team", serde_json::json!({"name": "platform"}))
            .with_field("role", "member");
        assert_eq!(cell_value(&invite, "TEAM", noon()), "platform");
        assert_eq!(cell_value(&invite, "ROLE", noon()), "member");
        assert_eq!(cell_value(&invite, "ID", noon()), "i1");
    }
}
