//! Terminal output formatting.

use chrono::{DateTime, Local};
use smsledger_core::{Classification, Message, SenderGroup};

const PREVIEW_CHARS: usize = 60;

/// Render an epoch-millisecond timestamp in local time.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// One line per committed message.
pub fn format_message(message: &Message) -> String {
    format!(
        "{}  {:<4}  {:<16}  {}  [{}]",
        format_timestamp(message.date),
        message.classification,
        message.address,
        preview(&message.body),
        message.id
    )
}

/// One line per sender.
pub fn format_group(group: &SenderGroup) -> String {
    let mut line = format!(
        "{}  {:<4}  {:<16}  {} msg",
        format_timestamp(group.latest_date()),
        group.display_classification(),
        group.address,
        group.messages.len()
    );

    let unread = group.unread_count();
    if unread > 0 {
        line.push_str(&format!(", {unread} unread"));
    }
    if group.display_classification() == Classification::Ham && group.spam_count() > 0 {
        line.push_str(&format!(", {} spam", group.spam_count()));
    }
    if let Some(latest) = group.latest() {
        line.push_str("  ");
        line.push_str(&preview(&latest.body));
    }
    line
}

fn preview(body: &str) -> String {
    let flat = body.replace(['\n', '\r'], " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    }
}
