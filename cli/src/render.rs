//! Plain-text transcript rendering.

use chrono::{DateTime, Local};

use arkaios_engine::{DisplayRole, Message};

fn badge(role: DisplayRole) -> &'static str {
    match role {
        DisplayRole::User => "YOU",
        DisplayRole::Model => "ARKAIOS",
        DisplayRole::System => "SYSTEM",
        DisplayRole::Tool => "TOOL",
    }
}

/// Render one transcript entry as `[HH:MM:SS] BADGE  text`.
///
/// Continuation lines are indented under the text column.
pub fn format_message(message: &Message) -> String {
    let time: DateTime<Local> = message.timestamp().into();
    let prefix = format!("[{}] {:<8}", time.format("%H:%M:%S"), badge(message.role()));
    let indent = " ".repeat(prefix.len() + 1);

    let mut body = message.text().to_string();
    if !message.attachments().is_empty() {
        body = format!("[image attached] {body}");
    }

    let mut lines = body.lines();
    let mut out = format!("{prefix} {}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        out.push_str(&indent);
        out.push_str(line);
    }
    out
}
