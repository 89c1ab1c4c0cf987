//! Notification formatting.
//!
//! Messages use Slack mrkdwn:
//!
//! ```text
//! *<link|name>* - <https://njump.me/<id>|njump>
//!
//! >first line
//! >second line
//! ```

use crate::author::Author;
use crate::event::NoteEvent;

/// Base URL for event permalinks.
pub const NJUMP_BASE_URL: &str = "https://njump.me";

/// Permalink for an event ID.
pub fn njump_link(event_id: &str) -> String {
    format!("{NJUMP_BASE_URL}/{event_id}")
}

/// Continue a blockquote across newlines.
///
/// The leading `>` of the first line is part of the template, so only the
/// line breaks are rewritten.
pub fn quote_content(content: &str) -> String {
    content.replace('\n', "\n>")
}

/// Render the notification body for an event.
pub fn format_notification(author: &Author, event: &NoteEvent) -> String {
    format!(
        "*<{}|{}>* - <{}|njump>\n\n>{}",
        author.link,
        author.display_name,
        njump_link(&event.id),
        quote_content(&event.content)
    )
}
