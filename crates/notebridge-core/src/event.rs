//! The bridge's owned view of a Nostr event.

/// A text note received from the feed.
///
/// Only the fields the bridge needs are kept. Identifiers are lowercase hex,
/// matching what relays put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEvent {
    /// Event ID (hex SHA-256 of the canonical serialization).
    pub id: String,
    /// Author public key (hex).
    pub author_key: String,
    /// Free-form note content.
    pub content: String,
    /// `created_at` as a Unix timestamp.
    pub created_at: u64,
}

impl NoteEvent {
    /// Build an event from its parts.
    pub fn new(
        id: impl Into<String>,
        author_key: impl Into<String>,
        content: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            author_key: author_key.into(),
            content: content.into(),
            created_at,
        }
    }
}

impl From<&nostr::Event> for NoteEvent {
    fn from(event: &nostr::Event) -> Self {
        Self {
            id: event.id.to_hex(),
            author_key: event.pubkey.to_hex(),
            content: event.content.clone(),
            created_at: event.created_at.as_u64(),
        }
    }
}
