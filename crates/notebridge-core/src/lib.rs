//! Core types, author resolution, and message formatting for notebridge.
//!
//! This crate provides:
//! - [`NoteEvent`], the bridge's owned view of a Nostr text note
//! - Author configuration loading and NIP-19 identifier decoding
//! - The notification template used for webhook delivery
//! - Prometheus metrics helpers
//! - Shared error types

mod author;
mod error;
mod event;
mod format;
pub mod metrics;

pub use author::{Author, AuthorDirectory, AuthorEntry, DecodedIdentifier, decode_identifier};
pub use error::{Error, Result};
pub use event::NoteEvent;
pub use format::{NJUMP_BASE_URL, format_notification, njump_link, quote_content};
