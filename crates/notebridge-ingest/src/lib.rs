//! Nostr-to-webhook bridge with durable deduplication.
//!
//! This crate forwards text notes from a configured set of authors on a Nostr
//! relay to an incoming webhook, delivering each note once.
//!
//! # Modules
//!
//! - [`source`] - Event feeds (live relay subscription)
//! - [`dedupe`] - File-backed record of delivered event IDs
//! - [`delivery`] - Webhook delivery client
//! - [`pipeline`] - The ingest loop tying them together
//! - [`config`] - Environment configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    RelayFeed    │  nostr-sdk subscription (kind 1, configured authors)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   DedupStore    │  skip event IDs already delivered
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  WebhookClient  │  POST {"text": ...}
//! └────────┬────────┘
//!          │ success
//!          ▼
//! ┌─────────────────┐
//! │   DedupStore    │  mark + rewrite posted_notes.json
//! └─────────────────┘
//! ```
//!
//! Delivery is at-least-once: an ID is recorded only after its delivery
//! succeeded, so a crash in between replays that note on restart.

pub mod config;
pub mod dedupe;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod source;

// Re-export commonly used types at crate root
pub use config::Config;
pub use dedupe::{DedupStore, LoadError, PersistError};
pub use delivery::{DEFAULT_DELIVERY_TIMEOUT, DeliveryClient, DeliveryError, WebhookClient};
pub use error::{Error, Result};
pub use pipeline::{EventOutcome, IngestLoop, IngestStats};
pub use source::{EventFeed, RelayConfig, RelayFeed};
