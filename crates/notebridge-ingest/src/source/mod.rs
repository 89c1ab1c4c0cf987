//! Event feed adapters.
//!
//! The ingest loop pulls events from an [`EventFeed`], a lazy and possibly
//! endless sequence. The live feed is [`RelayFeed`], a subscription on a
//! single Nostr relay.

mod relay;

pub use relay::{RelayConfig, RelayFeed, build_filter};

use notebridge_core::NoteEvent;
use std::future::Future;

/// A source of Nostr events.
///
/// Events are yielded in arrival order. `None` means the feed has ended
/// (transport shutdown or a stop request) and will yield nothing more.
pub trait EventFeed {
    /// Human-readable name for this feed (used in logs).
    fn name(&self) -> &'static str;

    /// Wait for the next event.
    fn next_event(&mut self) -> impl Future<Output = Option<NoteEvent>> + Send;
}
