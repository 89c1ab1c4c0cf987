//! The ingest loop.
//!
//! ```text
//! [EventFeed] → [DedupStore::contains] → [AuthorDirectory] → [DeliveryClient]
//!                                                                  │ ok
//!                                                                  ▼
//!                                                   [DedupStore::mark_and_persist]
//! ```
//!
//! Events are handled one at a time in arrival order; the loop waits for each
//! delivery before pulling the next event. An event is marked only after its
//! delivery succeeded. Nothing that goes wrong while handling an event stops
//! the loop: failures are logged, counted, and the next event is pulled.

use crate::dedupe::DedupStore;
use crate::delivery::DeliveryClient;
use crate::source::EventFeed;

use metrics::{counter, gauge};
use notebridge_core::metrics::{
    DEDUPE_IDS, DELIVERY_FAILURES, EVENTS_DELIVERED, EVENTS_DUPLICATE, EVENTS_RECEIVED,
    EVENTS_UNKNOWN_AUTHOR, PERSIST_FAILURES, RUNNING,
};
use notebridge_core::{AuthorDirectory, NoteEvent, format_notification};
use std::sync::Arc;

/// What happened to a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Already delivered; skipped without side effects.
    Duplicate,
    /// Author not configured; skipped and left unmarked.
    UnknownAuthor,
    /// Delivered and recorded durably.
    Delivered,
    /// Delivered and marked in memory, but the record write failed.
    DeliveredNotPersisted,
    /// Delivery failed; left unmarked.
    DeliveryFailed,
}

/// Counters for one run of the ingest loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Events pulled from the feed.
    pub received: usize,
    /// Events skipped as already delivered.
    pub duplicates: usize,
    /// Events skipped for an unknown author.
    pub unknown_authors: usize,
    /// Events delivered (whether or not the record write succeeded).
    pub delivered: usize,
    /// Failed deliveries.
    pub delivery_failures: usize,
    /// Record writes that failed after a delivery.
    pub persist_failures: usize,
}

impl IngestStats {
    fn record(&mut self, outcome: EventOutcome) {
        self.received += 1;
        match outcome {
            EventOutcome::Duplicate => self.duplicates += 1,
            EventOutcome::UnknownAuthor => self.unknown_authors += 1,
            EventOutcome::Delivered => self.delivered += 1,
            EventOutcome::DeliveredNotPersisted => {
                self.delivered += 1;
                self.persist_failures += 1;
            }
            EventOutcome::DeliveryFailed => self.delivery_failures += 1,
        }
    }
}

/// Drains an [`EventFeed`] into a [`DeliveryClient`], deduplicating by event ID.
pub struct IngestLoop<D> {
    dedupe: Arc<DedupStore>,
    authors: Arc<AuthorDirectory>,
    delivery: D,
    stats: IngestStats,
}

impl<D: DeliveryClient> IngestLoop<D> {
    /// Create a loop over the given store, authors, and delivery client.
    pub fn new(dedupe: Arc<DedupStore>, authors: Arc<AuthorDirectory>, delivery: D) -> Self {
        Self {
            dedupe,
            authors,
            delivery,
            stats: IngestStats::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Process events until the feed ends.
    pub async fn run<F: EventFeed>(&mut self, feed: &mut F) -> IngestStats {
        tracing::info!("Starting ingest loop on {} feed", feed.name());
        gauge!(RUNNING).set(1.0);
        gauge!(DEDUPE_IDS).set(self.dedupe.len() as f64);

        while let Some(event) = feed.next_event().await {
            self.process(&event).await;
        }

        gauge!(RUNNING).set(0.0);
        tracing::info!("Feed ended after {} events", self.stats.received);
        self.stats.clone()
    }

    /// Handle a single event and count its outcome.
    pub async fn process(&mut self, event: &NoteEvent) -> EventOutcome {
        let outcome = self.handle(event).await;
        self.stats.record(outcome);
        outcome
    }

    async fn handle(&self, event: &NoteEvent) -> EventOutcome {
        counter!(EVENTS_RECEIVED).increment(1);

        if self.dedupe.contains(&event.id) {
            tracing::debug!(event_id = %event.id, "Already delivered, skipping");
            counter!(EVENTS_DUPLICATE).increment(1);
            return EventOutcome::Duplicate;
        }

        let Some(author) = self.authors.get(&event.author_key) else {
            tracing::warn!(
                event_id = %event.id,
                author = %event.author_key,
                "Event from unconfigured author, skipping"
            );
            counter!(EVENTS_UNKNOWN_AUTHOR).increment(1);
            return EventOutcome::UnknownAuthor;
        };

        let message = format_notification(author, event);

        if let Err(e) = self.delivery.send(&message).await {
            tracing::warn!(
                event_id = %event.id,
                error = %e,
                "Delivery failed, event left unmarked"
            );
            counter!(DELIVERY_FAILURES).increment(1);
            return EventOutcome::DeliveryFailed;
        }
        counter!(EVENTS_DELIVERED).increment(1);

        let outcome = match self.dedupe.mark_and_persist(&event.id) {
            Ok(()) => {
                tracing::info!(
                    event_id = %event.id,
                    author = %author.display_name,
                    "Delivered note"
                );
                EventOutcome::Delivered
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    path = %self.dedupe.path().display(),
                    error = %e,
                    "Delivered note but failed to persist dedupe record"
                );
                counter!(PERSIST_FAILURES).increment(1);
                EventOutcome::DeliveredNotPersisted
            }
        };
        gauge!(DEDUPE_IDS).set(self.dedupe.len() as f64);

        outcome
    }
}
