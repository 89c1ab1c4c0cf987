//! Live relay feed.
//!
//! Connects to one Nostr relay with nostr-sdk and subscribes to text notes
//! from the configured authors. The relay first replays up to `limit` stored
//! notes per subscription, then streams new ones; the dedupe store absorbs
//! the replayed notes that were already delivered.
//!
//! nostr-sdk reconnects dropped connections on its own and resubscribes, at
//! which point the relay replays its stored notes; those reach the ingest
//! loop again, so a note whose delivery failed gets another attempt. The feed
//! only ends when the relay pool shuts down or the shared running flag is
//! cleared.

use super::EventFeed;
use crate::{Error, Result};

use nostr_sdk::prelude::*;
use notebridge_core::NoteEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

/// How often the connect wait re-checks relay status.
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the relay feed.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay URL (e.g. `wss://relay.damus.io`).
    pub relay_url: String,

    /// Hex public keys to subscribe to.
    pub authors: Vec<String>,

    /// Stored notes the relay replays on subscribe.
    pub limit: usize,

    /// How long to wait for the initial connection before giving up.
    pub connect_timeout: Duration,

    /// How long a single wait for notifications lasts before the running
    /// flag is re-checked. Not an idle timeout: the feed keeps waiting.
    pub poll_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            authors: Vec::new(),
            limit: 1,
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Build the subscription filter: kind 1 notes by `authors`, at most `limit`
/// stored notes.
pub fn build_filter(authors: &[String], limit: usize) -> Result<Filter> {
    let public_keys = authors
        .iter()
        .map(|key| {
            PublicKey::from_hex(key)
                .map_err(|e| Error::Config(format!("invalid author key {key}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Filter::new()
        .kind(Kind::TextNote)
        .authors(public_keys)
        .limit(limit))
}

/// Subscription on a single relay.
pub struct RelayFeed {
    client: Client,
    notifications: Receiver<RelayPoolNotification>,
    subscription_id: SubscriptionId,
    relay_url: String,
    poll_interval: Duration,
    /// Cleared by the shutdown handler.
    running: Arc<AtomicBool>,
    received: usize,
    lagged: u64,
}

impl RelayFeed {
    /// Connect to the relay and subscribe.
    ///
    /// Fails if the URL is invalid, the relay is not connected within
    /// `connect_timeout`, or the subscription is refused. Returns
    /// [`Error::Interrupted`] if `running` is cleared while waiting.
    pub async fn connect(config: RelayConfig, running: Arc<AtomicBool>) -> Result<Self> {
        let filter = build_filter(&config.authors, config.limit)?;

        tracing::info!(
            "Connecting to relay {} ({} authors, limit {})",
            config.relay_url,
            config.authors.len(),
            config.limit
        );

        let client = Client::default();
        client.add_relay(config.relay_url.as_str()).await?;
        client.connect().await;

        if let Err(e) = wait_for_connection(&client, &config, &running).await {
            client.shutdown().await;
            return Err(e);
        }
        tracing::info!("Connected to {}", config.relay_url);

        // Take the receiver before subscribing so stored notes are not missed
        let notifications = client.notifications();

        let output = client.subscribe(filter, None).await?;
        tracing::info!("Subscribed with ID: {}", output.val);

        Ok(Self {
            client,
            notifications,
            subscription_id: output.val,
            relay_url: config.relay_url,
            poll_interval: config.poll_interval,
            running,
            received: 0,
            lagged: 0,
        })
    }

    /// Relay URL this feed is subscribed to.
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// Events yielded so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Notifications dropped because the receiver fell behind.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Close the relay connection.
    pub async fn disconnect(self) {
        self.client.disconnect().await;
        tracing::info!("Disconnected from {}", self.relay_url);
    }
}

async fn wait_for_connection(
    client: &Client,
    config: &RelayConfig,
    running: &AtomicBool,
) -> Result<()> {
    let started = Instant::now();

    loop {
        if !running.load(Ordering::SeqCst) {
            tracing::info!("Stop requested while connecting to {}", config.relay_url);
            return Err(Error::Interrupted);
        }

        let relays = client.relays().await;
        if relays
            .values()
            .any(|relay| relay.status() == nostr_sdk::RelayStatus::Connected)
        {
            return Ok(());
        }

        if started.elapsed() >= config.connect_timeout {
            return Err(Error::RelayConnect {
                url: config.relay_url.clone(),
                timeout_secs: config.connect_timeout.as_secs(),
            });
        }

        tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
    }
}

/// What the feed does with one pool notification.
#[derive(Debug)]
enum Step {
    Yield(NoteEvent),
    Skip,
    Stop,
}

/// Classify a notification for `subscription_id`.
///
/// Events are taken from raw relay messages, not from
/// `RelayPoolNotification::Event`: the pool emits that variant only the first
/// time it sees an event id, which would hide notes the relay sends again
/// after a reconnect. Deduplication is the dedupe store's job.
fn classify(notification: RelayPoolNotification, subscription_id: &SubscriptionId) -> Step {
    match notification {
        RelayPoolNotification::Message { relay_url, message } => match message {
            RelayMessage::Event {
                subscription_id: sub_id,
                event,
            } => {
                if *sub_id != *subscription_id {
                    return Step::Skip;
                }
                if event.kind != Kind::TextNote {
                    tracing::debug!("Ignoring kind {} from {}", event.kind, relay_url);
                    return Step::Skip;
                }

                tracing::debug!(
                    relay = %relay_url,
                    event_id = %event.id,
                    author = %event.pubkey,
                    "Received note"
                );
                Step::Yield(NoteEvent::from(&*event))
            }
            RelayMessage::Notice(notice) => {
                tracing::warn!("Relay {} notice: {}", relay_url, notice);
                Step::Skip
            }
            RelayMessage::Closed {
                subscription_id: sub_id,
                message,
            } => {
                tracing::warn!(
                    "Relay {} closed subscription {}: {}",
                    relay_url,
                    sub_id,
                    message
                );
                Step::Skip
            }
            RelayMessage::EndOfStoredEvents(_) => {
                tracing::info!(
                    "Relay {} finished replaying stored notes, streaming live",
                    relay_url
                );
                Step::Skip
            }
            _ => Step::Skip,
        },

        // Duplicate of the matching `Message`, first sighting only
        RelayPoolNotification::Event { .. } => Step::Skip,

        RelayPoolNotification::Shutdown => {
            tracing::info!("Relay pool shutdown notification received");
            Step::Stop
        }
    }
}

impl EventFeed for RelayFeed {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn next_event(&mut self) -> Option<NoteEvent> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                tracing::info!("Stop requested, closing relay feed");
                return None;
            }

            let notification =
                match tokio::time::timeout(self.poll_interval, self.notifications.recv()).await {
                    Ok(Ok(n)) => n,
                    Ok(Err(RecvError::Closed)) => {
                        tracing::info!("Notification channel closed");
                        return None;
                    }
                    Ok(Err(RecvError::Lagged(count))) => {
                        self.lagged += count;
                        tracing::warn!(
                            "Notification receiver lagged, dropped {} messages ({} total)",
                            count,
                            self.lagged
                        );
                        continue;
                    }
                    // Timeout - re-check running flag
                    Err(_) => continue,
                };

            match classify(notification, &self.subscription_id) {
                Step::Yield(note) => {
                    self.received += 1;
                    return Some(note);
                }
                Step::Skip => continue,
                Step::Stop => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_relay_builder::MockRelay;

    fn hex_key() -> String {
        Keys::generate().public_key().to_hex()
    }

    fn relay_url() -> RelayUrl {
        RelayUrl::parse("wss://relay.example.com").unwrap()
    }

    fn event_message(subscription_id: &SubscriptionId, event: Event) -> RelayPoolNotification {
        RelayPoolNotification::Message {
            relay_url: relay_url(),
            message: RelayMessage::event(subscription_id.clone(), event),
        }
    }

    fn text_note(keys: &Keys, content: &str) -> Event {
        EventBuilder::text_note(content).sign_with_keys(keys).unwrap()
    }

    /// Publish through a throwaway client so the feed's pool has never seen
    /// the event.
    async fn publish(url: &str, event: &Event) {
        let client = Client::default();
        client.add_relay(url).await.unwrap();
        client.connect().await;
        client.wait_for_connection(Duration::from_secs(2)).await;
        client.send_event(event).await.unwrap();
        client.shutdown().await;
    }

    fn feed_config(url: &str, keys: &Keys) -> RelayConfig {
        RelayConfig {
            relay_url: url.to_string(),
            authors: vec![keys.public_key().to_hex()],
            limit: 10,
            poll_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    async fn next_within(feed: &mut RelayFeed) -> Option<NoteEvent> {
        tokio::time::timeout(Duration::from_secs(5), feed.next_event())
            .await
            .expect("feed stalled")
    }

    #[test]
    fn test_build_filter() {
        let key = hex_key();
        let filter = build_filter(std::slice::from_ref(&key), 3).unwrap();

        let kinds = filter.kinds.as_ref().unwrap();
        assert_eq!(kinds.len(), 1);
        assert!(kinds.contains(&Kind::TextNote));

        let authors = filter.authors.as_ref().unwrap();
        assert_eq!(authors.len(), 1);
        assert!(authors.contains(&PublicKey::from_hex(&key).unwrap()));

        assert_eq!(filter.limit, Some(3));
    }

    #[test]
    fn test_build_filter_rejects_bad_key() {
        let err = build_filter(&["not-hex".to_string()], 1).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.limit, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_classify_yields_text_note() {
        let keys = Keys::generate();
        let event = text_note(&keys, "hello");
        let sub_id = SubscriptionId::generate();

        match classify(event_message(&sub_id, event.clone()), &sub_id) {
            Step::Yield(note) => {
                assert_eq!(note.id, event.id.to_hex());
                assert_eq!(note.author_key, keys.public_key().to_hex());
                assert_eq!(note.content, "hello");
            }
            other => panic!("expected a note, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_skips_other_kinds() {
        let keys = Keys::generate();
        let metadata = EventBuilder::metadata(&Metadata::new().name("alice"))
            .sign_with_keys(&keys)
            .unwrap();
        let sub_id = SubscriptionId::generate();

        assert!(matches!(
            classify(event_message(&sub_id, metadata), &sub_id),
            Step::Skip
        ));
    }

    #[test]
    fn test_classify_skips_other_subscriptions() {
        let event = text_note(&Keys::generate(), "not ours");
        let ours = SubscriptionId::generate();
        let theirs = SubscriptionId::generate();

        assert!(matches!(
            classify(event_message(&theirs, event), &ours),
            Step::Skip
        ));
    }

    #[test]
    fn test_classify_ignores_first_sighting_notification() {
        let event = text_note(&Keys::generate(), "seen once");
        let sub_id = SubscriptionId::generate();
        let notification = RelayPoolNotification::Event {
            relay_url: relay_url(),
            subscription_id: sub_id.clone(),
            event: Box::new(event),
        };

        assert!(matches!(classify(notification, &sub_id), Step::Skip));
    }

    #[test]
    fn test_classify_closed_and_notice_continue() {
        let sub_id = SubscriptionId::generate();
        let closed = RelayPoolNotification::Message {
            relay_url: relay_url(),
            message: RelayMessage::closed(sub_id.clone(), "error: shutting down"),
        };
        let notice = RelayPoolNotification::Message {
            relay_url: relay_url(),
            message: RelayMessage::notice("slow down"),
        };

        assert!(matches!(classify(closed, &sub_id), Step::Skip));
        assert!(matches!(classify(notice, &sub_id), Step::Skip));
    }

    #[test]
    fn test_classify_shutdown_stops() {
        let sub_id = SubscriptionId::generate();
        assert!(matches!(
            classify(RelayPoolNotification::Shutdown, &sub_id),
            Step::Stop
        ));
    }

    #[tokio::test]
    async fn test_feed_yields_stored_note() {
        let relay = MockRelay::run().await.unwrap();
        let url = relay.url();
        let keys = Keys::generate();
        let event = text_note(&keys, "gm");
        publish(&url, &event).await;

        let mut feed = RelayFeed::connect(feed_config(&url, &keys), Arc::new(AtomicBool::new(true)))
            .await
            .unwrap();

        let note = next_within(&mut feed).await.unwrap();
        assert_eq!(note.id, event.id.to_hex());
        assert_eq!(note.author_key, keys.public_key().to_hex());
        assert_eq!(note.content, "gm");
        assert_eq!(feed.received(), 1);

        feed.disconnect().await;
    }

    #[tokio::test]
    async fn test_feed_yields_note_sent_again_after_resubscribe() {
        let relay = MockRelay::run().await.unwrap();
        let url = relay.url();
        let keys = Keys::generate();
        let event = text_note(&keys, "try again");
        publish(&url, &event).await;

        let config = feed_config(&url, &keys);
        let filter = build_filter(&config.authors, config.limit).unwrap();
        let mut feed = RelayFeed::connect(config, Arc::new(AtomicBool::new(true)))
            .await
            .unwrap();

        let first = next_within(&mut feed).await.unwrap();
        assert_eq!(first.id, event.id.to_hex());

        // Same thing the pool does after a reconnect
        feed.client
            .subscribe_with_id(feed.subscription_id.clone(), filter, None)
            .await
            .unwrap();

        let again = next_within(&mut feed).await.unwrap();
        assert_eq!(again.id, event.id.to_hex());
        assert_eq!(feed.received(), 2);

        feed.disconnect().await;
    }

    #[tokio::test]
    async fn test_feed_stops_when_running_cleared() {
        let relay = MockRelay::run().await.unwrap();
        let url = relay.url();
        let keys = Keys::generate();
        let running = Arc::new(AtomicBool::new(true));

        let mut feed = RelayFeed::connect(feed_config(&url, &keys), Arc::clone(&running))
            .await
            .unwrap();

        running.store(false, Ordering::SeqCst);
        assert!(next_within(&mut feed).await.is_none());
        assert_eq!(feed.received(), 0);
    }

    #[tokio::test]
    async fn test_feed_ends_on_pool_shutdown() {
        let relay = MockRelay::run().await.unwrap();
        let url = relay.url();
        let keys = Keys::generate();

        let mut feed = RelayFeed::connect(feed_config(&url, &keys), Arc::new(AtomicBool::new(true)))
            .await
            .unwrap();

        feed.client.shutdown().await;
        assert!(next_within(&mut feed).await.is_none());
    }

    #[tokio::test]
    async fn test_connect_fails_when_relay_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = RelayConfig {
            relay_url: format!("ws://{addr}"),
            authors: vec![hex_key()],
            connect_timeout: Duration::from_millis(300),
            ..Default::default()
        };

        let result = RelayFeed::connect(config, Arc::new(AtomicBool::new(true))).await;
        assert!(matches!(result, Err(Error::RelayConnect { .. })));
    }

    #[tokio::test]
    async fn test_connect_interrupted_by_shutdown_request() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = RelayConfig {
            relay_url: format!("ws://{addr}"),
            authors: vec![hex_key()],
            connect_timeout: Duration::from_secs(30),
            ..Default::default()
        };

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            RelayFeed::connect(config, Arc::new(AtomicBool::new(false))),
        )
        .await
        .expect("connect ignored the running flag");
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let config = RelayConfig {
            relay_url: "not a url".to_string(),
            authors: vec![hex_key()],
            ..Default::default()
        };

        let result = RelayFeed::connect(config, Arc::new(AtomicBool::new(true))).await;
        assert!(matches!(result, Err(Error::NostrSdk(_))));
    }
}
