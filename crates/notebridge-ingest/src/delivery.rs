//! Webhook delivery.
//!
//! [`DeliveryClient`] is the seam the ingest loop sends through;
//! [`WebhookClient`] posts to a Slack-style incoming webhook:
//!
//! ```text
//! POST <url>
//! Content-Type: application/json
//!
//! {"text": "<message>"}
//! ```
//!
//! Any 2xx response is success. There is no retry here; an event whose
//! delivery fails is left unmarked and goes out again only if the relay sends
//! it again.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Default request timeout for webhook deliveries.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response body kept in [`DeliveryError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Errors from a single delivery attempt.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The endpoint did not answer within the timeout.
    #[error("webhook request timed out")]
    Timeout,

    /// The endpoint could not be reached.
    #[error("webhook request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("webhook returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Sends a formatted notification to an external endpoint.
pub trait DeliveryClient {
    /// Deliver one message. Resolves once the endpoint has answered.
    fn send(&self, message: &str) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// JSON body of a webhook request.
#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Incoming-webhook client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
}

impl WebhookClient {
    /// Create a client for `url` with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl DeliveryClient for WebhookClient {
    async fn send(&self, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(&self.url)
            .json(&WebhookPayload { text: message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
