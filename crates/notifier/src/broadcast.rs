//! Fire-and-forget status broadcasts to a notification endpoint.

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
struct BroadcastPayload<'a> {
    message: &'a str,
}

/// Posts plain status messages to a single broadcast endpoint.
///
/// Delivery is best-effort: the result is a bool rather than an error,
/// since a missed broadcast never blocks capture or violation delivery.
pub struct BroadcastNotifier {
    client: Client,
    broadcast_url: String,
}

impl BroadcastNotifier {
    pub fn new(client: Client, broadcast_url: impl Into<String>) -> Self {
        Self {
            client,
            broadcast_url: broadcast_url.into(),
        }
    }

    /// Send one message as JSON. True only when the endpoint accepts it.
    pub async fn broadcast_message(&self, message: &str) -> bool {
        let result = self
            .client
            .post(&self.broadcast_url)
            .json(&BroadcastPayload { message })
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(url = %self.broadcast_url, "broadcast delivered");
                true
            }
            Ok(response) => {
                warn!(
                    url = %self.broadcast_url,
                    status = %response.status(),
                    "broadcast rejected"
                );
                false
            }
            Err(err) => {
                warn!(url = %self.broadcast_url, error = %err, "broadcast failed");
                false
            }
        }
    }
}
