//! Operator notifications
//!
//! Fire-and-forget Telegram message on successful catalog additions. The
//! notifier is an explicit injected capability; components that hold one
//! never change their own success/failure status based on it.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

/// Sends success notifications to the operator chat
pub struct Notifier {
    client: Client,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl Notifier {
    pub fn new(bot_token: Option<String>, chat_id: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            bot_token,
            chat_id,
        }
    }

    /// Notifier with nothing configured; every send is a no-op.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    /// Announce a successful catalog addition. Failures are logged and
    /// swallowed.
    pub async fn notify_added(&self, title: &str, media_id: i64) {
        let (Some(token), Some(chat_id)) = (self.bot_token.as_deref(), self.chat_id.as_deref())
        else {
            debug!("Notifier not configured, skipping");
            return;
        };

        let message = format!(
            "Movie auto-added\n\nTitle: {}\nCatalog id: {}",
            title, media_id
        );

        let result = self
            .client
            .post(format!("https://api.telegram.org/bot{}/sendMessage", token))
            .json(&json!({
                "chat_id": chat_id,
                "text": message,
            }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(title = %title, "Operator notified");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Notification rejected");
            }
            Err(e) => {
                warn!(error = %e, "Notification send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_notifier_is_a_noop() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_configured());
        // Must return without attempting any network call
        notifier.notify_added("Amaran", 7).await;
    }
}
