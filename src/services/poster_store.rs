//! Poster storage via a Telegram channel
//!
//! Posters are parked in a Telegram channel through the Bot API and served
//! from the bot file endpoint. Storage failure is never fatal; the catalog
//! entry simply goes without art.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn};

/// Uploads poster images to a Telegram channel
pub struct PosterStore {
    client: Client,
    bot_token: Option<String>,
    channel_id: Option<String>,
}

impl PosterStore {
    pub fn new(bot_token: Option<String>, channel_id: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to create HTTP client"),
            bot_token,
            channel_id,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.channel_id.is_some()
    }

    /// Store poster bytes and return a public file URL, or `None` on any
    /// failure (including an unconfigured store).
    pub async fn store(&self, bytes: Vec<u8>, title: &str, caption: &str) -> Option<String> {
        if !self.is_configured() {
            return None;
        }

        match self.send_photo(bytes, title, caption).await {
            Ok(url) => {
                info!(title = %title, "Poster stored");
                Some(url)
            }
            Err(e) => {
                warn!(title = %title, error = %e, "Poster store failed");
                None
            }
        }
    }

    async fn send_photo(&self, bytes: Vec<u8>, title: &str, caption: &str) -> Result<String> {
        let token = self.bot_token.as_deref().context("Bot token missing")?;
        let channel = self.channel_id.as_deref().context("Channel id missing")?;

        let part = Part::bytes(bytes)
            .file_name(format!("{}_poster.jpg", sanitize_filename::sanitize(title)))
            .mime_str("image/jpeg")
            .context("Invalid poster mime type")?;

        let form = Form::new()
            .text("chat_id", channel.to_string())
            .text("caption", format!("{}\n{}", title, caption))
            .part("photo", part);

        let response = self
            .client
            .post(format!("https://api.telegram.org/bot{}/sendPhoto", token))
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?;

        let body: Value = response
            .json()
            .await
            .context("Invalid sendPhoto response")?;

        if body.get("ok") != Some(&Value::Bool(true)) {
            anyhow::bail!("sendPhoto rejected: {}", body);
        }

        // Telegram returns the photo in several resolutions; the last entry
        // is the largest
        let file_id = body
            .pointer("/result/photo")
            .and_then(Value::as_array)
            .and_then(|photos| photos.last())
            .and_then(|photo| photo.get("file_id"))
            .and_then(Value::as_str)
            .context("sendPhoto response missing file_id")?;

        self.file_url(token, file_id).await
    }

    /// Resolve a file id to the bot file endpoint URL
    async fn file_url(&self, token: &str, file_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("https://api.telegram.org/bot{}/getFile", token))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .context("getFile request failed")?;

        let body: Value = response.json().await.context("Invalid getFile response")?;

        let file_path = body
            .pointer("/result/file_path")
            .and_then(Value::as_str)
            .context("getFile response missing file_path")?;

        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            token, file_path
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_store_yields_none() {
        let store = PosterStore::new(None, None);
        assert!(!store.is_configured());
        assert!(store.store(vec![1, 2, 3], "Amaran", "desc").await.is_none());
    }

    #[test]
    fn test_partial_configuration_is_unconfigured() {
        let store = PosterStore::new(Some("token".to_string()), None);
        assert!(!store.is_configured());
    }
}
