//! Implements the `Notifier` trait by posting embeds to a Discord webhook.

use crate::api::{Notification, Notifier};
use crate::Result;
use anyhow::{bail, Context};
use chrono::Local;
use std::time::Duration;
use tracing::trace;
use url::Url;

const FOOTER: &str = "KPI Hub";
const TIMEOUT: Duration = Duration::from_secs(10);

/// Posts notifications as Discord embeds. Without a webhook URL every notification is dropped.
pub(super) struct DiscordNotifier {
    webhook_url: Option<Url>,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub(super) fn new(webhook_url: Option<&Url>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("Failed to create the webhook HTTP client")?;
        Ok(Self {
            webhook_url: webhook_url.cloned(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            trace!("No webhook configured, dropping '{}'", notification.title);
            return Ok(());
        };

        let response = self
            .client
            .post(url.clone())
            .json(&payload(notification, &timestamp()))
            .send()
            .await
            .context("Discord webhook request failed")?;

        if !response.status().is_success() {
            bail!("Discord returned status: {}", response.status());
        }
        Ok(())
    }
}

fn timestamp() -> String {
    Local::now().format("%m/%d/%Y %I:%M:%S %p").to_string()
}

fn payload(notification: &Notification, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "embeds": [{
            "title": notification.title,
            "description": notification.body,
            "color": notification.severity.color(),
            "footer": {"text": format!("{FOOTER} | {timestamp}")},
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Severity;

    #[test]
    fn test_payload_shape() {
        let n = Notification::new("Title", "Body", Severity::Warning);
        let p = payload(&n, "01/02/2025 03:04:05 PM");
        let embed = &p["embeds"][0];
        assert_eq!(embed["title"], "Title");
        assert_eq!(embed["description"], "Body");
        assert_eq!(embed["color"], 16_776_960);
        assert_eq!(embed["footer"]["text"], "KPI Hub | 01/02/2025 03:04:05 PM");
    }

    #[tokio::test]
    async fn test_no_webhook_is_a_no_op() {
        let notifier = DiscordNotifier::new(None).unwrap();
        let n = Notification::new("Title", "Body", Severity::Success);
        notifier.notify(&n).await.unwrap();
    }
}
