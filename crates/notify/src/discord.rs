//! Discord webhook notifier.
//!
//! Posts a single embed per notification. Embed colour follows priority.

use serde_json::json;

use crate::channel::{ChannelSpec, DriverContext};
use crate::traits::{Notification, Notifier, NotifyError, Priority};

/// Discord embed limits.
const MAX_TITLE_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4096;

fn embed_color(priority: Priority) -> u32 {
    match priority {
        Priority::Min | Priority::Low => 0x95a5a6,
        Priority::Default => 0x3498db,
        Priority::High => 0xe67e22,
        Priority::Urgent => 0xe74c3c,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Sends notifications to a Discord channel webhook.
#[derive(Debug)]
pub struct DiscordNotifier {
    webhook_url: String,
    username: Option<String>,
    client: reqwest::Client,
}

impl DiscordNotifier {
    /// Config keys: `webhook_url` (required), `username` (optional override).
    pub fn from_channel(spec: &ChannelSpec, ctx: &DriverContext) -> Result<Self, NotifyError> {
        let webhook_url = spec.required("webhook_url")?;
        if !webhook_url.starts_with("https://") && !webhook_url.starts_with("http://") {
            return Err(NotifyError::Config(format!(
                "channel '{}': webhook_url must be an http(s) URL",
                spec.id
            )));
        }
        Ok(Self {
            webhook_url,
            username: spec.optional("username")?,
            client: ctx.client.clone(),
        })
    }

    fn request(&self, notification: &Notification) -> Result<reqwest::Request, NotifyError> {
        let mut body = json!({
            "embeds": [{
                "title": truncate_chars(&notification.title, MAX_TITLE_CHARS),
                "description": truncate_chars(&notification.body, MAX_DESCRIPTION_CHARS),
                "color": embed_color(notification.priority),
            }]
        });
        if let Some(ref username) = self.username {
            body["username"] = json!(username);
        }
        Ok(self.client.post(&self.webhook_url).json(&body).build()?)
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.execute(self.request(notification)?).await?;
        let status = response.status();

        if status.is_success() {
            tracing::debug!("discord notification delivered");
            return Ok(());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let resp_body: serde_json::Value = response.json().await.unwrap_or_default();
            let retry_after = resp_body
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(30);
            tracing::warn!(retry_after, "discord rate limited");
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let body_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::warn!(%status, body = %body_text, "discord rejected message");
        Err(NotifyError::from_status("discord", status, &body_text))
    }

    fn channel_name(&self) -> &str {
        "discord"
    }
}
