//! Telegram Bot API notifier with Markdown formatting.
//!
//! Delivers notifications via the Telegram Bot API `sendMessage` endpoint.
//! Supports MarkdownV2 formatting and rate limit handling.

use crate::channel::{ChannelSpec, DriverContext};
use crate::traits::{Notification, Notifier, NotifyError};

/// Escapes special characters for Telegram MarkdownV2 parse mode.
///
/// Telegram requires these characters to be escaped with a preceding backslash
/// when using MarkdownV2: `_`, `*`, `[`, `]`, `(`, `)`, `~`, `` ` ``, `>`,
/// `#`, `+`, `-`, `=`, `|`, `{`, `}`, `.`, `!`
pub fn escape_markdown_v2(text: &str) -> String {
    let special = ['_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!'];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if special.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

/// Sends notifications via the Telegram Bot API.
#[derive(Debug)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    parse_mode: Option<String>,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Config keys: `bot_token`, `chat_id` (both required, `${ENV}` allowed),
    /// `parse_mode` (`MarkdownV2` or `HTML`, optional).
    pub fn from_channel(spec: &ChannelSpec, ctx: &DriverContext) -> Result<Self, NotifyError> {
        let bot_token = spec.optional("bot_token")?.unwrap_or_default();
        if bot_token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            bot_token,
            chat_id: spec.required("chat_id")?,
            parse_mode: spec.optional("parse_mode")?,
            client: ctx.client.clone(),
        })
    }

    /// Message text: title on the first line, body below.
    fn message_text(&self, notification: &Notification) -> String {
        match self.parse_mode.as_deref() {
            Some("MarkdownV2") => format!(
                "*{}*\n{}",
                escape_markdown_v2(&notification.title),
                escape_markdown_v2(&notification.body)
            ),
            _ if notification.title.is_empty() => notification.body.clone(),
            _ => format!("{}\n\n{}", notification.title, notification.body),
        }
    }

    fn request(&self, notification: &Notification) -> Result<reqwest::Request, NotifyError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": self.message_text(notification),
        });

        if let Some(ref mode) = self.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        Ok(self.client.post(&url).json(&body).build()?)
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::debug!(
            chat_id = %self.chat_id,
            parse_mode = ?self.parse_mode,
            "Sending Telegram notification"
        );

        let response = self.client.execute(self.request(notification)?).await?;

        let status = response.status();
        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::debug!(chat_id = %self.chat_id, "Telegram notification sent");
            return Ok(());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");

        Err(NotifyError::from_status("telegram", status, description))
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
