//! ntfy push notifier.
//!
//! Publishes through ntfy's JSON endpoint (`POST {server}` with the topic in
//! the body) so titles may contain any UTF-8 text.

use serde_json::json;

use crate::channel::{ChannelSpec, DriverContext};
use crate::traits::{Notification, Notifier, NotifyError};

const DEFAULT_SERVER: &str = "https://ntfy.sh";

/// Sends notifications to an ntfy topic.
#[derive(Debug)]
pub struct NtfyNotifier {
    server: String,
    topic: String,
    token: Option<String>,
    tags: Vec<String>,
    client: reqwest::Client,
}

impl NtfyNotifier {
    /// Config keys: `server` (default `https://ntfy.sh`), `topic` (required),
    /// `token` (optional access token), `tags` (optional list).
    pub fn from_channel(spec: &ChannelSpec, ctx: &DriverContext) -> Result<Self, NotifyError> {
        let server = spec
            .optional("server")?
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let topic = spec.required("topic")?;
        if topic.contains('/') {
            return Err(NotifyError::Config(format!(
                "channel '{}': ntfy topic must not contain '/'",
                spec.id
            )));
        }

        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            topic,
            token: spec.optional("token")?.filter(|t| !t.is_empty()),
            tags: spec.string_list("tags")?,
            client: ctx.client.clone(),
        })
    }

    fn request(&self, notification: &Notification) -> Result<reqwest::Request, NotifyError> {
        let mut body = json!({
            "topic": self.topic,
            "title": notification.title,
            "message": notification.body,
            "priority": notification.priority.level(),
        });
        if !self.tags.is_empty() {
            body["tags"] = json!(self.tags);
        }

        let mut request = self.client.post(&self.server).json(&body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        Ok(request.build()?)
    }
}

#[async_trait::async_trait]
impl Notifier for NtfyNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.execute(self.request(notification)?).await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(topic = %self.topic, %status, body = %body_text, "ntfy rejected message");
            return Err(NotifyError::from_status("ntfy", status, &body_text));
        }

        tracing::debug!(topic = %self.topic, "ntfy notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "ntfy"
    }
}
