//! Generic HTTP webhook notifier.
//!
//! Delivers notifications as JSON payloads to configured webhook URLs
//! with optional custom headers and request body templates.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::{ChannelSpec, DriverContext};
use crate::templating::TemplateRenderer;
use crate::traits::{Notification, Notifier, NotifyError};

/// Delivers notifications over HTTP to a configured endpoint.
///
/// Supports configurable HTTP method, custom headers, and an optional
/// body template rendered via [`TemplateRenderer`] with the notification
/// (`title`, `body`, `priority`, `metadata`) as scope. Without a template
/// the notification is serialized as JSON.
#[derive(Debug)]
pub struct WebhookNotifier {
    /// Target URL (env vars already resolved).
    url: String,
    method: reqwest::Method,
    /// Custom headers to include on every request.
    headers: HashMap<String, String>,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Build from channel config.
    ///
    /// Config keys: `url` (required), `method` (default `POST`), `headers`
    /// (mapping), `body_template` (optional minijinja template).
    /// Invalid methods or body templates produce [`NotifyError::Config`].
    pub fn from_channel(spec: &ChannelSpec, ctx: &DriverContext) -> Result<Self, NotifyError> {
        let method = match spec.optional("method")? {
            Some(m) => m
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
            None => reqwest::Method::POST,
        };

        let body_template = spec.optional("body_template")?;
        if let Some(ref tmpl) = body_template {
            ctx.renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        Ok(Self {
            url: spec.required("url")?,
            method,
            headers: spec.string_map("headers")?,
            body_template,
            renderer: Arc::clone(&ctx.renderer),
            client: ctx.client.clone(),
        })
    }

    fn request(&self, notification: &Notification) -> Result<reqwest::Request, NotifyError> {
        let (body, content_type) = match self.body_template {
            Some(ref tmpl) => (self.renderer.render(tmpl, notification), "text/plain"),
            None => (
                serde_json::to_string(notification).map_err(|e| {
                    NotifyError::Config(format!("failed to serialize notification: {e}"))
                })?,
                "application/json",
            ),
        };

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        Ok(request.build()?)
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.execute(self.request(notification)?).await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::from_status("webhook", status, &body_text));
        }

        tracing::debug!(
            url = %self.url,
            method = %self.method,
            status = %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
