//! Routes notifications to configured channels.
//!
//! The dispatcher receives a rendered notification and the channel ids of
//! the triggering rule, resolves each id through the [`ChannelStore`], builds
//! the driver through the [`ChannelRegistry`], and sends to all channels
//! concurrently. Individual channel failures don't block other channels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::channel::{ChannelRegistry, ChannelStore, DriverContext};
use crate::templating::TemplateRenderer;
use crate::traits::{DeliveryAttempt, Notification, NotifyError};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches notifications to the channels referenced by a rule.
pub struct Dispatcher {
    registry: ChannelRegistry,
    store: Arc<dyn ChannelStore>,
    ctx: DriverContext,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: ChannelRegistry, store: Arc<dyn ChannelStore>) -> Self {
        Self {
            registry,
            store,
            ctx: DriverContext::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<TemplateRenderer>) -> Self {
        self.ctx.renderer = renderer;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.ctx.client = client;
        self
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Deliver a notification to every channel id.
    ///
    /// Returns one attempt per channel id, in the given order. Unknown
    /// channels, unknown drivers, disabled channels, send errors and
    /// timeouts all become failed attempts for that channel only.
    pub async fn dispatch(
        &self,
        rule_id: &str,
        channel_ids: &[String],
        notification: &Notification,
    ) -> Vec<DeliveryAttempt> {
        if channel_ids.is_empty() {
            tracing::debug!(rule_id, "No notification channels configured");
            return Vec::new();
        }

        let sends = channel_ids
            .iter()
            .map(|channel_id| self.deliver(rule_id, channel_id, notification));
        join_all(sends).await
    }

    async fn deliver(
        &self,
        rule_id: &str,
        channel_id: &str,
        notification: &Notification,
    ) -> DeliveryAttempt {
        let spec = match self.store.channel(channel_id) {
            Ok(Some(spec)) => spec,
            Ok(None) => {
                let err = NotifyError::ChannelNotFound(channel_id.to_string());
                tracing::warn!(rule_id, channel = channel_id, "Notification channel not configured");
                return DeliveryAttempt::failed(channel_id, None, &err);
            }
            Err(e) => {
                tracing::warn!(rule_id, channel = channel_id, error = %e, "Channel lookup failed");
                return DeliveryAttempt::failed(channel_id, None, &e);
            }
        };

        let driver = Some(spec.driver.clone());
        if !spec.enabled {
            tracing::debug!(rule_id, channel = channel_id, "Channel disabled, skipping");
            let err = NotifyError::ChannelDisabled(channel_id.to_string());
            return DeliveryAttempt::failed(channel_id, driver, &err);
        }

        let notifier = match self.registry.build(&spec, &self.ctx) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(
                    rule_id,
                    channel = channel_id,
                    driver = %spec.driver,
                    error = %e,
                    "Could not build channel driver"
                );
                return DeliveryAttempt::failed(channel_id, driver, &e);
            }
        };

        let start = Instant::now();
        let result = match tokio::time::timeout(self.send_timeout, notifier.send(notification)).await
        {
            Ok(r) => r,
            Err(_) => Err(NotifyError::Timeout(self.send_timeout.as_secs())),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::info!(
                    rule_id,
                    channel = channel_id,
                    driver = notifier.channel_name(),
                    duration_ms,
                    "Notification delivered"
                );
                (true, None)
            }
            Err(e) => {
                tracing::warn!(
                    rule_id,
                    channel = channel_id,
                    driver = notifier.channel_name(),
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        DeliveryAttempt {
            channel_id: channel_id.to_string(),
            driver,
            success,
            error,
            duration_ms,
        }
    }

    /// Send a fixed test notification through one channel.
    pub async fn test_channel(&self, channel_id: &str) -> Result<(), NotifyError> {
        let spec = self
            .store
            .channel(channel_id)?
            .ok_or_else(|| NotifyError::ChannelNotFound(channel_id.to_string()))?;
        let notifier = self.registry.build(&spec, &self.ctx)?;

        match tokio::time::timeout(self.send_timeout, notifier.test()).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.send_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelSpec, StaticChannelStore};
    use crate::traits::{Notifier, Priority};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockNotifier {
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            "mock"
        }
    }

    /// Registry with `mock` (succeeds), `failing` and `slow` drivers sharing one counter.
    fn registry(count: &Arc<AtomicUsize>) -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        for (driver, should_fail, delay) in [
            ("mock", false, None),
            ("failing", true, None),
            ("slow", false, Some(Duration::from_secs(5))),
        ] {
            let count = Arc::clone(count);
            registry.register(driver, move |_, _| {
                Ok(Box::new(MockNotifier {
                    send_count: Arc::clone(&count),
                    should_fail,
                    delay,
                }))
            });
        }
        registry
    }

    fn notification() -> Notification {
        Notification::new("test", "test body", Priority::Default)
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count = Arc::new(AtomicUsize::new(0));
        let store = StaticChannelStore::new(vec![
            ChannelSpec::new("a", "mock"),
            ChannelSpec::new("b", "mock"),
        ]);
        let dispatcher = Dispatcher::new(registry(&count), Arc::new(store));

        let results = dispatcher.dispatch("rule-1", &ids(&["a", "b"]), &notification()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].driver.as_deref(), Some("mock"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));
        let store = StaticChannelStore::new(vec![
            ChannelSpec::new("ok-1", "mock"),
            ChannelSpec::new("broken", "failing"),
            ChannelSpec::new("ok-2", "mock"),
        ]);
        let dispatcher = Dispatcher::new(registry(&count), Arc::new(store));

        let results = dispatcher
            .dispatch("rule-1", &ids(&["ok-1", "broken", "ok-2"]), &notification())
            .await;
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
        assert_eq!(results[1].channel_id, "broken");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unresolvable_channels_fail_individually() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut disabled = ChannelSpec::new("off", "mock");
        disabled.enabled = false;
        let store = StaticChannelStore::new(vec![
            ChannelSpec::new("ok", "mock"),
            ChannelSpec::new("pigeon", "carrier-pigeon"),
            disabled,
        ]);
        let dispatcher = Dispatcher::new(registry(&count), Arc::new(store));

        let results = dispatcher
            .dispatch("rule-1", &ids(&["missing", "pigeon", "off", "ok"]), &notification())
            .await;

        assert_eq!(results.len(), 4);
        assert!(results[0].error.as_deref().unwrap().contains("not found"));
        assert!(results[0].driver.is_none());
        assert!(results[1].error.as_deref().unwrap().contains("carrier-pigeon"));
        assert!(results[2].error.as_deref().unwrap().contains("disabled"));
        assert!(results[3].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_channel_times_out() {
        let count = Arc::new(AtomicUsize::new(0));
        let store = StaticChannelStore::new(vec![
            ChannelSpec::new("slow", "slow"),
            ChannelSpec::new("fast", "mock"),
        ]);
        let dispatcher =
            Dispatcher::new(registry(&count), Arc::new(store)).with_timeout(Duration::from_secs(1));

        let results = dispatcher.dispatch("rule-1", &ids(&["slow", "fast"]), &notification()).await;
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn no_channels_returns_empty() {
        let dispatcher = Dispatcher::new(ChannelRegistry::new(), Arc::new(StaticChannelStore::default()));
        assert!(dispatcher.dispatch("rule-1", &[], &notification()).await.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sends_and_reports_missing() {
        let count = Arc::new(AtomicUsize::new(0));
        let store = StaticChannelStore::new(vec![ChannelSpec::new("a", "mock")]);
        let dispatcher = Dispatcher::new(registry(&count), Arc::new(store));

        dispatcher.test_channel("a").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            dispatcher.test_channel("zzz").await,
            Err(NotifyError::ChannelNotFound(_))
        ));
    }
}
