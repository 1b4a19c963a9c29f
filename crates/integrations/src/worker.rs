//! Background integration polling.
//!
//! Each configured integration gets a runtime: its driver plus the state the
//! worker owns (last-known snapshot, failure counter). The state sits behind
//! a per-integration `tokio::sync::Mutex`; a tick that finds the lock held
//! skips that integration, so polls of one integration never overlap while
//! distinct integrations poll concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lifeops_core::config::SyncConfig;
use lifeops_core::{names, EventSink};

use crate::config::IntegrationConfig;
use crate::error::IntegrationError;
use crate::registry::IntegrationRegistry;
use crate::snapshot::{diff, integration_payload, Snapshot};
use crate::traits::IntegrationDriver;

/// Largest multiple of the poll interval a failing integration waits.
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Where an integration is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Polling,
    /// Last poll failed; the next one is delayed.
    Backoff,
}

/// Worker-owned state for one integration.
#[derive(Debug)]
struct RuntimeState {
    phase: SyncPhase,
    snapshot: Option<Snapshot>,
    consecutive_failures: u32,
    unreachable_since: Option<DateTime<Utc>>,
    last_polled: Option<Instant>,
    last_error: Option<String>,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            snapshot: None,
            consecutive_failures: 0,
            unreachable_since: None,
            last_polled: None,
            last_error: None,
        }
    }

    fn next_due(&self, interval: Duration) -> Option<Instant> {
        let last = self.last_polled?;
        let factor = match self.phase {
            SyncPhase::Backoff => 2u32
                .saturating_pow(self.consecutive_failures.saturating_sub(1))
                .min(MAX_BACKOFF_FACTOR),
            _ => 1,
        };
        Some(last + interval * factor)
    }
}

struct IntegrationRuntime {
    config: IntegrationConfig,
    driver: Arc<dyn IntegrationDriver>,
    state: Arc<Mutex<RuntimeState>>,
}

/// Result of one integration's turn in a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A poll of this integration was already running.
    Skipped,
    NotDue,
    /// First successful poll; snapshot stored, nothing emitted.
    Baseline { resources: usize },
    /// Snapshot replaced; `events` bus events emitted.
    Updated { events: usize },
    Failed { error: String, consecutive_failures: u32 },
}

/// Read-only view of an integration's sync state.
#[derive(Debug, Clone)]
pub struct IntegrationStatus {
    pub id: String,
    pub phase: SyncPhase,
    pub resources: Option<usize>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Polls every configured integration and turns state changes into events.
pub struct SyncWorker {
    registry: Arc<IntegrationRegistry>,
    sink: Arc<dyn EventSink>,
    client: reqwest::Client,
    config: SyncConfig,
    runtimes: RwLock<BTreeMap<String, Arc<IntegrationRuntime>>>,
}

impl SyncWorker {
    pub fn new(registry: Arc<IntegrationRegistry>, sink: Arc<dyn EventSink>, config: SyncConfig) -> Self {
        Self {
            registry,
            sink,
            client: reqwest::Client::new(),
            config,
            runtimes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Reconcile runtimes with the configured integrations.
    ///
    /// - Adds runtimes for new enabled integrations.
    /// - Rebuilds changed ones; when the type and connection are unchanged the
    ///   snapshot and failure state carry over.
    /// - Removes runtimes for deleted or disabled integrations.
    ///
    /// An integration whose driver cannot be built is logged and skipped.
    pub async fn sync_configs(&self, configs: &[IntegrationConfig]) {
        let mut runtimes = self.runtimes.write().await;
        let wanted: BTreeMap<&str, &IntegrationConfig> = configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| (c.id.as_str(), c))
            .collect();

        runtimes.retain(|id, _| wanted.contains_key(id.as_str()));

        for (id, config) in wanted {
            let existing = runtimes.get(id).cloned();
            let runtime = match existing {
                Some(rt) if rt.config == *config => continue,
                Some(rt) if same_endpoint(&rt.config, config) => IntegrationRuntime {
                    config: config.clone(),
                    driver: Arc::clone(&rt.driver),
                    state: Arc::clone(&rt.state),
                },
                _ => match self.registry.create(config, &self.client) {
                    Ok(driver) => IntegrationRuntime {
                        config: config.clone(),
                        driver: Arc::from(driver),
                        state: Arc::new(Mutex::new(RuntimeState::new())),
                    },
                    Err(e) => {
                        warn!(
                            integration_id = %id,
                            integration_type = %config.integration_type,
                            error = %e,
                            "integration skipped: driver could not be built"
                        );
                        runtimes.remove(id);
                        continue;
                    }
                },
            };
            debug!(integration_id = %id, "integration runtime synced");
            runtimes.insert(id.to_string(), Arc::new(runtime));
        }
    }

    /// Ids of integrations with a live runtime.
    pub async fn integration_ids(&self) -> Vec<String> {
        self.runtimes.read().await.keys().cloned().collect()
    }

    /// Current state per integration. Integrations mid-poll report `Polling`.
    pub async fn status(&self) -> Vec<IntegrationStatus> {
        let runtimes: Vec<_> = self.runtimes.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(runtimes.len());
        for rt in runtimes {
            let status = match rt.state.try_lock() {
                Ok(state) => IntegrationStatus {
                    id: rt.config.id.clone(),
                    phase: state.phase,
                    resources: state.snapshot.as_ref().map(Snapshot::len),
                    consecutive_failures: state.consecutive_failures,
                    last_error: state.last_error.clone(),
                },
                Err(_) => IntegrationStatus {
                    id: rt.config.id.clone(),
                    phase: SyncPhase::Polling,
                    resources: None,
                    consecutive_failures: 0,
                    last_error: None,
                },
            };
            out.push(status);
        }
        out
    }

    /// Poll every integration that is due, concurrently.
    pub async fn tick(&self) -> BTreeMap<String, PollOutcome> {
        let runtimes: Vec<_> = self.runtimes.read().await.values().cloned().collect();
        let now = Instant::now();
        let polls = runtimes.into_iter().map(|rt| async move {
            let outcome = self.poll_runtime(&rt, now, false).await;
            (rt.config.id.clone(), outcome)
        });
        join_all(polls).await.into_iter().collect()
    }

    /// Poll one integration immediately, ignoring its interval.
    pub async fn poll_now(&self, integration_id: &str) -> Option<PollOutcome> {
        let rt = self.runtimes.read().await.get(integration_id).cloned()?;
        Some(self.poll_runtime(&rt, Instant::now(), true).await)
    }

    async fn poll_runtime(&self, rt: &IntegrationRuntime, now: Instant, force: bool) -> PollOutcome {
        let Ok(mut state) = rt.state.try_lock() else {
            debug!(integration_id = %rt.config.id, "poll already running, skipping");
            return PollOutcome::Skipped;
        };

        if !force {
            if let Some(due) = state.next_due(rt.config.poll_interval) {
                if now < due {
                    return PollOutcome::NotDue;
                }
            }
        }

        state.phase = SyncPhase::Polling;
        state.last_polled = Some(now);

        let timeout = self.config.poll_timeout();
        let result = match tokio::time::timeout(timeout, rt.driver.poll()).await {
            Ok(r) => r.map_err(|e| e.to_string()),
            Err(_) => Err(IntegrationError::Timeout(timeout.as_secs()).to_string()),
        };

        match result {
            Ok(snapshot) => self.on_success(rt, &mut state, snapshot).await,
            Err(error) => self.on_failure(rt, &mut state, error).await,
        }
    }

    async fn on_success(
        &self,
        rt: &IntegrationRuntime,
        state: &mut RuntimeState,
        snapshot: Snapshot,
    ) -> PollOutcome {
        let mut emitted = 0;

        if let Some(since) = state.unreachable_since.take() {
            let downtime = (Utc::now() - since).num_seconds().max(0);
            info!(integration_id = %rt.config.id, downtime_secs = downtime, "integration recovered");
            let mut payload = integration_payload(&rt.config);
            payload.insert("downtime_secs".into(), json!(downtime));
            self.sink.emit(names::INTEGRATION_RECOVERED, payload).await;
            emitted += 1;
        }

        state.consecutive_failures = 0;
        state.last_error = None;
        state.phase = SyncPhase::Idle;

        let outcome = match state.snapshot.as_ref() {
            None => {
                info!(
                    integration_id = %rt.config.id,
                    resources = snapshot.len(),
                    "baseline snapshot established"
                );
                if emitted == 0 {
                    PollOutcome::Baseline {
                        resources: snapshot.len(),
                    }
                } else {
                    PollOutcome::Updated { events: emitted }
                }
            }
            Some(previous) => {
                for transition in diff(previous, &snapshot) {
                    for (name, payload) in transition.events(&rt.config) {
                        debug!(
                            integration_id = %rt.config.id,
                            resource_id = %transition.id(),
                            event = name,
                            "resource transition"
                        );
                        self.sink.emit(name, payload).await;
                        emitted += 1;
                    }
                }
                PollOutcome::Updated { events: emitted }
            }
        };

        state.snapshot = Some(snapshot);
        outcome
    }

    async fn on_failure(
        &self,
        rt: &IntegrationRuntime,
        state: &mut RuntimeState,
        error: String,
    ) -> PollOutcome {
        state.consecutive_failures += 1;
        state.phase = SyncPhase::Backoff;
        state.last_error = Some(error.clone());

        warn!(
            integration_id = %rt.config.id,
            consecutive_failures = state.consecutive_failures,
            error = %error,
            "integration poll failed"
        );

        if state.consecutive_failures >= self.config.failure_threshold
            && state.unreachable_since.is_none()
        {
            state.unreachable_since = Some(Utc::now());
            let mut payload = integration_payload(&rt.config);
            payload.insert("error".into(), json!(error));
            payload.insert("consecutive_failures".into(), json!(state.consecutive_failures));
            self.sink.emit(names::INTEGRATION_UNREACHABLE, payload).await;
        }

        PollOutcome::Failed {
            error,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Tick until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let integration_count = self.runtimes.read().await.len();
        info!(
            tick_secs = self.config.tick_secs,
            integrations = integration_count,
            "integration sync worker started"
        );
        let mut interval = tokio::time::interval(self.config.tick());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcomes = self.tick().await;
                    let polled = outcomes
                        .values()
                        .filter(|o| !matches!(o, PollOutcome::NotDue | PollOutcome::Skipped))
                        .count();
                    if polled > 0 {
                        debug!(polled, "sync tick complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("integration sync worker stopped");
    }
}

/// Same system, same credentials: the existing snapshot still describes it.
fn same_endpoint(a: &IntegrationConfig, b: &IntegrationConfig) -> bool {
    a.integration_type == b.integration_type && a.connection == b.connection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ResourceState;
    use crate::traits::IntegrationDescriptor;
    use lifeops_core::Payload;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Replays scripted poll results; `None` entries fail.
    struct ScriptedDriver {
        script: StdMutex<VecDeque<Option<Snapshot>>>,
        polls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl IntegrationDriver for ScriptedDriver {
        async fn connect(&self) -> Result<(), IntegrationError> {
            Ok(())
        }

        async fn poll(&self) -> Result<Snapshot, IntegrationError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front().flatten();
            next.ok_or_else(|| IntegrationError::Config("connection refused".into()))
        }

        fn describe(&self) -> IntegrationDescriptor {
            IntegrationDescriptor {
                integration_type: "scripted",
                display_name: "Scripted",
                description: "test driver",
                resource_kinds: vec!["container"],
                connection: vec![],
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<(String, Payload)>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
        }
    }

    #[async_trait::async_trait]
    impl EventSink for RecordingSink {
        async fn emit(&self, name: &str, payload: Payload) {
            self.events.lock().unwrap().push((name.to_string(), payload));
        }
    }

    type Script = (VecDeque<Option<Snapshot>>, Option<Duration>);

    struct Harness {
        worker: SyncWorker,
        sink: Arc<RecordingSink>,
        polls: BTreeMap<String, Arc<AtomicUsize>>,
    }

    /// One scripted driver per integration id.
    fn harness(scripts: Vec<(&str, Vec<Option<Snapshot>>, Option<Duration>)>) -> Harness {
        let mut polls = BTreeMap::new();
        let mut pending: BTreeMap<String, Script> = BTreeMap::new();
        for (id, script, delay) in scripts {
            polls.insert(id.to_string(), Arc::new(AtomicUsize::new(0)));
            pending.insert(id.to_string(), (script.into_iter().collect(), delay));
        }
        let pending = StdMutex::new(pending);
        let counters = polls.clone();

        let mut registry = IntegrationRegistry::new();
        registry.register(
            "scripted",
            move |cfg, _| {
                let (script, delay) = pending.lock().unwrap().remove(&cfg.id).unwrap_or_default();
                let polls = counters
                    .get(&cfg.id)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(AtomicUsize::new(0)));
                Ok(Box::new(ScriptedDriver {
                    script: StdMutex::new(script),
                    polls,
                    delay,
                }))
            },
            || Err(IntegrationError::Schema("scripted".into())),
        );

        let sink = Arc::new(RecordingSink::default());
        let worker = SyncWorker::new(Arc::new(registry), sink.clone(), SyncConfig::default());
        Harness { worker, sink, polls }
    }

    fn config(id: &str) -> IntegrationConfig {
        IntegrationConfig::new(id, "scripted").with_poll_interval(Duration::from_secs(30))
    }

    fn containers(entries: &[(&str, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(id, status)| (id.to_string(), ResourceState::new("container", *id, *status)))
            .collect()
    }

    async fn snapshot_of(worker: &SyncWorker, id: &str) -> Option<Snapshot> {
        let rt = worker.runtimes.read().await.get(id).cloned()?;
        let state = rt.state.lock().await;
        state.snapshot.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_is_baseline_then_transitions_emit() {
        let h = harness(vec![(
            "nas",
            vec![
                Some(containers(&[("plex", "running")])),
                Some(containers(&[("plex", "exited")])),
            ],
            None,
        )]);
        h.worker.sync_configs(&[config("nas")]).await;

        let first = h.worker.tick().await;
        assert_eq!(first["nas"], PollOutcome::Baseline { resources: 1 });
        assert!(h.sink.names().is_empty());

        let early = h.worker.tick().await;
        assert_eq!(early["nas"], PollOutcome::NotDue);

        tokio::time::advance(Duration::from_secs(31)).await;
        let second = h.worker.tick().await;
        assert_eq!(second["nas"], PollOutcome::Updated { events: 2 });
        assert_eq!(
            h.sink.names(),
            vec![names::INTEGRATION_CONTAINER_STOPPED, names::INTEGRATION_STATUS_CHANGED]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_of_one_leaves_snapshot_and_polls_others() {
        let h = harness(vec![
            ("a", vec![Some(containers(&[("plex", "running")])), None], None),
            (
                "b",
                vec![
                    Some(containers(&[("db", "running")])),
                    Some(containers(&[("db", "running"), ("web", "running")])),
                ],
                None,
            ),
        ]);
        h.worker.sync_configs(&[config("a"), config("b")]).await;
        h.worker.tick().await;
        let a_before = snapshot_of(&h.worker, "a").await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let outcomes = h.worker.tick().await;

        assert!(matches!(outcomes["a"], PollOutcome::Failed { consecutive_failures: 1, .. }));
        assert_eq!(outcomes["b"], PollOutcome::Updated { events: 1 });
        assert_eq!(snapshot_of(&h.worker, "a").await.unwrap(), a_before);
        assert_eq!(h.polls["b"].load(Ordering::SeqCst), 2);
        assert_eq!(h.sink.names(), vec![names::INTEGRATION_RESOURCE_ADDED]);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_emitted_once_then_recovered() {
        let h = harness(vec![(
            "nas",
            vec![
                Some(containers(&[("plex", "running")])),
                None,
                None,
                None,
                Some(containers(&[("plex", "running")])),
            ],
            None,
        )]);
        h.worker.sync_configs(&[config("nas")]).await;

        for _ in 0..5 {
            h.worker.poll_now("nas").await.unwrap();
        }

        assert_eq!(
            h.sink.names(),
            vec![names::INTEGRATION_UNREACHABLE, names::INTEGRATION_RECOVERED]
        );
        let events = h.sink.events.lock().unwrap();
        assert_eq!(events[0].1["consecutive_failures"], 2);
        assert_eq!(events[0].1["error"], "Configuration error: connection refused");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_integration_backs_off() {
        let h = harness(vec![("nas", vec![None, None, None], None)]);
        h.worker.sync_configs(&[config("nas")]).await;

        h.worker.tick().await;
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(h.worker.tick().await["nas"], PollOutcome::Failed { .. }));

        // Two failures: next poll waits 2x the interval.
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(h.worker.tick().await["nas"], PollOutcome::NotDue);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(h.worker.tick().await["nas"], PollOutcome::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_poll_is_skipped() {
        let h = harness(vec![(
            "slow",
            vec![Some(containers(&[("plex", "running")]))],
            Some(Duration::from_secs(5)),
        )]);
        h.worker.sync_configs(&[config("slow")]).await;

        let (first, second) = tokio::join!(h.worker.poll_now("slow"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            h.worker.poll_now("slow").await
        });

        assert_eq!(first, Some(PollOutcome::Baseline { resources: 1 }));
        assert_eq!(second, Some(PollOutcome::Skipped));
        assert_eq!(h.polls["slow"].load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_configs_preserves_snapshot_of_unchanged_endpoint() {
        let h = harness(vec![
            ("nas", vec![Some(containers(&[("plex", "running")]))], None),
            ("old", vec![Some(containers(&[]))], None),
        ]);
        h.worker.sync_configs(&[config("nas"), config("old")]).await;
        h.worker.tick().await;

        let mut renamed = config("nas");
        renamed.name = "NAS (renamed)".into();
        renamed.poll_interval = Duration::from_secs(120);
        h.worker.sync_configs(&[renamed]).await;

        assert_eq!(h.worker.integration_ids().await, vec!["nas"]);
        assert_eq!(snapshot_of(&h.worker, "nas").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_and_unbuildable_integrations_are_skipped() {
        let h = harness(vec![]);
        let mut disabled = config("off");
        disabled.enabled = false;
        let unknown = IntegrationConfig::new("k8s", "kubernetes");
        h.worker.sync_configs(&[disabled, unknown]).await;
        assert!(h.worker.integration_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let h = harness(vec![("nas", vec![Some(containers(&[]))], None)]);
        h.worker.sync_configs(&[config("nas")]).await;
        let (tx, rx) = watch::channel(false);

        let stop = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(true).unwrap();
        };
        tokio::join!(h.worker.run(rx), stop);
        assert_eq!(h.polls["nas"].load(Ordering::SeqCst), 1);
    }
}
