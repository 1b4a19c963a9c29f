//! Wiring: one place that builds the store, registries, dispatcher and bus.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use lifeops_core::Config;
use lifeops_integrations::{IntegrationRegistry, SyncWorker};
use lifeops_notify::{ChannelRegistry, Dispatcher, TemplateRenderer};
use lifeops_rules::audit_log::AuditLog;
use lifeops_rules::sources::MaintenanceDueSource;
use lifeops_rules::validation::ValidationContext;
use lifeops_rules::{EventBus, LoadResult, LoadStatus, RuleEvaluator, RuleLoader, ScheduledSweep};

pub struct App {
    pub config: Config,
    pub loader: Arc<RuleLoader>,
    pub dispatcher: Arc<Dispatcher>,
    pub evaluator: Arc<RuleEvaluator>,
    pub bus: Arc<EventBus>,
    pub integrations: Arc<IntegrationRegistry>,
    pub load_results: Vec<LoadResult>,
}

impl App {
    /// Load the config directory and build every component.
    pub fn build(config: Config, watch: bool) -> anyhow::Result<Self> {
        let channels = ChannelRegistry::builtin();
        let integrations = IntegrationRegistry::builtin();
        let validation = ValidationContext::from_registries(&channels, &integrations);

        let mut loader = RuleLoader::with_validation(config.store.config_dir.clone(), validation);
        let load_results = loader
            .load_all()
            .with_context(|| format!("failed to scan {}", config.store.config_dir.display()))?;
        if watch {
            loader.watch().context("failed to watch config directory")?;
        }
        let loader = Arc::new(loader);

        let renderer = Arc::new(TemplateRenderer::new());
        let dispatcher = Arc::new(
            Dispatcher::new(channels, loader.clone())
                .with_timeout(config.notify.send_timeout())
                .with_renderer(Arc::clone(&renderer)),
        );
        let evaluator = Arc::new(
            RuleEvaluator::new(loader.clone(), Arc::clone(&dispatcher))
                .with_renderer(renderer)
                .with_audit_log(Arc::new(AuditLog::with_max_entries(config.store.audit_max_entries))),
        );
        let bus = Arc::new(EventBus::new(Arc::clone(&evaluator)));

        Ok(Self {
            config,
            loader,
            dispatcher,
            evaluator,
            bus,
            integrations: Arc::new(integrations),
            load_results,
        })
    }

    /// Log the outcome of the initial load.
    pub fn log_load_results(&self) {
        let mut loaded = 0;
        for result in &self.load_results {
            match &result.status {
                LoadStatus::Loaded { rule_id, warnings } => {
                    loaded += 1;
                    for warning in warnings {
                        warn!(rule_id = %rule_id, path = %result.path.display(), "{warning}");
                    }
                }
                LoadStatus::Failed { error } => {
                    warn!(path = %result.path.display(), error = %error, "document rejected");
                }
                LoadStatus::Skipped { .. } => {}
            }
        }
        info!(loaded, files = self.load_results.len(), "config directory loaded");
    }

    pub fn sweep(&self) -> ScheduledSweep {
        let sweep = &self.config.sweep;
        ScheduledSweep::new(Arc::clone(&self.evaluator), sweep.default_cron.clone(), sweep.tick()).with_source(
            Arc::new(MaintenanceDueSource::new(
                sweep.maintenance_file.clone(),
                sweep.due_soon_days,
                sweep.due_soon_miles,
            )),
        )
    }

    pub fn sync_worker(&self) -> SyncWorker {
        SyncWorker::new(Arc::clone(&self.integrations), self.bus.clone(), self.config.sync.clone())
    }
}
