//! Subcommand implementations.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use lifeops_core::{names, payload_from_json};
use lifeops_integrations::SyncWorker;
use lifeops_rules::{LoadStatus, RuleLoader};

use crate::app::App;

// ── run ─────────────────────────────────────────────────────────────

pub async fn run(app: App) -> anyhow::Result<ExitCode> {
    app.config.log_summary();
    app.log_load_results();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = Arc::new(app.sync_worker());
    worker.sync_configs(&app.loader.integrations()?).await;
    let sweep = Arc::new(app.sweep());

    let tasks = vec![
        tokio::spawn({
            let worker = Arc::clone(&worker);
            let rx = shutdown_rx.clone();
            async move { worker.run(rx).await }
        }),
        tokio::spawn({
            let sweep = Arc::clone(&sweep);
            let rx = shutdown_rx.clone();
            async move { sweep.run(rx).await }
        }),
        tokio::spawn(reconcile_integrations(
            Arc::clone(&app.loader),
            Arc::clone(&worker),
            app.config.sync.tick(),
            shutdown_rx,
        )),
    ];

    info!("lifeopsd running, Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    info!("lifeopsd exited cleanly");
    Ok(ExitCode::SUCCESS)
}

/// Hand hot-reloaded integration documents to the sync worker.
async fn reconcile_integrations(
    loader: Arc<RuleLoader>,
    worker: Arc<SyncWorker>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => match loader.integrations() {
                Ok(configs) => worker.sync_configs(&configs).await,
                Err(e) => warn!(error = %e, "could not read integrations"),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

// ── validate ────────────────────────────────────────────────────────

pub fn validate(app: &App) -> ExitCode {
    let mut failed = 0;
    for result in &app.load_results {
        let path = result.path.display();
        match &result.status {
            LoadStatus::Loaded { rule_id, warnings } => {
                println!("ok      {path} ({rule_id})");
                for warning in warnings {
                    println!("        warning: {warning}");
                }
            }
            LoadStatus::Failed { error } => {
                failed += 1;
                println!("FAILED  {path}");
                for line in error.lines() {
                    println!("        {line}");
                }
            }
            LoadStatus::Skipped { reason } => println!("skipped {path}: {reason}"),
        }
    }
    println!(
        "\n{} documents loaded, {failed} rejected",
        app.loader.len()
    );
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ── catalogs ────────────────────────────────────────────────────────

pub fn schemas(app: &App) -> anyhow::Result<()> {
    let out = json!({
        "integrations": app.integrations.get_all_schemas(),
        "channel_drivers": app.dispatcher.registry().drivers(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub fn events() {
    for spec in names::catalog() {
        println!("{}", spec.name);
        println!("    {}", spec.description);
        println!("    fields: {}", spec.fields.join(", "));
    }
}

// ── one-shot actions ────────────────────────────────────────────────

pub async fn emit(app: &App, name: &str, payload: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(payload).context("--payload must be JSON")?;
    if !value.is_object() {
        bail!("--payload must be a JSON object");
    }
    if names::spec_for(name).is_none() {
        warn!(event = %name, "event is not in the documented catalog");
    }
    let report = app.bus.try_emit(name, payload_from_json(value)).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn test_channel(app: &App, id: &str) -> anyhow::Result<()> {
    app.dispatcher
        .test_channel(id)
        .await
        .with_context(|| format!("test notification to '{id}' failed"))?;
    println!("test notification sent to '{id}'");
    Ok(())
}

pub async fn sweep(app: &App) -> anyhow::Result<()> {
    let report = app.sweep().run_once(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
