//! Startup sequence and run modes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use mailferry_core::{
    CheckpointBook, CheckpointRepository, DocumentStore, QuiescenceDetector, Scheduler,
    SessionCredentials, Settings, SourceSettings,
};

use crate::cli::Cli;

const DOCUMENTS_DB: &str = "documents.db";
const CHECKPOINTS_DB: &str = "checkpoints.db";

/// Runs the ingester until Ctrl-C, or for a single tick with `--once`.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli).await?;

    let storage = PathBuf::from(&cli.storage_path);
    tokio::fs::create_dir_all(&storage)
        .await
        .with_context(|| format!("Failed to create storage directory {}", storage.display()))?;

    let session = SessionCredentials::new(&cli.account_id, &cli.mnemonic);
    let store = open_store(&storage.join(DOCUMENTS_DB), &session, &settings).await?;

    let repository = CheckpointRepository::new(&db_path(&storage.join(CHECKPOINTS_DB))?)
        .await
        .context("Failed to open checkpoint state")?;
    let checkpoints = CheckpointBook::hydrate(settings.lookback(), repository)
        .await
        .context("Failed to load checkpoints")?;
    if checkpoints.is_empty() {
        info!(
            lookback_days = settings.lookback_days,
            "No stored checkpoints, sources start from the lookback window"
        );
    } else {
        info!(sources = checkpoints.len(), "Loaded checkpoints");
    }

    let mut scheduler = Scheduler::new(Arc::new(store), checkpoints)
        .with_interval(settings.tick_interval())
        .with_policy(settings.advance_policy);
    for source in &settings.sources {
        let (source, selector) = source.to_source();
        scheduler.add_source(source, selector);
    }

    if cli.once {
        let report = scheduler.tick(Utc::now()).await;
        report.log();
        scheduler.checkpoints().close().await;
        return Ok(());
    }

    let handle = scheduler.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested, waiting for the current tick to finish");

    let scheduler = handle.stop().await.context("Scheduler task failed")?;
    scheduler.checkpoints().close().await;
    info!(ticks = scheduler.ticks(), "Stopped");
    Ok(())
}

/// Settings file merged with `--maildir` flags.
async fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&path).await?;
    settings
        .sources
        .extend(cli.maildirs.iter().map(SourceSettings::flagged));
    settings.validate()?;

    info!(
        path = %path.display(),
        sources = settings.sources.len(),
        tick_interval_secs = settings.tick_interval_secs,
        lookback_days = settings.lookback_days,
        "Loaded settings"
    );
    Ok(settings)
}

/// Opens the document store and waits for its startup activity to settle.
async fn open_store(
    path: &Path,
    session: &SessionCredentials,
    settings: &Settings,
) -> Result<DocumentStore> {
    let mut detector = QuiescenceDetector::new(settings.idle_duration());
    let notifier = detector.notifier();
    let path = db_path(path)?;

    // The detector is polled first so it is armed before the store emits
    // any activity.
    let (idle, opened) = tokio::join!(
        detector.wait_until_idle(),
        DocumentStore::open(&path, session, Some(notifier.callback())),
    );
    let store = opened.with_context(|| format!("Failed to open document store at {path}"))?;

    info!(
        account = %store.account_id(),
        signals = idle.signals,
        waited_ms = idle.waited.as_millis(),
        "Document store is ready"
    );
    Ok(store)
}

fn db_path(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Storage path is not valid UTF-8: {}", path.display()))
}
