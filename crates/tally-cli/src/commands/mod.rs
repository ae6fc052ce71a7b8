//! Command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::info;

use tally_core::{
    AlertEvaluator, Config, Database, GoalMonitor, Materializer, NotificationDispatcher,
    Scheduler, WebhookDispatcher,
};

/// Initialize the database (create file, run migrations)
pub fn cmd_init(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    println!("Database initialized at {}", db.path());
    Ok(())
}

/// Run one sweep immediately
pub async fn cmd_sweep(
    db_path: &Path,
    config_path: &Path,
    kind: &str,
    as_of: Option<&str>,
) -> Result<()> {
    if !matches!(kind, "all" | "recurring" | "alerts" | "goals") {
        bail!(
            "unknown sweep kind '{}' (expected all, recurring, alerts, or goals)",
            kind
        );
    }

    let config = Config::load(config_path)?;
    let db = open_db(db_path)?;

    let as_of = match as_of {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of date '{}'", s))?,
        None => chrono::Local::now().date_naive(),
    };

    let store: Arc<Database> = Arc::new(db);
    let notifier = dispatcher(&config);

    if matches!(kind, "all" | "recurring") {
        let outcome = Materializer::new(store.clone()).run(as_of)?;
        println!(
            "Recurring: {} created, {} errors",
            outcome.created,
            outcome.errors.len()
        );
    }

    if matches!(kind, "all" | "alerts") {
        let outcome = AlertEvaluator::with_config(
            store.clone(),
            notifier.clone(),
            config.alert_config(),
        )
        .run()
        .await?;
        println!(
            "Alerts: {} sent, {} errors",
            outcome.alerted,
            outcome.errors.len()
        );
    }

    if matches!(kind, "all" | "goals") {
        let outcome =
            GoalMonitor::with_timeout(store.clone(), notifier, config.notify_timeout())
                .run()
                .await?;
        println!(
            "Goals: {} completed, {} errors",
            outcome.completed,
            outcome.errors.len()
        );
    }

    Ok(())
}

/// Start the scheduler and block until Ctrl-C
pub async fn cmd_run(db_path: &Path, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = open_db(db_path)?;

    let store: Arc<Database> = Arc::new(db);
    let notifier = dispatcher(&config);

    if config.webhook_url().is_none() {
        info!("No webhook configured; notifications will be skipped");
    }

    let scheduler = Scheduler::new(
        Materializer::new(store.clone()),
        AlertEvaluator::with_config(store.clone(), notifier.clone(), config.alert_config()),
        GoalMonitor::with_timeout(store, notifier, config.notify_timeout()),
        config.schedule_config()?,
    );
    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    handle.shutdown();

    Ok(())
}

fn open_db(db_path: &Path) -> Result<Database> {
    let path = db_path
        .to_str()
        .with_context(|| format!("database path {} is not valid UTF-8", db_path.display()))?;
    Database::open(path).with_context(|| format!("failed to open database at {}", path))
}

fn dispatcher(config: &Config) -> Arc<dyn NotificationDispatcher> {
    Arc::new(WebhookDispatcher::with_timeout(
        config.webhook_url().map(String::from),
        config.notify_timeout(),
    ))
}
