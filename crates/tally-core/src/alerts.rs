//! Budget alert evaluation
//!
//! Sweeps every active budget, aggregates its spend for the current window,
//! and dispatches an alert when consumption reached the owner's threshold or
//! the budget is exceeded outright.
//!
//! By default there is no suppression window: a budget that stays over its
//! threshold is re-alerted on every sweep. That is the system's historical
//! always-remind behavior, kept as-is; `suppress_repeats` opts into an
//! in-process debounce that re-arms once the budget drops back below the
//! threshold.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result, SweepError};
use crate::notify::{BudgetAlert, DispatchStatus, NotificationDispatcher};
use crate::spend::compute_spend;
use crate::store::Store;

/// Tunables for the alert sweep
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Skip re-alerting a budget until it drops back below its threshold
    pub suppress_repeats: bool,
    /// Per-notification dispatch timeout; a stalled dispatcher loses only
    /// its own item, not the rest of the sweep
    pub notify_timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            suppress_repeats: false,
            notify_timeout: Duration::from_secs(30),
        }
    }
}

/// Results of one alert sweep
#[derive(Debug, Default)]
pub struct AlertOutcome {
    /// Alerts actually handed to the dispatcher
    pub alerted: usize,
    pub errors: Vec<SweepError>,
}

/// Evaluates active budgets and dispatches threshold alerts
pub struct AlertEvaluator {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: AlertConfig,
    /// Budget ids alerted since they last crossed the threshold. Only
    /// consulted when `suppress_repeats` is on; in-process only, so a
    /// restart re-alerts once.
    already_alerted: Mutex<HashSet<i64>>,
}

impl AlertEvaluator {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self::with_config(store, notifier, AlertConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: AlertConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            already_alerted: Mutex::new(HashSet::new()),
        }
    }

    /// Evaluate every active budget once
    ///
    /// Budgets are processed sequentially and in isolation: an aggregation
    /// failure, missing owner, or dispatch failure is recorded and the sweep
    /// moves on. The snapshot handed to the dispatcher always carries the
    /// spend figures computed in this pass.
    pub async fn run(&self) -> Result<AlertOutcome> {
        let budgets = self.store.find_active_budgets()?;
        debug!(count = budgets.len(), "evaluating budget alerts");

        let mut outcome = AlertOutcome::default();

        for budget in budgets {
            let spend = match compute_spend(self.store.as_ref(), &budget) {
                Ok(spend) => spend,
                Err(e) => {
                    warn!(budget = budget.id, error = %e, "failed to aggregate budget spend");
                    outcome.errors.push(SweepError {
                        entity_id: budget.id,
                        error: e,
                    });
                    continue;
                }
            };

            if !(spend.should_alert || spend.is_over_budget) {
                // Dropping back below the threshold re-arms the budget
                self.already_alerted.lock().unwrap().remove(&budget.id);
                continue;
            }

            if self.config.suppress_repeats
                && self.already_alerted.lock().unwrap().contains(&budget.id)
            {
                debug!(budget = budget.id, "still over threshold, alert suppressed");
                continue;
            }

            let user = match self.store.find_user(budget.user_id) {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!(
                        budget = budget.id,
                        user = budget.user_id,
                        "budget owner not found"
                    );
                    outcome.errors.push(SweepError {
                        entity_id: budget.id,
                        error: Error::NotFound(format!("user {}", budget.user_id)),
                    });
                    continue;
                }
                Err(e) => {
                    warn!(budget = budget.id, error = %e, "failed to load budget owner");
                    outcome.errors.push(SweepError {
                        entity_id: budget.id,
                        error: e,
                    });
                    continue;
                }
            };

            if user.email.is_none() {
                debug!(budget = budget.id, "owner has no notification address");
                continue;
            }

            let snapshot = BudgetAlert::new(&budget, &spend);
            let dispatch = tokio::time::timeout(
                self.config.notify_timeout,
                self.notifier.send_budget_alert(&user, &snapshot),
            )
            .await;

            match dispatch {
                Ok(Ok(DispatchStatus::Sent)) => {
                    info!(
                        budget = budget.id,
                        category = %budget.category,
                        percentage_used = spend.percentage_used,
                        over_budget = spend.is_over_budget,
                        "budget alert sent"
                    );
                    outcome.alerted += 1;
                    if self.config.suppress_repeats {
                        self.already_alerted.lock().unwrap().insert(budget.id);
                    }
                }
                Ok(Ok(DispatchStatus::Skipped)) => {
                    debug!(budget = budget.id, "dispatcher unconfigured, alert skipped");
                }
                Ok(Err(e)) => {
                    warn!(budget = budget.id, error = %e, "failed to dispatch budget alert");
                    outcome.errors.push(SweepError {
                        entity_id: budget.id,
                        error: e,
                    });
                }
                Err(_) => {
                    warn!(budget = budget.id, "budget alert dispatch timed out");
                    outcome.errors.push(SweepError {
                        entity_id: budget.id,
                        error: Error::DispatchTimeout(self.config.notify_timeout),
                    });
                }
            }
        }

        Ok(outcome)
    }
}
