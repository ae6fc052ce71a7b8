//! Background scheduler
//!
//! Runs the engine on two independent cadences:
//!
//! - daily at a fixed wall-clock time: materialize due recurring
//!   transactions, then evaluate budget alerts, then goal completions;
//! - every N hours (default 6): budget alerts and goal completions only.
//!
//! The two timers are independent tasks and may overlap each other; a single
//! timer never overlaps itself because each run completes before the next
//! sleep begins. There is no persisted last-run marker: a tick missed while
//! the process was down is skipped, and templates due during downtime wait
//! for their next cadence rather than being backfilled.
//!
//! The wall clock is injected through the [`Clock`] trait so tests can drive
//! scheduling with virtual time instead of waiting on real midnights.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::alerts::AlertEvaluator;
use crate::goals::GoalMonitor;
use crate::recurrence::Materializer;

/// Wall-clock time source
///
/// Production uses [`SystemClock`]; tests inject a virtual clock that moves
/// with tokio's paused time.
pub trait Clock: Send + Sync {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;
}

/// The real local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Cadence configuration for the scheduler
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily sweep
    pub daily_at: NaiveTime,
    /// Hours between alert/goal passes
    pub alert_interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: NaiveTime::MIN,
            alert_interval_hours: 6,
        }
    }
}

/// How long until the next occurrence of `daily_at`
///
/// If the time has already passed today (or is exactly now), the next
/// occurrence is tomorrow.
fn until_next_daily(now: NaiveDateTime, daily_at: NaiveTime) -> Duration {
    let today = now.date().and_time(daily_at);
    let next = if now < today {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Orchestrates the background sweeps against a clock
pub struct Scheduler {
    materializer: Arc<Materializer>,
    alerts: Arc<AlertEvaluator>,
    goals: Arc<GoalMonitor>,
    clock: Arc<dyn Clock>,
    config: ScheduleConfig,
}

/// Handle to a running scheduler
///
/// Dropping the handle leaves the tasks running; call [`shutdown`] to stop
/// them. Shutdown aborts in-flight sweeps; per-entity writes already
/// committed stay committed.
///
/// [`shutdown`]: SchedulerHandle::shutdown
pub struct SchedulerHandle {
    daily: JoinHandle<()>,
    periodic: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop both timers, cancelling any in-flight sweep
    pub fn shutdown(self) {
        self.daily.abort();
        self.periodic.abort();
        info!("Scheduler stopped");
    }
}

impl Scheduler {
    pub fn new(
        materializer: Materializer,
        alerts: AlertEvaluator,
        goals: GoalMonitor,
        config: ScheduleConfig,
    ) -> Self {
        Self::with_clock(materializer, alerts, goals, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        materializer: Materializer,
        alerts: AlertEvaluator,
        goals: GoalMonitor,
        config: ScheduleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            materializer: Arc::new(materializer),
            alerts: Arc::new(alerts),
            goals: Arc::new(goals),
            clock,
            config,
        }
    }

    /// Start both timers as background tasks
    pub fn start(self) -> SchedulerHandle {
        info!(
            daily_at = %self.config.daily_at,
            alert_interval_hours = self.config.alert_interval_hours,
            "Starting scheduler"
        );

        let daily = {
            let materializer = self.materializer.clone();
            let alerts = self.alerts.clone();
            let goals = self.goals.clone();
            let clock = self.clock.clone();
            let daily_at = self.config.daily_at;

            tokio::spawn(async move {
                loop {
                    let wait = until_next_daily(clock.now(), daily_at);
                    debug!(seconds = wait.as_secs(), "next daily sweep scheduled");
                    tokio::time::sleep(wait).await;

                    let as_of = clock.now().date();
                    info!(%as_of, "Running daily sweep");
                    match materializer.run(as_of) {
                        Ok(outcome) => info!(
                            created = outcome.created,
                            errors = outcome.errors.len(),
                            "Materialization complete"
                        ),
                        Err(e) => error!(error = %e, "Materialization sweep failed"),
                    }
                    run_alert_pass(&alerts, &goals).await;
                }
            })
        };

        let periodic = {
            let alerts = self.alerts.clone();
            let goals = self.goals.clone();
            let hours = self.config.alert_interval_hours;

            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(hours * 3600));

                // Skip the immediate first tick - startup is not a cadence
                // boundary, and the daily sweep covers the engine's state
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    info!("Running periodic alert pass");
                    run_alert_pass(&alerts, &goals).await;
                }
            })
        };

        SchedulerHandle { daily, periodic }
    }
}

/// One alert + goal pass; each sweep's failure is logged, never fatal
async fn run_alert_pass(alerts: &AlertEvaluator, goals: &GoalMonitor) {
    match alerts.run().await {
        Ok(outcome) => info!(
            alerted = outcome.alerted,
            errors = outcome.errors.len(),
            "Budget alert pass complete"
        ),
        Err(e) => error!(error = %e, "Budget alert pass failed"),
    }

    match goals.run().await {
        Ok(outcome) => info!(
            completed = outcome.completed,
            errors = outcome.errors.len(),
            "Goal completion pass complete"
        ),
        Err(e) => error!(error = %e, "Goal completion pass failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    use crate::models::{Frequency, NewTransaction, TransactionKind};
    use crate::notify::MockDispatcher;
    use crate::test_utils::{MemoryStore, VirtualClock};

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_until_next_daily_later_today() {
        let wait = until_next_daily(dt(2024, 6, 14, 10, 0), time(23, 30));
        assert_eq!(wait, Duration::from_secs(13 * 3600 + 1800));
    }

    #[test]
    fn test_until_next_daily_already_passed_today() {
        let wait = until_next_daily(dt(2024, 6, 14, 10, 0), time(0, 0));
        assert_eq!(wait, Duration::from_secs(14 * 3600));
    }

    #[test]
    fn test_until_next_daily_exactly_now_waits_a_day() {
        let wait = until_next_daily(dt(2024, 6, 14, 0, 0), time(0, 0));
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }

    fn scheduler_fixture(
        store: Arc<MemoryStore>,
        notifier: Arc<MockDispatcher>,
        config: ScheduleConfig,
        clock: Arc<dyn Clock>,
    ) -> Scheduler {
        Scheduler::with_clock(
            Materializer::new(store.clone()),
            AlertEvaluator::new(store.clone(), notifier.clone()),
            GoalMonitor::new(store, notifier),
            config,
            clock,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_pass_fires_on_interval() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", Some("asha@example.com"));
        store.add_budget(
            user,
            "Groceries",
            1000.0,
            80.0,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        );
        store.add_expense(user, "Groceries", 900.0, NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());

        let notifier = Arc::new(MockDispatcher::new());
        // Daily sweep parked almost a day away so only the interval fires here
        let clock = Arc::new(VirtualClock::starting_at(dt(2024, 6, 14, 0, 1)));
        let handle = scheduler_fixture(
            store,
            notifier.clone(),
            ScheduleConfig {
                daily_at: time(0, 0),
                alert_interval_hours: 6,
            },
            clock,
        )
        .start();

        // Nothing before the first boundary
        tokio::time::sleep(Duration::from_secs(5 * 3600)).await;
        assert_eq!(notifier.budget_alerts().len(), 0);

        // One pass at 6h, a second at 12h - re-alerting both times
        tokio::time::sleep(Duration::from_secs(3600 + 5)).await;
        assert_eq!(notifier.budget_alerts().len(), 1);

        tokio::time::sleep(Duration::from_secs(6 * 3600)).await;
        assert_eq!(notifier.budget_alerts().len(), 2);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_sweep_materializes_at_configured_time() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", None);
        store.add_transaction(&NewTransaction {
            user_id: user,
            title: "Rent".to_string(),
            amount: 1500.0,
            kind: TransactionKind::Expense,
            category: "Housing".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
            recurring: true,
            frequency: Some(Frequency::Monthly),
            next_due_date: Some(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()),
            note: None,
        });

        let notifier = Arc::new(MockDispatcher::new());
        let clock = Arc::new(VirtualClock::starting_at(dt(2024, 6, 14, 23, 59)));
        let handle = scheduler_fixture(
            store.clone(),
            notifier,
            ScheduleConfig {
                daily_at: time(0, 0),
                alert_interval_hours: 6,
            },
            clock,
        )
        .start();

        // Crossing midnight fires the daily sweep with as_of = June 15
        tokio::time::sleep(Duration::from_secs(120)).await;

        let all = store.transactions();
        assert_eq!(all.len(), 2, "template materialized exactly once");
        let instance = all
            .iter()
            .find(|t| t.date == NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
            .unwrap();
        assert_eq!(instance.title, "Rent");

        handle.shutdown();
    }
}
