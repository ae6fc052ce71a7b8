//! Goal completion detection
//!
//! Sweeps incomplete goals and flips `is_completed` once the saved amount
//! reaches the target, then dispatches the achievement notification. The
//! flip is persisted before dispatch and is never rolled back on a
//! notification failure. The reverse transition (amount dropping back below
//! target) is deliberately not this sweep's job; the owner's edit path
//! handles it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result, SweepError};
use crate::notify::{DispatchStatus, NotificationDispatcher};
use crate::store::Store;

/// Results of one goal sweep
#[derive(Debug, Default)]
pub struct GoalOutcome {
    /// Goals newly marked completed
    pub completed: usize,
    pub errors: Vec<SweepError>,
}

/// Detects newly completed goals and dispatches achievement notifications
pub struct GoalMonitor {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationDispatcher>,
    notify_timeout: Duration,
}

impl GoalMonitor {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self::with_timeout(store, notifier, Duration::from_secs(30))
    }

    pub fn with_timeout(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationDispatcher>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            notify_timeout,
        }
    }

    /// Evaluate every incomplete goal once
    pub async fn run(&self) -> Result<GoalOutcome> {
        let goals = self.store.find_incomplete_goals()?;
        debug!(count = goals.len(), "checking goal completions");

        let mut outcome = GoalOutcome::default();

        for goal in goals {
            if goal.current_amount < goal.target_amount {
                continue;
            }

            if let Err(e) = self.store.mark_goal_completed(goal.id) {
                warn!(goal = goal.id, error = %e, "failed to mark goal completed");
                outcome.errors.push(SweepError {
                    entity_id: goal.id,
                    error: e,
                });
                continue;
            }
            outcome.completed += 1;
            info!(goal = goal.id, title = %goal.title, "goal completed");

            // The completion is committed; everything below is best-effort
            let user = match self.store.find_user(goal.user_id) {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!(goal = goal.id, user = goal.user_id, "goal owner not found");
                    outcome.errors.push(SweepError {
                        entity_id: goal.id,
                        error: Error::NotFound(format!("user {}", goal.user_id)),
                    });
                    continue;
                }
                Err(e) => {
                    warn!(goal = goal.id, error = %e, "failed to load goal owner");
                    outcome.errors.push(SweepError {
                        entity_id: goal.id,
                        error: e,
                    });
                    continue;
                }
            };

            if user.email.is_none() {
                debug!(goal = goal.id, "owner has no notification address");
                continue;
            }

            let dispatch = tokio::time::timeout(
                self.notify_timeout,
                self.notifier.send_goal_achievement(&user, &goal),
            )
            .await;

            match dispatch {
                Ok(Ok(DispatchStatus::Sent)) => {
                    debug!(goal = goal.id, "achievement notification sent");
                }
                Ok(Ok(DispatchStatus::Skipped)) => {
                    debug!(goal = goal.id, "dispatcher unconfigured, achievement skipped");
                }
                Ok(Err(e)) => {
                    warn!(goal = goal.id, error = %e, "failed to dispatch achievement");
                    outcome.errors.push(SweepError {
                        entity_id: goal.id,
                        error: e,
                    });
                }
                Err(_) => {
                    warn!(goal = goal.id, "achievement dispatch timed out");
                    outcome.errors.push(SweepError {
                        entity_id: goal.id,
                        error: Error::DispatchTimeout(self.notify_timeout),
                    });
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::notify::MockDispatcher;
    use crate::test_utils::MemoryStore;

    #[tokio::test]
    async fn test_goal_below_target_is_untouched() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", Some("asha@example.com"));
        let goal = store.add_goal(user, "Emergency fund", 5000.0, 4999.0);

        let notifier = Arc::new(MockDispatcher::new());
        let monitor = GoalMonitor::new(store.clone(), notifier.clone());

        let outcome = monitor.run().await.unwrap();

        assert_eq!(outcome.completed, 0);
        assert!(!store.goal(goal).unwrap().is_completed);
        assert!(notifier.goal_achievements().is_empty());
    }

    #[tokio::test]
    async fn test_goal_at_target_completes_and_notifies_once() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", Some("asha@example.com"));
        let goal = store.add_goal(user, "Emergency fund", 5000.0, 5000.0);

        let notifier = Arc::new(MockDispatcher::new());
        let monitor = GoalMonitor::new(store.clone(), notifier.clone());

        let outcome = monitor.run().await.unwrap();
        assert_eq!(outcome.completed, 1);
        assert!(store.goal(goal).unwrap().is_completed);
        assert_eq!(notifier.goal_achievements().len(), 1);
        assert_eq!(notifier.goal_achievements()[0].1.id, goal);

        // A second sweep finds no incomplete goals; exactly one notification
        // for the transition
        let outcome = monitor.run().await.unwrap();
        assert_eq!(outcome.completed, 0);
        assert_eq!(notifier.goal_achievements().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_roll_back_completion() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", Some("asha@example.com"));
        let goal = store.add_goal(user, "Trip", 2000.0, 2500.0);

        let notifier = Arc::new(MockDispatcher::failing());
        let monitor = GoalMonitor::new(store.clone(), notifier);

        let outcome = monitor.run().await.unwrap();

        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(store.goal(goal).unwrap().is_completed, "mutation and notification are not transactional");
    }

    #[tokio::test]
    async fn test_save_failure_isolates_goal() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", Some("asha@example.com"));
        let stuck = store.add_goal(user, "Stuck", 100.0, 150.0);
        let fine = store.add_goal(user, "Fine", 100.0, 150.0);
        store.fail_goal_save(stuck);

        let notifier = Arc::new(MockDispatcher::new());
        let monitor = GoalMonitor::new(store.clone(), notifier.clone());

        let outcome = monitor.run().await.unwrap();

        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].entity_id, stuck);
        assert!(store.goal(fine).unwrap().is_completed);
        assert!(!store.goal(stuck).unwrap().is_completed);
        // No notification for the goal whose completion never committed
        assert_eq!(notifier.goal_achievements().len(), 1);
    }

    #[tokio::test]
    async fn test_owner_without_address_still_completes() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", None);
        let goal = store.add_goal(user, "Quiet", 100.0, 100.0);

        let notifier = Arc::new(MockDispatcher::new());
        let monitor = GoalMonitor::new(store.clone(), notifier.clone());

        let outcome = monitor.run().await.unwrap();

        assert_eq!(outcome.completed, 1);
        assert!(store.goal(goal).unwrap().is_completed);
        assert!(notifier.goal_achievements().is_empty());
        assert!(outcome.errors.is_empty());
    }
}
