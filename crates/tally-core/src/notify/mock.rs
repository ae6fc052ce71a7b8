//! Mock dispatcher for testing
//!
//! Records every dispatched notification and can be configured to skip,
//! fail, or stall, so sweep behavior around dispatch outcomes is testable
//! without a transport.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{Goal, User};

use super::{BudgetAlert, DispatchStatus, NotificationDispatcher};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Send,
    Skip,
    Fail,
    /// Sleep this long before answering (for timeout tests)
    Stall(Duration),
}

/// Mock notification dispatcher
///
/// Sends successfully by default; see the constructors for other behaviors.
pub struct MockDispatcher {
    behavior: Behavior,
    budget_alerts: Mutex<Vec<(User, BudgetAlert)>>,
    goal_achievements: Mutex<Vec<(User, Goal)>>,
}

impl Default for MockDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Send)
    }

    /// Behaves like an unconfigured dispatcher
    pub fn skipping() -> Self {
        Self::with_behavior(Behavior::Skip)
    }

    /// Every dispatch fails
    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    /// Every dispatch sleeps before succeeding
    pub fn stalling(delay: Duration) -> Self {
        Self::with_behavior(Behavior::Stall(delay))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            budget_alerts: Mutex::new(Vec::new()),
            goal_achievements: Mutex::new(Vec::new()),
        }
    }

    /// Budget alerts dispatched so far
    pub fn budget_alerts(&self) -> Vec<(User, BudgetAlert)> {
        self.budget_alerts.lock().unwrap().clone()
    }

    /// Goal achievements dispatched so far
    pub fn goal_achievements(&self) -> Vec<(User, Goal)> {
        self.goal_achievements.lock().unwrap().clone()
    }

    async fn outcome(&self) -> Result<DispatchStatus> {
        match self.behavior {
            Behavior::Send => Ok(DispatchStatus::Sent),
            Behavior::Skip => Ok(DispatchStatus::Skipped),
            Behavior::Fail => Err(Error::Notify("mock dispatch failure".to_string())),
            Behavior::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(DispatchStatus::Sent)
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for MockDispatcher {
    async fn send_budget_alert(&self, user: &User, alert: &BudgetAlert) -> Result<DispatchStatus> {
        let status = self.outcome().await?;
        if status == DispatchStatus::Sent {
            self.budget_alerts
                .lock()
                .unwrap()
                .push((user.clone(), alert.clone()));
        }
        Ok(status)
    }

    async fn send_goal_achievement(&self, user: &User, goal: &Goal) -> Result<DispatchStatus> {
        let status = self.outcome().await?;
        if status == DispatchStatus::Sent {
            self.goal_achievements
                .lock()
                .unwrap()
                .push((user.clone(), goal.clone()));
        }
        Ok(status)
    }
}
