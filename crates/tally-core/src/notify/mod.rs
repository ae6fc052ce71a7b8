//! Notification dispatch
//!
//! The sweeps talk to an external dispatcher through the
//! [`NotificationDispatcher`] trait. The production implementation posts
//! JSON payloads to a configured webhook; an unconfigured dispatcher reports
//! [`DispatchStatus::Skipped`], which is not an error and is never retried.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Budget, BudgetPeriod, Goal, User};
use crate::spend::BudgetSpend;

mod mock;
mod webhook;

pub use mock::MockDispatcher;
pub use webhook::{WebhookDispatcher, WEBHOOK_URL_ENV};

/// What happened to a dispatched notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Handed to the transport
    Sent,
    /// The dispatcher is unconfigured. Not an error; callers must not retry.
    Skipped,
}

/// Snapshot of a budget at alert time
///
/// Carries the budget's static fields plus the spend figures computed in the
/// same evaluation pass, never a stale cached copy.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetAlert {
    pub budget_id: i64,
    pub category: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub alert_threshold: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percentage_used: f64,
    pub is_over_budget: bool,
}

impl BudgetAlert {
    pub fn new(budget: &Budget, spend: &BudgetSpend) -> Self {
        Self {
            budget_id: budget.id,
            category: budget.category.clone(),
            amount: budget.amount,
            period: budget.period,
            start_date: budget.start_date,
            end_date: budget.end_date,
            alert_threshold: budget.alert_threshold,
            spent: spend.spent,
            remaining: spend.remaining,
            percentage_used: spend.percentage_used,
            is_over_budget: spend.is_over_budget,
        }
    }
}

/// External notification delivery
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Notify a user that a budget crossed its alert threshold or limit
    async fn send_budget_alert(&self, user: &User, alert: &BudgetAlert) -> Result<DispatchStatus>;

    /// Congratulate a user on a completed goal
    async fn send_goal_achievement(&self, user: &User, goal: &Goal) -> Result<DispatchStatus>;
}
