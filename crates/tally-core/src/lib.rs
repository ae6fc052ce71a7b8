//! Tally Core Library
//!
//! The background engine of the Tally personal finance tracker:
//! - SQLite store for users, transactions, budgets, and goals
//! - Recurring-transaction materialization with calendar-aware date advance
//! - Budget spend aggregation and threshold alert evaluation
//! - Goal completion detection
//! - Webhook notification dispatch
//! - Two-cadence background scheduler (daily sweep + periodic alert pass)

pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod goals;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod scheduler;
pub mod spend;
pub mod store;

/// Test utilities including the in-memory store and mock webhook server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alerts::{AlertConfig, AlertEvaluator, AlertOutcome};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result, SweepError};
pub use goals::{GoalMonitor, GoalOutcome};
pub use notify::{
    BudgetAlert, DispatchStatus, MockDispatcher, NotificationDispatcher, WebhookDispatcher,
};
pub use recurrence::{advance, MaterializeOutcome, Materializer};
pub use scheduler::{Clock, ScheduleConfig, Scheduler, SchedulerHandle, SystemClock};
pub use spend::{compute_spend, BudgetSpend};
pub use store::Store;
