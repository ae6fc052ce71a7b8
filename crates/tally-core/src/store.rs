//! Store interface consumed by the background sweeps
//!
//! The sweeps only ever touch the handful of operations below, so they are
//! written against this trait rather than the concrete database. Production
//! uses [`crate::db::Database`]; tests use an in-memory store with failure
//! injection.

use chrono::NaiveDate;

use crate::db::Database;
use crate::error::Result;
use crate::models::{Budget, Goal, NewTransaction, Transaction, User};

pub trait Store: Send + Sync {
    /// Recurring templates with a next due date inside `[from, to)`
    fn find_due_recurring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>>;

    /// Insert a materialized transaction instance
    fn create_transaction(&self, tx: &NewTransaction) -> Result<i64>;

    /// Advance a template's next due date (forward only)
    fn set_next_due_date(&self, id: i64, next: NaiveDate) -> Result<()>;

    /// All budgets currently flagged active, across all users
    fn find_active_budgets(&self) -> Result<Vec<Budget>>;

    /// Sum of expense amounts for one owner+category over an inclusive range
    fn expense_sum(&self, user_id: i64, category: &str, from: NaiveDate, to: NaiveDate)
        -> Result<f64>;

    /// All goals not yet marked completed, across all users
    fn find_incomplete_goals(&self) -> Result<Vec<Goal>>;

    /// Flag a goal as completed
    fn mark_goal_completed(&self, id: i64) -> Result<()>;

    /// Look up a user by id
    fn find_user(&self, id: i64) -> Result<Option<User>>;
}

impl Store for crate::db::Database {
    fn find_due_recurring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>> {
        Database::find_due_recurring(self, from, to)
    }

    fn create_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        Database::create_transaction(self, tx)
    }

    fn set_next_due_date(&self, id: i64, next: NaiveDate) -> Result<()> {
        Database::set_next_due_date(self, id, next)
    }

    fn find_active_budgets(&self) -> Result<Vec<Budget>> {
        Database::find_active_budgets(self)
    }

    fn expense_sum(
        &self,
        user_id: i64,
        category: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64> {
        Database::expense_sum(self, user_id, category, from, to)
    }

    fn find_incomplete_goals(&self) -> Result<Vec<Goal>> {
        Database::find_incomplete_goals(self)
    }

    fn mark_goal_completed(&self, id: i64) -> Result<()> {
        Database::mark_goal_completed(self, id)
    }

    fn find_user(&self, id: i64) -> Result<Option<User>> {
        Database::find_user(self, id)
    }
}
