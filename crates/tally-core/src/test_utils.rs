//! Test utilities for tally-core
//!
//! Provides an in-memory store with per-entity failure injection, a virtual
//! clock that follows tokio's (pausable) time, and a mock webhook receiver
//! for dispatcher tests.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{extract::State, routing::post, Json, Router};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::models::{
    Budget, BudgetPeriod, Goal, NewTransaction, Transaction, User,
};
use crate::scheduler::Clock;
use crate::store::Store;

// ========== In-memory store ==========

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    transactions: Vec<Transaction>,
    budgets: Vec<Budget>,
    goals: Vec<Goal>,
    // Failure injection
    fail_create_titles: HashSet<String>,
    fail_next_due_ids: HashSet<i64>,
    fail_goal_save_ids: HashSet<i64>,
    fail_user_ids: HashSet<i64>,
    fail_expense_sum_categories: HashSet<String>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Store`] for tests
///
/// Seed it with the `add_*` helpers, then point the sweeps at it. The
/// `fail_*` methods make specific operations return an error so per-entity
/// isolation is testable.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn injected_failure(what: &str) -> Error {
    Error::InvalidData(format!("injected {} failure", what))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, name: &str, email: Option<&str>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.users.push(User {
            id,
            name: name.to_string(),
            email: email.map(String::from),
            created_at: Utc::now(),
        });
        id
    }

    pub fn users(&self) -> Vec<User> {
        self.inner.lock().unwrap().users.clone()
    }

    /// Insert a transaction directly, bypassing failure injection
    pub fn add_transaction(&self, tx: &NewTransaction) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.transactions.push(materialize_row(id, tx));
        id
    }

    /// Shorthand for a plain (non-recurring) expense
    pub fn add_expense(&self, user_id: i64, category: &str, amount: f64, date: NaiveDate) -> i64 {
        self.add_transaction(&NewTransaction {
            user_id,
            title: format!("{} spend", category),
            amount,
            kind: crate::models::TransactionKind::Expense,
            category: category.to_string(),
            date,
            recurring: false,
            frequency: None,
            next_due_date: None,
            note: None,
        })
    }

    pub fn clear_expenses(&self) {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .retain(|t| t.kind != crate::models::TransactionKind::Expense || t.recurring);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().transactions.clone()
    }

    pub fn transaction(&self, id: i64) -> Option<Transaction> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub fn add_budget(
        &self,
        user_id: i64,
        category: &str,
        amount: f64,
        alert_threshold: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.budgets.push(Budget {
            id,
            user_id,
            category: category.to_string(),
            amount,
            period: BudgetPeriod::Monthly,
            start_date,
            end_date,
            alert_threshold,
            is_active: true,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_goal(&self, user_id: i64, title: &str, target: f64, current: f64) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.goals.push(Goal {
            id,
            user_id,
            title: title.to_string(),
            description: None,
            target_amount: target,
            current_amount: current,
            target_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            category: "Savings".to_string(),
            is_completed: false,
            created_at: Utc::now(),
        });
        id
    }

    pub fn goal(&self, id: i64) -> Option<Goal> {
        self.inner
            .lock()
            .unwrap()
            .goals
            .iter()
            .find(|g| g.id == id)
            .cloned()
    }

    /// Make `create_transaction` fail for instances with this title
    pub fn fail_create_for_title(&self, title: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_create_titles
            .insert(title.to_string());
    }

    /// Make `set_next_due_date` fail for this template
    pub fn fail_next_due_for(&self, id: i64) {
        self.inner.lock().unwrap().fail_next_due_ids.insert(id);
    }

    /// Make `mark_goal_completed` fail for this goal
    pub fn fail_goal_save(&self, id: i64) {
        self.inner.lock().unwrap().fail_goal_save_ids.insert(id);
    }

    /// Make `find_user` fail for this user
    pub fn fail_user_lookup(&self, id: i64) {
        self.inner.lock().unwrap().fail_user_ids.insert(id);
    }

    /// Make `expense_sum` fail for this category
    pub fn fail_expense_sum_for(&self, category: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_expense_sum_categories
            .insert(category.to_string());
    }
}

fn materialize_row(id: i64, tx: &NewTransaction) -> Transaction {
    Transaction {
        id,
        user_id: tx.user_id,
        title: tx.title.clone(),
        amount: tx.amount,
        kind: tx.kind,
        category: tx.category.clone(),
        date: tx.date,
        recurring: tx.recurring,
        frequency: tx.frequency,
        next_due_date: tx.next_due_date,
        note: tx.note.clone(),
        created_at: Utc::now(),
    }
}

impl Store for MemoryStore {
    fn find_due_recurring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|t| {
                t.recurring
                    && t.next_due_date
                        .map(|due| due >= from && due < to)
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn create_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_create_titles.contains(&tx.title) {
            return Err(injected_failure("create"));
        }
        let id = inner.next_id();
        inner.transactions.push(materialize_row(id, tx));
        Ok(id)
    }

    fn set_next_due_date(&self, id: i64, next: NaiveDate) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_due_ids.contains(&id) {
            return Err(injected_failure("save"));
        }
        let tx = inner
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))?;
        if tx.next_due_date.map(|d| d > next).unwrap_or(false) {
            return Err(Error::InvalidData(format!(
                "next_due_date for transaction {} would move backward",
                id
            )));
        }
        tx.next_due_date = Some(next);
        Ok(())
    }

    fn find_active_budgets(&self) -> Result<Vec<Budget>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .budgets
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    fn expense_sum(
        &self,
        user_id: i64,
        category: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_expense_sum_categories.contains(category) {
            return Err(injected_failure("aggregate"));
        }
        Ok(inner
            .transactions
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && t.kind == crate::models::TransactionKind::Expense
                    && t.category == category
                    && t.date >= from
                    && t.date <= to
            })
            .map(|t| t.amount)
            .sum())
    }

    fn find_incomplete_goals(&self) -> Result<Vec<Goal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .goals
            .iter()
            .filter(|g| !g.is_completed)
            .cloned()
            .collect())
    }

    fn mark_goal_completed(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_goal_save_ids.contains(&id) {
            return Err(injected_failure("save"));
        }
        let goal = inner
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| Error::NotFound(format!("goal {}", id)))?;
        goal.is_completed = true;
        Ok(())
    }

    fn find_user(&self, id: i64) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_user_ids.contains(&id) {
            return Err(injected_failure("lookup"));
        }
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }
}

// ========== Virtual clock ==========

/// A [`Clock`] that starts at a fixed instant and advances with tokio time
///
/// Under `#[tokio::test(start_paused = true)]` the elapsed component follows
/// the paused runtime clock, so scheduling tests can cross midnights by
/// sleeping virtual seconds.
pub struct VirtualClock {
    base: NaiveDateTime,
    started: tokio::time::Instant,
}

impl VirtualClock {
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }
}

// ========== Mock webhook receiver ==========

type Received = Arc<Mutex<Vec<serde_json::Value>>>;

/// Mock webhook endpoint recording every payload it receives
pub struct MockWebhookServer {
    addr: SocketAddr,
    received: Received,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockWebhookServer {
    /// Start a receiver that accepts every POST with 200
    pub async fn start() -> Self {
        Self::start_with_status(axum::http::StatusCode::OK).await
    }

    /// Start a receiver that rejects every POST with 500
    pub async fn failing() -> Self {
        Self::start_with_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await
    }

    async fn start_with_status(status: axum::http::StatusCode) -> Self {
        let received: Received = Arc::new(Mutex::new(Vec::new()));

        let state = received.clone();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(recorded): State<Received>, Json(body): Json<serde_json::Value>| async move {
                        recorded.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            received,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Full URL of the hook endpoint
    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    /// Payloads received so far
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().unwrap().clone()
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockWebhookServer {
    fn drop(&mut self) {
        self.stop();
    }
}
