//! Integration tests for tally-core
//!
//! These tests exercise the full daily sweep sequence - materialize due
//! recurring transactions, evaluate budget alerts, detect goal completions -
//! against the real SQLite store with a mock dispatcher.

use std::sync::Arc;

use chrono::NaiveDate;

use tally_core::models::{Frequency, NewBudget, NewGoal, NewTransaction, TransactionKind};
use tally_core::{AlertEvaluator, Database, GoalMonitor, Materializer, MockDispatcher};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A recurring expense template created on `dated` and next due on `due`
fn recurring_expense(
    user: i64,
    title: &str,
    amount: f64,
    category: &str,
    frequency: Frequency,
    dated: NaiveDate,
    due: NaiveDate,
) -> NewTransaction {
    NewTransaction {
        user_id: user,
        title: title.to_string(),
        amount,
        kind: TransactionKind::Expense,
        category: category.to_string(),
        date: dated,
        recurring: true,
        frequency: Some(frequency),
        next_due_date: Some(due),
        note: None,
    }
}

#[tokio::test]
async fn test_full_daily_sweep_sequence() {
    let db = Database::in_memory().expect("Failed to create test database");
    let user = db.create_user("Asha", Some("asha@example.com")).unwrap();
    let as_of = date(2024, 6, 15);

    // A template due today and one due next week
    let rent_id = db
        .create_transaction(&recurring_expense(
            user,
            "Rent",
            1500.0,
            "Housing",
            Frequency::Monthly,
            date(2024, 5, 15),
            as_of,
        ))
        .unwrap();

    db.create_transaction(&recurring_expense(
        user,
        "Gym",
        40.0,
        "Health",
        Frequency::Monthly,
        date(2024, 5, 22),
        date(2024, 6, 22),
    ))
    .unwrap();

    // A Housing budget that the materialized rent pushes over its threshold
    db.create_budget(&NewBudget {
        user_id: user,
        category: "Housing".to_string(),
        amount: 1600.0,
        period: tally_core::models::BudgetPeriod::Monthly,
        start_date: date(2024, 6, 1),
        end_date: date(2024, 6, 30),
        alert_threshold: 80.0,
    })
    .unwrap();

    // A goal already at target, waiting for the sweep to notice
    let goal_id = db
        .create_goal(&NewGoal {
            user_id: user,
            title: "Emergency fund".to_string(),
            description: None,
            target_amount: 5000.0,
            current_amount: 5000.0,
            target_date: date(2025, 1, 1),
            category: "Savings".to_string(),
        })
        .unwrap();

    let store: Arc<Database> = Arc::new(db.clone());
    let notifier = Arc::new(MockDispatcher::new());

    // Daily order: materialize, then alerts, then goals
    let materialized = Materializer::new(store.clone()).run(as_of).unwrap();
    assert_eq!(materialized.created, 1, "only the template due today fires");
    assert!(materialized.errors.is_empty());

    let alerts = AlertEvaluator::new(store.clone(), notifier.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(alerts.alerted, 1);

    let goals = GoalMonitor::new(store, notifier.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(goals.completed, 1);

    // The materialized instance is a fresh June 15 transaction, and the
    // template's cadence stays anchored to the 15th
    let transactions = db.list_transactions(user).unwrap();
    assert_eq!(transactions.len(), 3);
    let instance = transactions
        .iter()
        .find(|t| t.title == "Rent" && t.id != rent_id)
        .expect("materialized rent instance");
    assert_eq!(instance.date, as_of);
    assert!(instance.recurring);
    assert_eq!(instance.next_due_date, Some(date(2024, 7, 15)));
    assert_eq!(
        db.get_transaction(rent_id).unwrap().unwrap().next_due_date,
        Some(date(2024, 7, 15))
    );

    // The alert snapshot carries the figures from this pass: the 1500 rent
    // against a 1600 budget is 93.75%, not yet over
    let sent = notifier.budget_alerts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.category, "Housing");
    assert_eq!(sent[0].1.spent, 1500.0);
    assert_eq!(sent[0].1.percentage_used, 93.75);
    assert!(!sent[0].1.is_over_budget);

    assert!(db.get_goal(goal_id).unwrap().unwrap().is_completed);
    assert_eq!(notifier.goal_achievements().len(), 1);
}

#[tokio::test]
async fn test_repeat_sweep_reminds_again_but_materializes_once() {
    let db = Database::in_memory().expect("Failed to create test database");
    let user = db.create_user("Asha", Some("asha@example.com")).unwrap();
    let as_of = date(2024, 6, 15);

    db.create_transaction(&recurring_expense(
        user,
        "Rent",
        900.0,
        "Housing",
        Frequency::Monthly,
        date(2024, 5, 15),
        as_of,
    ))
    .unwrap();

    db.create_budget(&NewBudget {
        user_id: user,
        category: "Housing".to_string(),
        amount: 1000.0,
        period: tally_core::models::BudgetPeriod::Monthly,
        start_date: date(2024, 6, 1),
        end_date: date(2024, 6, 30),
        alert_threshold: 80.0,
    })
    .unwrap();

    let store: Arc<Database> = Arc::new(db.clone());
    let notifier = Arc::new(MockDispatcher::new());
    let materializer = Materializer::new(store.clone());
    let evaluator = AlertEvaluator::new(store, notifier.clone());

    assert_eq!(materializer.run(as_of).unwrap().created, 1);
    evaluator.run().await.unwrap();

    // Same day again: the advanced template is no longer due, but the alert
    // fires again - there is no debounce between sweeps
    assert_eq!(materializer.run(as_of).unwrap().created, 0);
    evaluator.run().await.unwrap();

    assert_eq!(db.list_transactions(user).unwrap().len(), 2);
    assert_eq!(notifier.budget_alerts().len(), 2);
}

#[tokio::test]
async fn test_instances_generate_their_own_successors() {
    let db = Database::in_memory().expect("Failed to create test database");
    let user = db.create_user("Asha", None).unwrap();

    db.create_transaction(&recurring_expense(
        user,
        "Coffee subscription",
        15.0,
        "Dining",
        Frequency::Daily,
        date(2024, 6, 14),
        date(2024, 6, 15),
    ))
    .unwrap();

    let store: Arc<Database> = Arc::new(db.clone());
    let materializer = Materializer::new(store);

    // Day one creates an instance due tomorrow; day two both the original
    // template and yesterday's instance are due
    assert_eq!(materializer.run(date(2024, 6, 15)).unwrap().created, 1);
    assert_eq!(materializer.run(date(2024, 6, 16)).unwrap().created, 2);

    assert_eq!(db.list_transactions(user).unwrap().len(), 4);
}
