//! Budget spend aggregation
//!
//! One pure computation of a budget's consumption, shared by the alert
//! evaluator and any reporting caller. The legacy system computed these
//! figures independently in two places; this is the consolidated version.

use serde::Serialize;

use crate::error::Result;
use crate::models::Budget;
use crate::store::Store;

/// Derived, non-persisted spend figures for one budget evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetSpend {
    pub spent: f64,
    /// May be negative when the budget is exceeded
    pub remaining: f64,
    pub percentage_used: f64,
    pub is_over_budget: bool,
    pub should_alert: bool,
}

impl BudgetSpend {
    /// Derive spend figures from a budget and its aggregated expense total
    ///
    /// Pure function of its inputs. `should_alert` fires at the threshold,
    /// `is_over_budget` only past 100% - a budget can alert without being
    /// exceeded and (with a threshold above 100) vice versa.
    pub fn compute(budget: &Budget, spent: f64) -> Self {
        let percentage_used = if budget.amount > 0.0 {
            spent / budget.amount * 100.0
        } else {
            0.0
        };

        Self {
            spent,
            remaining: budget.amount - spent,
            percentage_used,
            is_over_budget: spent > budget.amount,
            should_alert: percentage_used >= budget.alert_threshold,
        }
    }
}

/// Aggregate a budget's expense total from the store and derive its figures
///
/// Sums expense transactions for the budget's owner and category over
/// `[start_date, end_date]` inclusive.
pub fn compute_spend(store: &dyn Store, budget: &Budget) -> Result<BudgetSpend> {
    let spent = store.expense_sum(
        budget.user_id,
        &budget.category,
        budget.start_date,
        budget.end_date,
    )?;
    Ok(BudgetSpend::compute(budget, spent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono::Utc;

    use crate::models::BudgetPeriod;

    fn budget(amount: f64, alert_threshold: f64) -> Budget {
        Budget {
            id: 1,
            user_id: 1,
            category: "Groceries".to_string(),
            amount,
            period: BudgetPeriod::Monthly,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            alert_threshold,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_alert_without_overrun() {
        let spend = BudgetSpend::compute(&budget(1000.0, 80.0), 850.0);
        assert_eq!(spend.percentage_used, 85.0);
        assert!(!spend.is_over_budget);
        assert!(spend.should_alert);
        assert_eq!(spend.remaining, 150.0);
    }

    #[test]
    fn test_over_budget_regardless_of_threshold() {
        let spend = BudgetSpend::compute(&budget(1000.0, 150.0), 1200.0);
        assert!(spend.is_over_budget);
        assert!(!spend.should_alert, "threshold of 150% not yet reached");
        assert_eq!(spend.remaining, -200.0);
    }

    #[test]
    fn test_under_threshold_is_quiet() {
        let spend = BudgetSpend::compute(&budget(1000.0, 80.0), 500.0);
        assert!(!spend.should_alert);
        assert!(!spend.is_over_budget);
        assert_eq!(spend.percentage_used, 50.0);
    }

    #[test]
    fn test_zero_amount_budget() {
        let spend = BudgetSpend::compute(&budget(0.0, 80.0), 100.0);
        assert_eq!(spend.percentage_used, 0.0);
        assert!(spend.is_over_budget, "any spending exceeds a zero budget");
    }

    #[test]
    fn test_exactly_at_threshold_alerts() {
        let spend = BudgetSpend::compute(&budget(1000.0, 80.0), 800.0);
        assert!(spend.should_alert);
    }

    #[test]
    fn test_spent_equal_to_amount_is_not_over() {
        let spend = BudgetSpend::compute(&budget(1000.0, 80.0), 1000.0);
        assert!(!spend.is_over_budget);
        assert!(spend.should_alert);
        assert_eq!(spend.remaining, 0.0);
    }
}
