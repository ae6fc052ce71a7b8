//! Budget operations

use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetPeriod, NewBudget};

const BUDGET_COLUMNS: &str =
    "id, user_id, category, amount, period, start_date, end_date, alert_threshold, is_active, created_at";

fn map_budget(row: &rusqlite::Row<'_>) -> rusqlite::Result<Budget> {
    let period_str: String = row.get(4)?;
    let start_str: String = row.get(5)?;
    let end_str: String = row.get(6)?;
    let created_at_str: String = row.get(9)?;

    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: row.get(2)?,
        amount: row.get(3)?,
        period: period_str.parse().unwrap_or(BudgetPeriod::Monthly),
        start_date: parse_date(&start_str).unwrap_or_default(),
        end_date: parse_date(&end_str).unwrap_or_default(),
        alert_threshold: row.get(7)?,
        is_active: row.get(8)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Insert a budget
    ///
    /// Rejects windows that overlap an existing active budget for the same
    /// owner+category. This invariant belongs to the creation/update path;
    /// the background sweeps assume it holds.
    pub fn create_budget(&self, budget: &NewBudget) -> Result<i64> {
        if budget.end_date < budget.start_date {
            return Err(Error::InvalidData(format!(
                "budget window ends ({}) before it starts ({})",
                budget.end_date, budget.start_date
            )));
        }
        if !(0.0..=100.0).contains(&budget.alert_threshold) {
            return Err(Error::InvalidData(format!(
                "alert threshold {} outside 0-100",
                budget.alert_threshold
            )));
        }

        let conn = self.conn()?;

        let overlapping: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM budgets
            WHERE user_id = ?
              AND category = ?
              AND is_active = TRUE
              AND start_date <= ?
              AND end_date >= ?
            "#,
            params![
                budget.user_id,
                budget.category,
                budget.end_date.to_string(),
                budget.start_date.to_string(),
            ],
            |row| row.get(0),
        )?;
        if overlapping > 0 {
            return Err(Error::InvalidData(format!(
                "active budget for category '{}' already covers part of {}..{}",
                budget.category, budget.start_date, budget.end_date
            )));
        }

        conn.execute(
            r#"
            INSERT INTO budgets (user_id, category, amount, period, start_date, end_date, alert_threshold)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                budget.user_id,
                budget.category,
                budget.amount,
                budget.period.as_str(),
                budget.start_date.to_string(),
                budget.end_date.to_string(),
                budget.alert_threshold,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a budget by id
    pub fn get_budget(&self, id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM budgets WHERE id = ?", BUDGET_COLUMNS),
            params![id],
            map_budget,
        );

        match result {
            Ok(budget) => Ok(Some(budget)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All budgets currently flagged active, across all users
    pub fn find_active_budgets(&self) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budgets WHERE is_active = TRUE ORDER BY id",
            BUDGET_COLUMNS
        ))?;

        let budgets = stmt
            .query_map([], map_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets)
    }

    /// Activate or deactivate a budget
    pub fn set_budget_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE budgets SET is_active = ? WHERE id = ?",
            params![active, id],
        )?;
        Ok(())
    }
}
