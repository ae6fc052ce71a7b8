//! Transaction operations

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Frequency, NewTransaction, Transaction};

const TRANSACTION_COLUMNS: &str =
    "id, user_id, title, amount, kind, category, date, recurring, frequency, next_due_date, note, created_at";

fn map_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let kind_str: String = row.get(4)?;
    let date_str: String = row.get(6)?;
    let freq_str: Option<String> = row.get(8)?;
    let due_str: Option<String> = row.get(9)?;
    let created_at_str: String = row.get(11)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        amount: row.get(3)?,
        // The CHECK constraint keeps unknown kinds out; expense is the safe
        // read-side fallback for rows predating it
        kind: kind_str
            .parse()
            .unwrap_or(crate::models::TransactionKind::Expense),
        category: row.get(5)?,
        date: parse_date(&date_str).unwrap_or_default(),
        recurring: row.get(7)?,
        // Unknown or missing frequency resolves to monthly here, at the data
        // boundary, so downstream code only ever sees the closed enum
        frequency: freq_str.map(|s| Frequency::parse_or_monthly(&s)),
        next_due_date: due_str.and_then(|s| parse_date(&s)),
        note: row.get(10)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Insert a transaction
    pub fn create_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, title, amount, kind, category, date, recurring, frequency, next_due_date, note)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.title,
                tx.amount,
                tx.kind.as_str(),
                tx.category,
                tx.date.to_string(),
                tx.recurring,
                tx.frequency.map(|f| f.as_str()),
                tx.next_due_date.map(|d| d.to_string()),
                tx.note,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a transaction by id
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
            params![id],
            map_transaction,
        );

        match result {
            Ok(tx) => Ok(Some(tx)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all transactions for a user, most recent first
    pub fn list_transactions(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![user_id], map_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Recurring templates with a next due date inside `[from, to)`
    ///
    /// The half-open window means a one-day window selects exactly the
    /// templates due that day; templates due during downtime before `from`
    /// are not picked up.
    pub fn find_due_recurring(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE recurring = TRUE
              AND next_due_date IS NOT NULL
              AND next_due_date >= ?
              AND next_due_date < ?
            ORDER BY id
            "#,
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![from.to_string(), to.to_string()], map_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Advance a template's next due date
    ///
    /// Refuses to move the date backward: the due date is a forward-only
    /// cursor over the template's cadence.
    pub fn set_next_due_date(&self, id: i64, next: NaiveDate) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE transactions
            SET next_due_date = ?
            WHERE id = ?
              AND (next_due_date IS NULL OR next_due_date <= ?)
            "#,
            params![next.to_string(), id, next.to_string()],
        )?;

        if updated == 0 {
            return Err(Error::InvalidData(format!(
                "next_due_date for transaction {} would move backward or row is missing",
                id
            )));
        }
        Ok(())
    }

    /// Sum of expense amounts for one owner+category over an inclusive range
    pub fn expense_sum(
        &self,
        user_id: i64,
        category: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64> {
        let conn = self.conn()?;
        let sum: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE user_id = ?
              AND kind = 'expense'
              AND category = ?
              AND date >= ?
              AND date <= ?
            "#,
            params![user_id, category, from.to_string(), to.to_string()],
            |row| row.get(0),
        )?;
        Ok(sum)
    }
}
