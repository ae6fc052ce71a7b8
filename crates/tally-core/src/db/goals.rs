//! Goal operations

use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{Goal, NewGoal};

const GOAL_COLUMNS: &str =
    "id, user_id, title, description, target_amount, current_amount, target_date, category, is_completed, created_at";

fn map_goal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Goal> {
    let target_date_str: String = row.get(6)?;
    let created_at_str: String = row.get(9)?;

    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        target_amount: row.get(4)?,
        current_amount: row.get(5)?,
        target_date: parse_date(&target_date_str).unwrap_or_default(),
        category: row.get(7)?,
        is_completed: row.get(8)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Insert a goal
    pub fn create_goal(&self, goal: &NewGoal) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO goals (user_id, title, description, target_amount, current_amount, target_date, category)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                goal.user_id,
                goal.title,
                goal.description,
                goal.target_amount,
                goal.current_amount,
                goal.target_date.to_string(),
                goal.category,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a goal by id
    pub fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM goals WHERE id = ?", GOAL_COLUMNS),
            params![id],
            map_goal,
        );

        match result {
            Ok(goal) => Ok(Some(goal)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All goals not yet marked completed, across all users
    pub fn find_incomplete_goals(&self) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM goals WHERE is_completed = FALSE ORDER BY id",
            GOAL_COLUMNS
        ))?;

        let goals = stmt
            .query_map([], map_goal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(goals)
    }

    /// Flag a goal as completed
    pub fn mark_goal_completed(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE goals SET is_completed = TRUE WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Update a goal's saved amount (the owner's edit path)
    ///
    /// Re-derives `is_completed` in both directions: reaching the target
    /// completes the goal, dropping back below it un-completes it. The
    /// background sweep never performs the reverse transition; this is the
    /// only place it happens.
    pub fn update_goal_amount(&self, id: i64, current_amount: f64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE goals
            SET current_amount = ?1,
                is_completed = (?1 >= target_amount)
            WHERE id = ?2
            "#,
            params![current_amount, id],
        )?;
        Ok(())
    }
}
