//! User operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::User;

impl Database {
    /// Create a user
    pub fn create_user(&self, name: &str, email: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (name, email) VALUES (?, ?)",
            params![name, email],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a user by id
    pub fn find_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT id, name, email, created_at FROM users WHERE id = ?",
            params![id],
            |row| {
                let created_at_str: String = row.get(3)?;
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: parse_datetime(&created_at_str),
                })
            },
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
