//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Dispatch timed out after {0:?}")]
    DispatchTimeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A per-entity failure recorded during a sweep
///
/// Sweeps isolate failures: one bad entity is logged and collected here
/// while the rest of the sweep continues.
#[derive(Debug)]
pub struct SweepError {
    /// Id of the template, budget, or goal that failed
    pub entity_id: i64,
    pub error: Error,
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity {}: {}", self.entity_id, self.error)
    }
}
