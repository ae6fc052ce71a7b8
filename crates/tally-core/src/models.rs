//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An account owner
///
/// Every entity belongs to exactly one user. The background sweeps operate
/// across all users' entities; the user record is only looked up when a
/// notification is about to go out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Notification address. Alerts are skipped for users without one.
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recurrence cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Parse a stored frequency string, falling back to monthly.
    ///
    /// Monthly is the legacy default for recurring rows with a missing or
    /// unrecognized frequency. The fallback lives here, at the data boundary,
    /// so everything downstream works with the closed enum.
    pub fn parse_or_monthly(s: &str) -> Self {
        s.parse().unwrap_or(Self::Monthly)
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger transaction
///
/// A transaction flagged `recurring` doubles as a recurrence template: its
/// `next_due_date` drives future generation, and each generated instance is
/// itself recurring with its own forward-looking due date. There is no
/// structural template/instance split and no back-reference from an instance
/// to the record that spawned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
    pub recurring: bool,
    pub frequency: Option<Frequency>,
    /// Next generation date. Only moves forward, never backward.
    pub next_due_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub title: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
    pub recurring: bool,
    pub frequency: Option<Frequency>,
    pub next_due_date: Option<NaiveDate>,
    pub note: Option<String>,
}

/// Budget period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown budget period: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending budget for one category over a date window
///
/// Active budgets for the same owner+category must not have overlapping
/// windows; the store enforces that at creation/update time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub category: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Percentage of consumption (0-100) at which alerts fire. Default 80.
    pub alert_threshold: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a budget
#[derive(Debug, Clone)]
pub struct NewBudget {
    pub user_id: i64,
    pub category: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub alert_threshold: f64,
}

impl NewBudget {
    pub const DEFAULT_ALERT_THRESHOLD: f64 = 80.0;
}

/// A savings goal
///
/// `current_amount` is authoritative; `is_completed` is a cached derived
/// flag. The background sweep only ever flips it false to true; the owner's
/// edit path is what flips it back when the amount drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: NaiveDate,
    pub category: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a goal
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: NaiveDate,
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_round_trip() {
        for f in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ] {
            assert_eq!(f.as_str().parse::<Frequency>().unwrap(), f);
        }
    }

    #[test]
    fn test_frequency_unknown_falls_back_to_monthly() {
        assert_eq!(Frequency::parse_or_monthly("fortnightly"), Frequency::Monthly);
        assert_eq!(Frequency::parse_or_monthly(""), Frequency::Monthly);
        assert_eq!(Frequency::parse_or_monthly("WEEKLY"), Frequency::Weekly);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("expense".parse::<TransactionKind>().unwrap(), TransactionKind::Expense);
        assert!("transfer".parse::<TransactionKind>().is_err());
    }
}
