//! Recurring transaction materialization
//!
//! Turns recurrence templates into concrete transactions on their due dates
//! and advances each template's cadence. A recurring transaction is its own
//! template: every materialized instance is again recurring, with a due date
//! one period out.

use std::sync::Arc;

use chrono::{Duration, Months, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::{Result, SweepError};
use crate::models::{Frequency, NewTransaction};
use crate::store::Store;

/// Advance a date by one period
///
/// Monthly and yearly steps clamp to the last valid day of the target month,
/// so Jan 31 advances to Feb 28 (or Feb 29 in a leap year) and Feb 29
/// advances to Feb 28 in a non-leap year.
pub fn advance(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    match frequency {
        Frequency::Daily => date + Duration::days(1),
        Frequency::Weekly => date + Duration::days(7),
        Frequency::Monthly => date.checked_add_months(Months::new(1)).unwrap_or(date),
        Frequency::Yearly => date.checked_add_months(Months::new(12)).unwrap_or(date),
    }
}

/// Results of one materialization sweep
#[derive(Debug, Default)]
pub struct MaterializeOutcome {
    /// Instances actually created, even when the template's own due-date
    /// advance failed afterwards
    pub created: usize,
    pub errors: Vec<SweepError>,
}

/// Materializes transactions from recurrence templates due on a given day
pub struct Materializer {
    store: Arc<dyn Store>,
}

impl Materializer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Materialize every template due on `as_of`
    ///
    /// Selection is the one-day window `[as_of, as_of + 1)`. For each due
    /// template, a new instance is created dated `as_of`, then the template's
    /// own `next_due_date` advances one period from its prior due date - not
    /// from `as_of` - so a late run keeps the original cadence (e.g. always
    /// the 15th). Failures are isolated per template: a failed create or save
    /// is recorded and the sweep moves on. A template whose due date was not
    /// advanced is naturally re-evaluated on the next run.
    pub fn run(&self, as_of: NaiveDate) -> Result<MaterializeOutcome> {
        let window_end = as_of + Duration::days(1);
        let due = self.store.find_due_recurring(as_of, window_end)?;

        info!(count = due.len(), %as_of, "processing due recurring transactions");

        let mut outcome = MaterializeOutcome::default();

        for template in due {
            let frequency = template.frequency.unwrap_or(Frequency::Monthly);

            let instance = NewTransaction {
                user_id: template.user_id,
                title: template.title.clone(),
                amount: template.amount,
                kind: template.kind,
                category: template.category.clone(),
                // Instances carry the run date, not the template's due date
                date: as_of,
                recurring: true,
                frequency: Some(frequency),
                next_due_date: Some(advance(as_of, frequency)),
                note: template.note.clone(),
            };

            match self.store.create_transaction(&instance) {
                Ok(id) => {
                    debug!(template = template.id, instance = id, "materialized recurring transaction");
                }
                Err(e) => {
                    warn!(template = template.id, error = %e, "failed to materialize recurring transaction");
                    outcome.errors.push(SweepError {
                        entity_id: template.id,
                        error: e,
                    });
                    continue;
                }
            }
            outcome.created += 1;

            // Advance from the prior due date, falling back to the
            // transaction date for templates that never had one
            let prior = template.next_due_date.unwrap_or(template.date);
            let next = advance(prior, frequency);
            if let Err(e) = self.store.set_next_due_date(template.id, next) {
                warn!(template = template.id, error = %e, "failed to advance template due date");
                outcome.errors.push(SweepError {
                    entity_id: template.id,
                    error: e,
                });
            }
        }

        info!(
            created = outcome.created,
            errors = outcome.errors.len(),
            "recurring transaction sweep complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;
    use crate::test_utils::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_advance_daily_and_weekly() {
        assert_eq!(advance(date(2024, 6, 15), Frequency::Daily), date(2024, 6, 16));
        assert_eq!(advance(date(2024, 6, 30), Frequency::Daily), date(2024, 7, 1));
        assert_eq!(advance(date(2024, 6, 15), Frequency::Weekly), date(2024, 6, 22));
        assert_eq!(advance(date(2024, 12, 28), Frequency::Weekly), date(2025, 1, 4));
    }

    #[test]
    fn test_advance_monthly_clamps_to_month_end() {
        // Leap year: Jan 31 -> Feb 29
        assert_eq!(advance(date(2024, 1, 31), Frequency::Monthly), date(2024, 2, 29));
        // Non-leap year: Jan 31 -> Feb 28
        assert_eq!(advance(date(2023, 1, 31), Frequency::Monthly), date(2023, 2, 28));
        assert_eq!(advance(date(2024, 3, 31), Frequency::Monthly), date(2024, 4, 30));
        // Mid-month days pass through unchanged
        assert_eq!(advance(date(2024, 6, 15), Frequency::Monthly), date(2024, 7, 15));
        // Year rollover
        assert_eq!(advance(date(2024, 12, 31), Frequency::Monthly), date(2025, 1, 31));
    }

    #[test]
    fn test_advance_yearly_clamps_leap_day() {
        assert_eq!(advance(date(2024, 2, 29), Frequency::Yearly), date(2025, 2, 28));
        assert_eq!(advance(date(2024, 6, 15), Frequency::Yearly), date(2025, 6, 15));
    }

    fn template(store: &MemoryStore, user_id: i64, title: &str, due: NaiveDate) -> i64 {
        store.add_transaction(&NewTransaction {
            user_id,
            title: title.to_string(),
            amount: 120.0,
            kind: TransactionKind::Expense,
            category: "Utilities".to_string(),
            date: due - Duration::days(30),
            recurring: true,
            frequency: Some(Frequency::Monthly),
            next_due_date: Some(due),
            note: Some("power bill".to_string()),
        })
    }

    #[test]
    fn test_materializes_one_instance_per_due_template() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", Some("asha@example.com"));
        let as_of = date(2024, 6, 15);
        let id = template(&store, user, "Electricity", as_of);

        let outcome = Materializer::new(store.clone()).run(as_of).unwrap();

        assert_eq!(outcome.created, 1);
        assert!(outcome.errors.is_empty());

        let all = store.transactions();
        assert_eq!(all.len(), 2);
        let instance = all.iter().find(|t| t.id != id).unwrap();
        assert_eq!(instance.title, "Electricity");
        assert_eq!(instance.date, as_of);
        assert!(instance.recurring, "instances are templates themselves");
        assert_eq!(instance.next_due_date, Some(date(2024, 7, 15)));

        // The template advanced one period from its prior due date
        let tpl = store.transaction(id).unwrap();
        assert_eq!(tpl.next_due_date, Some(date(2024, 7, 15)));
    }

    #[test]
    fn test_window_excludes_other_days() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", None);
        let as_of = date(2024, 6, 15);
        template(&store, user, "Yesterday", as_of - Duration::days(1));
        template(&store, user, "Tomorrow", as_of + Duration::days(1));

        let outcome = Materializer::new(store.clone()).run(as_of).unwrap();

        // Templates due during downtime are not backfilled, future ones wait
        assert_eq!(outcome.created, 0);
        assert_eq!(store.transactions().len(), 2);
    }

    #[test]
    fn test_failure_on_one_template_does_not_stop_the_rest() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", None);
        let as_of = date(2024, 6, 15);
        let first = template(&store, user, "Rent", as_of);
        let second = template(&store, user, "Gym", as_of);
        let third = template(&store, user, "Internet", as_of);
        store.fail_create_for_title("Gym");

        let outcome = Materializer::new(store.clone()).run(as_of).unwrap();

        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].entity_id, second);

        // The failed template keeps its due date and re-fires next run
        assert_eq!(store.transaction(second).unwrap().next_due_date, Some(as_of));
        assert_eq!(
            store.transaction(first).unwrap().next_due_date,
            Some(date(2024, 7, 15))
        );
        assert_eq!(
            store.transaction(third).unwrap().next_due_date,
            Some(date(2024, 7, 15))
        );
    }

    #[test]
    fn test_save_failure_still_counts_created_instance() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", None);
        let as_of = date(2024, 6, 15);
        let id = template(&store, user, "Rent", as_of);
        store.fail_next_due_for(id);

        let outcome = Materializer::new(store.clone()).run(as_of).unwrap();

        // The instance exists; the unadvanced template will fire again, which
        // can duplicate it - that is the documented at-least-once behavior
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(store.transactions().len(), 2);
        assert_eq!(store.transaction(id).unwrap().next_due_date, Some(as_of));
    }

    #[test]
    fn test_missing_frequency_defaults_to_monthly() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Asha", None);
        let as_of = date(2024, 1, 31);
        let id = store.add_transaction(&NewTransaction {
            user_id: user,
            title: "Legacy".to_string(),
            amount: 50.0,
            kind: TransactionKind::Expense,
            category: "Misc".to_string(),
            date: date(2023, 12, 31),
            recurring: true,
            frequency: None,
            next_due_date: Some(as_of),
            note: None,
        });

        let outcome = Materializer::new(store.clone()).run(as_of).unwrap();

        assert_eq!(outcome.created, 1);
        // Monthly default, with end-of-month clamping into February
        assert_eq!(store.transaction(id).unwrap().next_due_date, Some(date(2024, 2, 29)));
    }
}
