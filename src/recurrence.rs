//! Recurring-expense catch-up.
//!
//! Each active definition materializes one expense per elapsed interval up to
//! today. The cursor is advanced and checkpointed after every single step, so
//! an interrupted run resumes from the last generated date.

use std::collections::HashSet;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Expense, Frequency, RecordId, RecurringExpense};
use crate::AppError;

/// How far a biweekly definition advances per occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiweeklyInterval {
    /// Same advance as weekly. Matches data written by older builds.
    OneWeek,
    #[default]
    TwoWeeks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecurrenceConfig {
    pub biweekly: BiweeklyInterval,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("date arithmetic overflowed advancing from {after}")]
    Overflow { after: NaiveDate },
    #[error("next occurrence {next} does not move past {after}")]
    NoProgress { after: NaiveDate, next: NaiveDate },
}

impl From<RecurrenceError> for AppError {
    fn from(error: RecurrenceError) -> Self {
        let code = match error {
            RecurrenceError::Overflow { .. } => "RECURRENCE/OVERFLOW",
            RecurrenceError::NoProgress { .. } => "RECURRENCE/NO_PROGRESS",
        };
        AppError::new(code, error.to_string())
    }
}

/// The occurrence following `after` for this definition.
///
/// The cursor advances by exactly one frequency unit. Month arithmetic clamps to
/// the last day of a shorter month, and later steps continue from that date.
pub fn next_occurrence(
    recurring: &RecurringExpense,
    after: NaiveDate,
    config: RecurrenceConfig,
) -> Result<NaiveDate, RecurrenceError> {
    let start = recurring.start_date;
    if after < start {
        return Ok(start);
    }
    let next = match recurring.frequency {
        Frequency::Daily => after.checked_add_days(Days::new(1)),
        Frequency::Weekly => after.checked_add_days(Days::new(7)),
        Frequency::Biweekly => match config.biweekly {
            BiweeklyInterval::OneWeek => after.checked_add_days(Days::new(7)),
            BiweeklyInterval::TwoWeeks => after.checked_add_days(Days::new(14)),
        },
        Frequency::Monthly => after.checked_add_months(Months::new(1)),
        Frequency::Yearly => after.checked_add_months(Months::new(12)),
    }
    .ok_or(RecurrenceError::Overflow { after })?;

    if next <= after {
        return Err(RecurrenceError::NoProgress { after, next });
    }
    Ok(next)
}

/// Persistence hook invoked after each individual step.
pub enum Checkpoint<'a> {
    Expenses(&'a [Expense]),
    Cursors(&'a [RecurringExpense]),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CatchUpReport {
    pub scanned: usize,
    pub generated: usize,
    pub skipped_inactive: usize,
    /// Steps whose expense already existed (a run interrupted between the
    /// expense save and the cursor save); only the cursor moved.
    pub already_present: usize,
    pub stalled: Vec<RecordId>,
}

pub fn catch_up(
    recurring: &mut [RecurringExpense],
    expenses: &mut Vec<Expense>,
    today: NaiveDate,
    config: RecurrenceConfig,
    checkpoint: &mut dyn FnMut(Checkpoint<'_>),
) -> CatchUpReport {
    let mut report = CatchUpReport::default();
    let mut seen: HashSet<(RecordId, NaiveDate)> = expenses
        .iter()
        .filter_map(|expense| expense.recurring_id.map(|id| (id, expense.date)))
        .collect();

    for index in 0..recurring.len() {
        report.scanned += 1;
        if !recurring[index].active {
            report.skipped_inactive += 1;
            continue;
        }

        loop {
            let definition = &recurring[index];
            let candidate = match definition.cursor {
                None => definition.start_date,
                Some(cursor) => match next_occurrence(definition, cursor, config) {
                    Ok(next) => next,
                    Err(err) => {
                        warn!(
                            target: "daybook",
                            event = "recurrence_stalled",
                            recurring_id = %definition.id,
                            error = %err
                        );
                        report.stalled.push(definition.id);
                        break;
                    }
                },
            };
            if candidate > today || !definition.within_end(candidate) {
                break;
            }

            if seen.insert((definition.id, candidate)) {
                expenses.push(definition.materialize(candidate));
                report.generated += 1;
                debug!(
                    target: "daybook",
                    event = "recurrence_generated",
                    recurring_id = %definition.id,
                    date = %candidate
                );
                checkpoint(Checkpoint::Expenses(expenses));
            } else {
                report.already_present += 1;
            }

            recurring[index].cursor = Some(candidate);
            checkpoint(Checkpoint::Cursors(recurring));
        }
    }

    if report.generated > 0 || !report.stalled.is_empty() {
        info!(
            target: "daybook",
            event = "recurrence_catch_up",
            today = %today,
            scanned = report.scanned,
            generated = report.generated,
            already_present = report.already_present,
            stalled = report.stalled.len()
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BudgetCategory, Classification};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn definition(frequency: Frequency, start: NaiveDate) -> RecurringExpense {
        let category = BudgetCategory::new("Bills", Decimal::from(500), Classification::Needs);
        RecurringExpense::new("Bill", Decimal::from(50), category, frequency, start)
    }

    fn run(
        recurring: &mut [RecurringExpense],
        expenses: &mut Vec<Expense>,
        today: NaiveDate,
        config: RecurrenceConfig,
    ) -> CatchUpReport {
        catch_up(recurring, expenses, today, config, &mut |_| {})
    }

    #[test]
    fn next_occurrence_per_frequency() {
        let start = date(2024, 1, 1);
        let config = RecurrenceConfig::default();
        let cases = [
            (Frequency::Daily, date(2024, 1, 2)),
            (Frequency::Weekly, date(2024, 1, 8)),
            (Frequency::Biweekly, date(2024, 1, 15)),
            (Frequency::Monthly, date(2024, 2, 1)),
            (Frequency::Yearly, date(2025, 1, 1)),
        ];
        for (frequency, expected) in cases {
            let rec = definition(frequency, start);
            assert_eq!(next_occurrence(&rec, start, config), Ok(expected), "{frequency:?}");
        }
    }

    #[test]
    fn legacy_biweekly_advances_one_week() {
        let rec = definition(Frequency::Biweekly, date(2024, 1, 1));
        let config = RecurrenceConfig {
            biweekly: BiweeklyInterval::OneWeek,
        };
        assert_eq!(
            next_occurrence(&rec, date(2024, 1, 1), config),
            Ok(date(2024, 1, 8))
        );
    }

    #[test]
    fn monthly_steps_from_the_clamped_cursor() {
        let rec = definition(Frequency::Monthly, date(2024, 1, 31));
        let mut recurring = vec![rec];
        let mut expenses = Vec::new();
        run(
            &mut recurring,
            &mut expenses,
            date(2024, 4, 30),
            RecurrenceConfig::default(),
        );
        let dates: Vec<_> = expenses.iter().map(|e| e.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 29), date(2024, 4, 29)]
        );
        assert_eq!(
            next_occurrence(&recurring[0], date(2024, 2, 29), RecurrenceConfig::default()),
            Ok(date(2024, 3, 29))
        );
    }

    #[test]
    fn yearly_from_leap_day_clamps_and_keeps_the_clamped_day() {
        let rec = definition(Frequency::Yearly, date(2024, 2, 29));
        assert_eq!(
            next_occurrence(&rec, date(2024, 2, 29), RecurrenceConfig::default()),
            Ok(date(2025, 2, 28))
        );
        assert_eq!(
            next_occurrence(&rec, date(2027, 2, 28), RecurrenceConfig::default()),
            Ok(date(2028, 2, 28))
        );
    }

    #[test]
    fn overflow_stalls_only_that_definition() {
        let mut broken = definition(Frequency::Daily, date(2024, 1, 1));
        broken.cursor = Some(NaiveDate::MAX);
        let healthy = definition(Frequency::Daily, date(2024, 1, 1));
        let healthy_id = healthy.id;
        let broken_id = broken.id;
        let mut recurring = vec![broken, healthy];
        let mut expenses = Vec::new();

        let report = run(
            &mut recurring,
            &mut expenses,
            date(2024, 1, 3),
            RecurrenceConfig::default(),
        );
        assert_eq!(report.stalled, vec![broken_id]);
        assert_eq!(report.generated, 3);
        assert!(expenses.iter().all(|e| e.recurring_id == Some(healthy_id)));
    }

    #[test]
    fn inactive_and_future_definitions_generate_nothing() {
        let mut paused = definition(Frequency::Daily, date(2024, 1, 1));
        paused.active = false;
        let future = definition(Frequency::Daily, date(2024, 2, 1));
        let mut recurring = vec![paused, future];
        let mut expenses = Vec::new();
        let report = run(
            &mut recurring,
            &mut expenses,
            date(2024, 1, 10),
            RecurrenceConfig::default(),
        );
        assert_eq!(report.generated, 0);
        assert_eq!(report.skipped_inactive, 1);
        assert!(recurring.iter().all(|r| r.cursor.is_none()));
    }

    #[test]
    fn start_after_end_generates_nothing() {
        let rec = definition(Frequency::Weekly, date(2024, 3, 1)).ending(date(2024, 2, 1));
        let mut recurring = vec![rec];
        let mut expenses = Vec::new();
        run(
            &mut recurring,
            &mut expenses,
            date(2024, 6, 1),
            RecurrenceConfig::default(),
        );
        assert!(expenses.is_empty());
        assert_eq!(recurring[0].cursor, None);
    }

    #[test]
    fn checkpoints_follow_every_step() {
        let rec = definition(Frequency::Daily, date(2024, 1, 1));
        let mut recurring = vec![rec];
        let mut expenses = Vec::new();
        let mut log = Vec::new();
        catch_up(
            &mut recurring,
            &mut expenses,
            date(2024, 1, 2),
            RecurrenceConfig::default(),
            &mut |checkpoint| match checkpoint {
                Checkpoint::Expenses(items) => log.push(format!("expenses:{}", items.len())),
                Checkpoint::Cursors(items) => {
                    log.push(format!("cursor:{}", items[0].cursor.unwrap()))
                }
            },
        );
        assert_eq!(
            log,
            vec![
                "expenses:1",
                "cursor:2024-01-01",
                "expenses:2",
                "cursor:2024-01-02"
            ]
        );
    }

    #[test]
    fn existing_expense_is_not_generated_twice() {
        let rec = definition(Frequency::Monthly, date(2024, 1, 1));
        let mut expenses = vec![rec.materialize(date(2024, 1, 1))];
        let mut recurring = vec![rec];
        let report = run(
            &mut recurring,
            &mut expenses,
            date(2024, 1, 20),
            RecurrenceConfig::default(),
        );
        assert_eq!(report.generated, 0);
        assert_eq!(report.already_present, 1);
        assert_eq!(expenses.len(), 1);
        assert_eq!(recurring[0].cursor, Some(date(2024, 1, 1)));
    }
}
