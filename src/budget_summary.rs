use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{BudgetCategory, Classification, Expense, RecordId};
use crate::time::MonthKey;

/// Spending for one calendar month against the sum of all category limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub month_key: MonthKey,
    pub total_budget: Decimal,
    pub total_spent: Decimal,
    pub remaining: Decimal,
    /// Percent of the budget spent; zero when no budget is set.
    pub spent_percentage: Decimal,
    /// Keyed by the embedded category snapshot's id.
    pub by_category: BTreeMap<RecordId, Decimal>,
    pub by_classification: BTreeMap<Classification, Decimal>,
}

pub fn summarize_month(
    month_key: MonthKey,
    categories: &[BudgetCategory],
    expenses: &[Expense],
) -> MonthlySummary {
    let total_budget: Decimal = categories.iter().map(|c| c.limit).sum();

    let mut total_spent = Decimal::ZERO;
    let mut by_category = BTreeMap::new();
    let mut by_classification = BTreeMap::new();
    for expense in expenses.iter().filter(|e| e.month_key() == month_key) {
        total_spent += expense.amount;
        *by_category.entry(expense.category.id).or_insert(Decimal::ZERO) += expense.amount;
        *by_classification
            .entry(expense.category.classification)
            .or_insert(Decimal::ZERO) += expense.amount;
    }

    let spent_percentage = if total_budget.is_zero() {
        Decimal::ZERO
    } else {
        (total_spent / total_budget * Decimal::ONE_HUNDRED).normalize()
    };

    MonthlySummary {
        month_key,
        total_budget,
        total_spent,
        remaining: total_budget - total_spent,
        spent_percentage,
        by_category,
        by_classification,
    }
}
