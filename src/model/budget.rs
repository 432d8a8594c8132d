use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{new_id, RecordId};
use crate::time::MonthKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Needs,
    Wants,
    Savings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    pub limit: Decimal,
    pub classification: Classification,
}

impl BudgetCategory {
    pub fn new(name: impl Into<String>, limit: Decimal, classification: Classification) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            icon: String::new(),
            color: String::new(),
            limit,
            classification,
        }
    }
}

/// A concrete spend. The category is an embedded copy taken when the expense
/// was saved, so later category edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: RecordId,
    pub title: String,
    pub amount: Decimal,
    pub category: BudgetCategory,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_id: Option<RecordId>,
}

impl Expense {
    pub fn new(
        title: impl Into<String>,
        amount: Decimal,
        category: BudgetCategory,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            amount,
            category,
            date,
            notes: None,
            is_recurring: false,
            recurring_id: None,
        }
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub id: RecordId,
    pub title: String,
    pub amount: Decimal,
    pub category: BudgetCategory,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Last date a concrete expense was generated for; `None` until the first one.
    #[serde(default, rename = "last_generated")]
    pub cursor: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RecurringExpense {
    pub fn new(
        title: impl Into<String>,
        amount: Decimal,
        category: BudgetCategory,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            amount,
            category,
            frequency,
            start_date,
            end_date: None,
            cursor: None,
            active: true,
        }
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn within_end(&self, date: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| date <= end)
    }

    /// Builds the concrete expense generated for one occurrence.
    pub fn materialize(&self, date: NaiveDate) -> Expense {
        Expense {
            id: new_id(),
            title: self.title.clone(),
            amount: self.amount,
            category: self.category.clone(),
            date,
            notes: Some(format!("Recurring expense ({})", self.frequency.as_str())),
            is_recurring: true,
            recurring_id: Some(self.id),
        }
    }
}

/// Monthly income split across needs, wants and savings. The percentages are
/// expected to add up to 100 but the type does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSetup {
    pub monthly_income: Decimal,
    pub needs_percent: Decimal,
    pub wants_percent: Decimal,
    pub savings_percent: Decimal,
    #[serde(default)]
    pub completed: bool,
}

impl Default for BudgetSetup {
    fn default() -> Self {
        Self {
            monthly_income: Decimal::ZERO,
            needs_percent: Decimal::from(50),
            wants_percent: Decimal::from(30),
            savings_percent: Decimal::from(20),
            completed: false,
        }
    }
}

impl BudgetSetup {
    pub fn is_balanced(&self) -> bool {
        self.needs_percent + self.wants_percent + self.savings_percent == Decimal::ONE_HUNDRED
    }

    pub fn allocation(&self, classification: Classification) -> Decimal {
        let percent = match classification {
            Classification::Needs => self.needs_percent,
            Classification::Wants => self.wants_percent,
            Classification::Savings => self.savings_percent,
        };
        self.monthly_income * percent / Decimal::ONE_HUNDRED
    }

    pub fn allocations(&self) -> [(Classification, Decimal); 3] {
        [
            Classification::Needs,
            Classification::Wants,
            Classification::Savings,
        ]
        .map(|classification| (classification, self.allocation(classification)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groceries() -> BudgetCategory {
        BudgetCategory::new("Groceries", Decimal::new(40000, 2), Classification::Needs)
    }

    #[test]
    fn materialized_expense_links_back() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rec = RecurringExpense::new(
            "Rent",
            Decimal::new(120000, 2),
            groceries(),
            Frequency::Monthly,
            start,
        );
        let expense = rec.materialize(start);
        assert!(expense.is_recurring);
        assert_eq!(expense.recurring_id, Some(rec.id));
        assert_eq!(expense.category, rec.category);
        assert!(expense.notes.as_deref().unwrap_or("").contains("Recurring"));
        assert_eq!(expense.month_key().to_string(), "2024-01");
    }

    #[test]
    fn cursor_serializes_as_last_generated() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut rec =
            RecurringExpense::new("Gym", Decimal::new(2500, 2), groceries(), Frequency::Weekly, start);
        rec.cursor = Some(start);
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["last_generated"], "2024-01-01");
        assert_eq!(value["frequency"], "weekly");
    }

    #[test]
    fn budget_setup_allocations() {
        let setup = BudgetSetup {
            monthly_income: Decimal::new(400000, 2),
            ..BudgetSetup::default()
        };
        assert!(setup.is_balanced());
        assert_eq!(setup.allocation(Classification::Needs), Decimal::from(2000));
        assert_eq!(setup.allocation(Classification::Savings), Decimal::from(800));

        let lopsided = BudgetSetup {
            wants_percent: Decimal::from(45),
            ..setup
        };
        assert!(!lopsided.is_balanced());
    }
}
