//! Record types held by the orchestrator.
//!
//! Every record carries a client-generated UUIDv7 identifier that is assigned at
//! construction and never changes. Records are replaced wholesale on update.

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

mod budget;
mod event;
mod habit;
mod journal;
mod kitchen;
mod settings;
mod vault;

pub use budget::{
    BudgetCategory, BudgetSetup, Classification, Expense, Frequency, RecurringExpense,
};
pub use event::Event;
pub use habit::{Habit, HabitFrequency};
pub use journal::{JournalEntry, Mood};
pub use kitchen::{MealPlan, MealSlot, Recipe, ShoppingItem};
pub use settings::Settings;
pub use vault::{VaultCategory, VaultItem, VaultSecret};

pub type RecordId = Uuid;

pub fn new_id() -> RecordId {
    Uuid::now_v7()
}

/// A record stored as one element of a named collection.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Durable collection name used by the persistence gateway.
    const COLLECTION: &'static str;

    fn id(&self) -> RecordId;
}

macro_rules! impl_record {
    ( $( $ty:ty => $name:literal ),+ $(,)? ) => {
        $(
            impl Record for $ty {
                const COLLECTION: &'static str = $name;

                fn id(&self) -> RecordId {
                    self.id
                }
            }
        )+
    };
}

impl_record!(
    Event => "events",
    Habit => "habits",
    JournalEntry => "journal_entries",
    BudgetCategory => "budget_categories",
    Expense => "expenses",
    RecurringExpense => "recurring_expenses",
    Recipe => "recipes",
    MealPlan => "meal_plans",
    ShoppingItem => "shopping_items",
    VaultItem => "vault_items",
);

/// Collection names for the singleton records.
pub const BUDGET_SETUP_KEY: &str = "budget_setup";
pub const SETTINGS_KEY: &str = "settings";
