//! The owner-side state: every collection, the singletons, and the effects a
//! mutation queued for dispatch. Only the owner task ever touches a `Ledger`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::effects::{Patch, SideEffect};
use super::stats::SideEffectStats;
use crate::budget_summary::{summarize_month, MonthlySummary};
use crate::calendar::ConnectorSlot;
use crate::model::{
    BudgetCategory, BudgetSetup, Event, Expense, Habit, JournalEntry, MealPlan, Recipe, RecordId,
    Record, RecurringExpense, Settings, ShoppingItem, VaultItem, VaultSecret, BUDGET_SETUP_KEY,
    SETTINGS_KEY,
};
use crate::recurrence::{catch_up, CatchUpReport, Checkpoint, RecurrenceConfig};
use crate::secrets::SecretStore;
use crate::store::{load_collection, load_singleton, StoreHandle};
use crate::time::{Clock, MonthKey};
use crate::AppResult;

#[derive(Default)]
struct Collections {
    events: Vec<Event>,
    habits: Vec<Habit>,
    journal: Vec<JournalEntry>,
    categories: Vec<BudgetCategory>,
    expenses: Vec<Expense>,
    recurring: Vec<RecurringExpense>,
    recipes: Vec<Recipe>,
    meal_plans: Vec<MealPlan>,
    shopping: Vec<ShoppingItem>,
    vault: Vec<VaultItem>,
}

pub struct Ledger {
    store: StoreHandle,
    secrets: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    recurrence: RecurrenceConfig,
    stats: Arc<SideEffectStats>,
    collections: Collections,
    settings: Settings,
    budget_setup: BudgetSetup,
    last_catch_up: Option<CatchUpReport>,
    effects: Vec<SideEffect>,
}

mod sealed {
    pub trait Sealed {}
}

/// A record type the orchestrator keeps a collection of.
///
/// The hooks let a type attach side effects to the generic add/update/delete
/// path without the path knowing about calendars, reminders or secrets.
pub trait Stored: Record + sealed::Sealed {
    #[doc(hidden)]
    fn slot(ledger: &Ledger) -> &Vec<Self>;
    #[doc(hidden)]
    fn slot_mut(ledger: &mut Ledger) -> &mut Vec<Self>;

    /// Restores type invariants before the record is stored.
    #[doc(hidden)]
    fn prepare(&mut self) {}

    /// Runs before the record is written; `record` may still be adjusted.
    #[doc(hidden)]
    fn on_upsert(_ledger: &mut Ledger, _previous: Option<&Self>, _record: &mut Self) {}

    /// Releases external resources. Runs before removal is persisted.
    #[doc(hidden)]
    fn on_release(_ledger: &mut Ledger, _record: &Self) {}
}

macro_rules! stored {
    ( $ty:ty => $field:ident $( { $($hooks:tt)* } )? ) => {
        impl sealed::Sealed for $ty {}

        impl Stored for $ty {
            fn slot(ledger: &Ledger) -> &Vec<Self> {
                &ledger.collections.$field
            }

            fn slot_mut(ledger: &mut Ledger) -> &mut Vec<Self> {
                &mut ledger.collections.$field
            }

            $( $($hooks)* )?
        }
    };
}

stored!(Event => events {
    fn prepare(&mut self) {
        self.normalize();
    }

    fn on_upsert(ledger: &mut Ledger, previous: Option<&Self>, record: &mut Self) {
        ledger.event_upserted(previous, record);
    }

    fn on_release(ledger: &mut Ledger, record: &Self) {
        ledger.event_released(record);
    }
});

stored!(Habit => habits {
    fn prepare(&mut self) {
        self.normalize();
    }

    fn on_upsert(ledger: &mut Ledger, previous: Option<&Self>, record: &mut Self) {
        ledger.habit_upserted(previous, record);
    }

    fn on_release(ledger: &mut Ledger, record: &Self) {
        if !record.notification_ids.is_empty() {
            ledger.effects.push(SideEffect::CancelHabitReminders {
                ids: record.notification_ids.clone(),
            });
        }
    }
});

stored!(VaultItem => vault {
    fn on_release(ledger: &mut Ledger, record: &Self) {
        if let Err(err) = ledger.secrets.delete(record.id) {
            warn!(
                target: "daybook",
                event = "secret_delete_failed",
                item_id = %record.id,
                error = %err
            );
        }
    }
});

stored!(Recipe => recipes {
    fn on_release(ledger: &mut Ledger, record: &Self) {
        let mut touched = false;
        for plan in &mut ledger.collections.meal_plans {
            touched |= plan.forget_recipe(record.id);
        }
        if touched {
            ledger.persist::<MealPlan>();
        }
    }
});

stored!(JournalEntry => journal);
stored!(BudgetCategory => categories);
stored!(Expense => expenses);
stored!(RecurringExpense => recurring);
stored!(MealPlan => meal_plans);
stored!(ShoppingItem => shopping);

fn save_logged<T: Serialize>(
    store: &StoreHandle,
    stats: &SideEffectStats,
    collection: &str,
    items: &[T],
) {
    if let Err(err) = store.save_collection(collection, items) {
        SideEffectStats::bump(&stats.persist_failures);
        warn!(
            target: "daybook",
            event = "persist_failed",
            collection,
            code = %err.code(),
            error = %err
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Any,
    ExistingOnly,
}

pub(crate) struct LedgerParts {
    pub store: StoreHandle,
    pub secrets: Arc<dyn SecretStore>,
    pub clock: Arc<dyn Clock>,
    pub recurrence: RecurrenceConfig,
    pub stats: Arc<SideEffectStats>,
}

impl Ledger {
    /// Reads every collection; anything missing or undecodable starts empty.
    pub(crate) fn load(parts: LedgerParts) -> Self {
        let store = parts.store;
        let collections = Collections {
            events: load_collection(&store, Event::COLLECTION),
            habits: load_collection(&store, Habit::COLLECTION),
            journal: load_collection(&store, JournalEntry::COLLECTION),
            categories: load_collection(&store, BudgetCategory::COLLECTION),
            expenses: load_collection(&store, Expense::COLLECTION),
            recurring: load_collection(&store, RecurringExpense::COLLECTION),
            recipes: load_collection(&store, Recipe::COLLECTION),
            meal_plans: load_collection(&store, MealPlan::COLLECTION),
            shopping: load_collection(&store, ShoppingItem::COLLECTION),
            vault: load_collection(&store, VaultItem::COLLECTION),
        };
        let settings = load_singleton(&store, SETTINGS_KEY);
        let budget_setup = load_singleton(&store, BUDGET_SETUP_KEY);

        Self {
            store,
            secrets: parts.secrets,
            clock: parts.clock,
            recurrence: parts.recurrence,
            stats: parts.stats,
            collections,
            settings,
            budget_setup,
            last_catch_up: None,
            effects: Vec::new(),
        }
    }

    pub(crate) fn take_effects(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.effects)
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn persist<T: Stored>(&self) {
        save_logged(&self.store, &self.stats, T::COLLECTION, T::slot(self));
    }

    fn persist_singleton<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(err) = self.store.save_singleton(key, value) {
            SideEffectStats::bump(&self.stats.persist_failures);
            warn!(
                target: "daybook",
                event = "persist_failed",
                collection = key,
                code = %err.code(),
                error = %err
            );
        }
    }

    fn position<T: Stored>(&self, id: RecordId) -> Option<usize> {
        T::slot(self).iter().position(|record| record.id() == id)
    }

    fn upsert<T: Stored>(&mut self, mut record: T, mode: Upsert) -> bool {
        record.prepare();
        let id = record.id();
        let previous = self.position::<T>(id).map(|index| T::slot(self)[index].clone());
        if previous.is_none() && mode == Upsert::ExistingOnly {
            debug!(
                target: "daybook",
                event = "update_missing",
                collection = T::COLLECTION,
                id = %id
            );
            return false;
        }

        T::on_upsert(self, previous.as_ref(), &mut record);
        match self.position::<T>(id) {
            Some(index) => T::slot_mut(self)[index] = record,
            None => T::slot_mut(self).push(record),
        }
        self.persist::<T>();
        true
    }

    /// Appends the record, or replaces the stored one carrying the same id.
    pub(crate) fn add<T: Stored>(&mut self, record: T) {
        self.upsert(record, Upsert::Any);
    }

    /// Replaces the stored record with the same id. Missing ids are ignored.
    pub(crate) fn update<T: Stored>(&mut self, record: T) -> bool {
        self.upsert(record, Upsert::ExistingOnly)
    }

    pub(crate) fn remove<T: Stored>(&mut self, id: RecordId) -> bool {
        let Some(index) = self.position::<T>(id) else {
            return false;
        };
        let record = T::slot(self)[index].clone();
        T::on_release(self, &record);
        T::slot_mut(self).retain(|stored| stored.id() != id);
        self.persist::<T>();
        true
    }

    pub(crate) fn get<T: Stored>(&self, id: RecordId) -> Option<T> {
        T::slot(self).iter().find(|record| record.id() == id).cloned()
    }

    pub(crate) fn list<T: Stored>(&self) -> Vec<T> {
        T::slot(self).clone()
    }

    fn event_upserted(&mut self, previous: Option<&Event>, record: &mut Event) {
        if let Some(previous) = previous {
            for slot in ConnectorSlot::ALL {
                if record.external_id(slot).is_none() {
                    record.set_external_id(slot, previous.external_id(slot).map(str::to_owned));
                }
            }
        }

        let stale = match previous {
            Some(previous) => previous.notification_id.clone(),
            None => record.notification_id.take(),
        };
        record.notification_id = None;
        if record.wants_reminder() {
            self.effects.push(SideEffect::ScheduleEventReminder {
                event: record.clone(),
                cancel: stale,
            });
        } else if let Some(id) = stale {
            self.effects.push(SideEffect::CancelEventReminder { id });
        }

        for slot in ConnectorSlot::ALL {
            if self.settings.sync_enabled(slot) {
                self.effects.push(SideEffect::SyncEvent {
                    event: record.clone(),
                    slot,
                });
            }
        }
    }

    fn event_released(&mut self, record: &Event) {
        if let Some(id) = &record.notification_id {
            self.effects
                .push(SideEffect::CancelEventReminder { id: id.clone() });
        }
        for slot in ConnectorSlot::ALL {
            if let Some(external_id) = record.external_id(slot) {
                self.effects.push(SideEffect::DeleteCalendarEvent {
                    slot,
                    external_id: external_id.to_owned(),
                });
            }
        }
    }

    fn habit_upserted(&mut self, previous: Option<&Habit>, record: &mut Habit) {
        let stale = match previous {
            Some(previous) => previous.notification_ids.clone(),
            None => std::mem::take(&mut record.notification_ids),
        };
        record.notification_ids.clear();
        if record.reminder_enabled {
            self.effects.push(SideEffect::ScheduleHabitReminders {
                habit: record.clone(),
                cancel: stale,
            });
        } else if !stale.is_empty() {
            self.effects
                .push(SideEffect::CancelHabitReminders { ids: stale });
        }
    }

    /// Flips completion for the calendar day. `None` when the habit is gone.
    pub(crate) fn toggle_habit_completion(&mut self, id: RecordId, date: NaiveDate) -> Option<bool> {
        let habit = self.collections.habits.iter_mut().find(|h| h.id == id)?;
        let completed = habit.toggle_completion(date);
        self.persist::<Habit>();
        Some(completed)
    }

    fn apply_secret(
        &self,
        item: &mut VaultItem,
        previous: Option<&VaultItem>,
        secret: Option<VaultSecret>,
    ) -> AppResult<()> {
        match secret {
            Some(secret) if !secret.is_empty() => {
                self.secrets.store(item.id, &secret)?;
                item.has_secret = true;
            }
            Some(_) => {
                self.secrets.delete(item.id)?;
                item.has_secret = false;
            }
            None => {
                if let Some(previous) = previous {
                    item.has_secret = previous.has_secret;
                }
            }
        }
        Ok(())
    }

    /// Stores the secret before the record is persisted, so a saved item never
    /// claims a secret the secret store does not hold.
    pub(crate) fn add_vault_item(
        &mut self,
        mut item: VaultItem,
        secret: Option<VaultSecret>,
    ) -> AppResult<()> {
        let previous = self.get::<VaultItem>(item.id);
        self.apply_secret(&mut item, previous.as_ref(), secret)?;
        self.add(item);
        Ok(())
    }

    /// `secret: None` keeps whatever secret is stored; an empty secret clears it.
    pub(crate) fn update_vault_item(
        &mut self,
        mut item: VaultItem,
        secret: Option<VaultSecret>,
    ) -> AppResult<bool> {
        let Some(previous) = self.get::<VaultItem>(item.id) else {
            return Ok(false);
        };
        self.apply_secret(&mut item, Some(&previous), secret)?;
        Ok(self.update(item))
    }

    pub(crate) fn vault_secret(&self, id: RecordId) -> AppResult<Option<VaultSecret>> {
        if self.position::<VaultItem>(id).is_none() {
            return Ok(None);
        }
        self.secrets.load(id)
    }

    pub(crate) fn clear_checked_shopping_items(&mut self) -> usize {
        let before = self.collections.shopping.len();
        self.collections.shopping.retain(|item| !item.checked);
        let removed = before - self.collections.shopping.len();
        if removed > 0 {
            self.persist::<ShoppingItem>();
        }
        removed
    }

    pub(crate) fn settings(&self) -> Settings {
        self.settings.clone()
    }

    pub(crate) fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
        self.persist_singleton(SETTINGS_KEY, &self.settings);
    }

    pub(crate) fn budget_setup(&self) -> BudgetSetup {
        self.budget_setup.clone()
    }

    pub(crate) fn update_budget_setup(&mut self, setup: BudgetSetup) {
        self.budget_setup = setup;
        self.persist_singleton(BUDGET_SETUP_KEY, &self.budget_setup);
    }

    /// Materializes every elapsed recurrence up to the clock's today. The
    /// expenses and cursors are persisted after each individual step.
    pub(crate) fn run_catch_up(&mut self) -> CatchUpReport {
        let today = self.today();
        let store = &self.store;
        let stats = &self.stats;
        let report = catch_up(
            &mut self.collections.recurring,
            &mut self.collections.expenses,
            today,
            self.recurrence,
            &mut |checkpoint| match checkpoint {
                Checkpoint::Expenses(items) => {
                    save_logged(store, stats, Expense::COLLECTION, items)
                }
                Checkpoint::Cursors(items) => {
                    save_logged(store, stats, RecurringExpense::COLLECTION, items)
                }
            },
        );
        self.last_catch_up = Some(report.clone());
        report
    }

    pub(crate) fn last_catch_up(&self) -> Option<CatchUpReport> {
        self.last_catch_up.clone()
    }

    pub(crate) fn apply_patch(&mut self, patch: Patch) {
        match patch {
            Patch::CalendarId {
                event_id,
                slot,
                external_id,
            } => {
                let Some(event) = self.collections.events.iter_mut().find(|e| e.id == event_id)
                else {
                    // The remote copy outlived its record.
                    self.effects
                        .push(SideEffect::DeleteCalendarEvent { slot, external_id });
                    self.patch_dropped("calendar_id", event_id);
                    return;
                };
                let displaced = event
                    .external_id(slot)
                    .filter(|current| *current != external_id)
                    .map(str::to_owned);
                event.set_external_id(slot, Some(external_id));
                if let Some(external_id) = displaced {
                    self.effects
                        .push(SideEffect::DeleteCalendarEvent { slot, external_id });
                }
                self.persist::<Event>();
                self.patch_applied("calendar_id", event_id);
            }
            Patch::EventNotification {
                event_id,
                notification_id,
            } => {
                let event = self
                    .collections
                    .events
                    .iter_mut()
                    .find(|e| e.id == event_id)
                    .filter(|e| e.wants_reminder());
                let Some(event) = event else {
                    self.effects.push(SideEffect::CancelEventReminder {
                        id: notification_id,
                    });
                    self.patch_dropped("event_notification", event_id);
                    return;
                };
                let displaced = event
                    .notification_id
                    .replace(notification_id.clone())
                    .filter(|current| *current != notification_id);
                if let Some(id) = displaced {
                    self.effects.push(SideEffect::CancelEventReminder { id });
                }
                self.persist::<Event>();
                self.patch_applied("event_notification", event_id);
            }
            Patch::HabitNotifications { habit_id, ids } => {
                let habit = self
                    .collections
                    .habits
                    .iter_mut()
                    .find(|h| h.id == habit_id)
                    .filter(|h| h.reminder_enabled);
                let Some(habit) = habit else {
                    if !ids.is_empty() {
                        self.effects.push(SideEffect::CancelHabitReminders { ids });
                    }
                    self.patch_dropped("habit_notifications", habit_id);
                    return;
                };
                let displaced: Vec<String> = std::mem::replace(&mut habit.notification_ids, ids)
                    .into_iter()
                    .filter(|id| !habit.notification_ids.contains(id))
                    .collect();
                if !displaced.is_empty() {
                    self.effects
                        .push(SideEffect::CancelHabitReminders { ids: displaced });
                }
                self.persist::<Habit>();
                self.patch_applied("habit_notifications", habit_id);
            }
        }
    }

    fn patch_applied(&self, field: &'static str, id: RecordId) {
        SideEffectStats::bump(&self.stats.patches_applied);
        debug!(target: "daybook", event = "patch_applied", field, id = %id);
    }

    fn patch_dropped(&self, field: &'static str, id: RecordId) {
        SideEffectStats::bump(&self.stats.patches_dropped);
        info!(target: "daybook", event = "patch_dropped", field, id = %id);
    }

    pub(crate) fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .collections
            .events
            .iter()
            .filter(|event| event.occurs_on(date))
            .cloned()
            .collect();
        events.sort_by_key(Event::effective_start);
        events
    }

    pub(crate) fn habits_due_on(&self, date: NaiveDate) -> Vec<Habit> {
        self.collections
            .habits
            .iter()
            .filter(|habit| habit.is_due_on(date))
            .cloned()
            .collect()
    }

    pub(crate) fn habit_streak(&self, id: RecordId) -> Option<u32> {
        let today = self.today();
        self.collections
            .habits
            .iter()
            .find(|habit| habit.id == id)
            .map(|habit| habit.current_streak(today))
    }

    pub(crate) fn journal_on(&self, date: NaiveDate) -> Vec<JournalEntry> {
        self.collections
            .journal
            .iter()
            .filter(|entry| entry.date == date)
            .cloned()
            .collect()
    }

    pub(crate) fn journal_with_tag(&self, tag: &str) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .collections
            .journal
            .iter()
            .filter(|entry| entry.has_tag(tag))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    pub(crate) fn meal_plan_for(&self, date: NaiveDate) -> Option<MealPlan> {
        self.collections
            .meal_plans
            .iter()
            .find(|plan| plan.date == date)
            .cloned()
    }

    pub(crate) fn month_summary(&self, month: MonthKey) -> MonthlySummary {
        summarize_month(month, &self.collections.categories, &self.collections.expenses)
    }

    pub(crate) fn collection_counts(&self) -> BTreeMap<&'static str, usize> {
        let c = &self.collections;
        BTreeMap::from([
            (Event::COLLECTION, c.events.len()),
            (Habit::COLLECTION, c.habits.len()),
            (JournalEntry::COLLECTION, c.journal.len()),
            (BudgetCategory::COLLECTION, c.categories.len()),
            (Expense::COLLECTION, c.expenses.len()),
            (RecurringExpense::COLLECTION, c.recurring.len()),
            (Recipe::COLLECTION, c.recipes.len()),
            (MealPlan::COLLECTION, c.meal_plans.len()),
            (ShoppingItem::COLLECTION, c.shopping.len()),
            (VaultItem::COLLECTION, c.vault.len()),
        ])
    }
}
