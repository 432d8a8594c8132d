//! Single-owner orchestration of every record collection.
//!
//! One task owns the [`Ledger`]. Callers talk to it through an [`Orchestrator`]
//! handle: each mutation is a command that runs on the owner, persists, replies,
//! and only then hands its queued side effects to detached tasks. Those tasks
//! report back with [`Patch`](effects::Patch) commands over the same channel, so
//! every write stays serialized without a lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::budget_summary::MonthlySummary;
use crate::calendar::{CalendarConnector, CalendarConnectors, ConnectorSlot};
use crate::model::{
    BudgetSetup, Event, Habit, JournalEntry, MealPlan, RecordId, Settings, VaultItem, VaultSecret,
};
use crate::notify::{NoopNotifier, NotificationScheduler};
use crate::recurrence::{CatchUpReport, RecurrenceConfig};
use crate::secrets::{MemorySecretStore, SecretStore};
use crate::store::StoreHandle;
use crate::time::{Clock, MonthKey, SystemClock};
use crate::util::dispatch_with_fence;
use crate::{AppError, AppResult};

mod effects;
mod ledger;
mod stats;

use effects::{Dispatcher, InFlight, Patch};
use ledger::LedgerParts;

pub use ledger::{Ledger, Stored};
pub use stats::{SideEffectCounts, SideEffectStats};

type Job = Box<dyn FnOnce(&mut Ledger) + Send>;

pub(crate) enum Command {
    Run(Job),
    Patch(Patch),
    Shutdown(oneshot::Sender<()>),
}

pub struct OrchestratorBuilder {
    store: StoreHandle,
    notifier: Arc<dyn NotificationScheduler>,
    secrets: Arc<dyn SecretStore>,
    connectors: CalendarConnectors,
    clock: Arc<dyn Clock>,
    recurrence: RecurrenceConfig,
    catch_up_on_start: bool,
}

impl OrchestratorBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn NotificationScheduler>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn calendar(mut self, slot: ConnectorSlot, connector: Arc<dyn CalendarConnector>) -> Self {
        self.connectors.set(slot, connector);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn recurrence(mut self, config: RecurrenceConfig) -> Self {
        self.recurrence = config;
        self
    }

    /// Whether `start` runs the recurring-expense catch-up. On by default.
    pub fn catch_up_on_start(mut self, enabled: bool) -> Self {
        self.catch_up_on_start = enabled;
        self
    }

    /// Loads every collection and spawns the owner task. Must be called from
    /// within a Tokio runtime.
    pub fn start(self) -> Orchestrator {
        let stats = Arc::new(SideEffectStats::default());
        let in_flight = Arc::new(InFlight::default());
        let mut ledger = Ledger::load(LedgerParts {
            store: self.store,
            secrets: self.secrets,
            clock: self.clock,
            recurrence: self.recurrence,
            stats: Arc::clone(&stats),
        });
        if self.catch_up_on_start {
            ledger.run_catch_up();
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            connectors: self.connectors,
            notifier: Arc::clone(&self.notifier),
            stats: Arc::clone(&stats),
            in_flight: Arc::clone(&in_flight),
            patches: commands.downgrade(),
        };
        tokio::spawn(run_owner(ledger, receiver, dispatcher));
        info!(target: "daybook", event = "orchestrator_started");

        Orchestrator {
            commands,
            notifier: self.notifier,
            stats,
            in_flight,
        }
    }
}

async fn run_owner(
    mut ledger: Ledger,
    mut receiver: mpsc::UnboundedReceiver<Command>,
    dispatcher: Dispatcher,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Run(job) => {
                if let Err(err) = dispatch_with_fence(|| job(&mut ledger)) {
                    warn!(
                        target: "daybook",
                        event = "command_panicked",
                        code = %err.code(),
                        error = %err
                    );
                }
            }
            Command::Patch(patch) => ledger.apply_patch(patch),
            Command::Shutdown(done) => {
                let _ = done.send(());
                break;
            }
        }
        for effect in ledger.take_effects() {
            dispatcher.spawn(effect);
        }
    }
    info!(target: "daybook", event = "orchestrator_stopped");
}

/// Cloneable handle to the owner task. The owner stops when the last handle is
/// dropped or [`Orchestrator::shutdown`] is called.
#[derive(Clone)]
pub struct Orchestrator {
    commands: mpsc::UnboundedSender<Command>,
    notifier: Arc<dyn NotificationScheduler>,
    stats: Arc<SideEffectStats>,
    in_flight: Arc<InFlight>,
}

impl Orchestrator {
    pub fn builder(store: StoreHandle) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            notifier: Arc::new(NoopNotifier),
            secrets: Arc::new(MemorySecretStore::default()),
            connectors: CalendarConnectors::default(),
            clock: Arc::new(SystemClock),
            recurrence: RecurrenceConfig::default(),
            catch_up_on_start: true,
        }
    }

    /// Runs `f` on the owner and returns its result once it has finished,
    /// including any persistence it performed.
    async fn call<R, F>(&self, f: F) -> AppResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Ledger) -> R + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |ledger| {
            let _ = reply.send(f(ledger));
        });
        self.commands
            .send(Command::Run(job))
            .map_err(|_| AppError::closed())?;
        response.await.map_err(|_| AppError::closed())
    }

    /// Adds the record. A record whose id is already stored replaces it.
    pub async fn add<T: Stored>(&self, record: T) -> AppResult<()> {
        self.call(move |ledger| ledger.add(record)).await
    }

    /// Replaces the record with the same id; `false` and no write when absent.
    pub async fn update<T: Stored>(&self, record: T) -> AppResult<bool> {
        self.call(move |ledger| ledger.update(record)).await
    }

    /// Releases the record's external resources, then removes and persists.
    pub async fn delete<T: Stored>(&self, id: RecordId) -> AppResult<bool> {
        self.call(move |ledger| ledger.remove::<T>(id)).await
    }

    pub async fn get<T: Stored>(&self, id: RecordId) -> AppResult<Option<T>> {
        self.call(move |ledger| ledger.get::<T>(id)).await
    }

    pub async fn list<T: Stored>(&self) -> AppResult<Vec<T>> {
        self.call(|ledger| ledger.list::<T>()).await
    }

    pub async fn add_vault_item(
        &self,
        item: VaultItem,
        secret: Option<VaultSecret>,
    ) -> AppResult<()> {
        self.call(move |ledger| ledger.add_vault_item(item, secret))
            .await?
    }

    pub async fn update_vault_item(
        &self,
        item: VaultItem,
        secret: Option<VaultSecret>,
    ) -> AppResult<bool> {
        self.call(move |ledger| ledger.update_vault_item(item, secret))
            .await?
    }

    pub async fn vault_secret(&self, id: RecordId) -> AppResult<Option<VaultSecret>> {
        self.call(move |ledger| ledger.vault_secret(id)).await?
    }

    pub async fn toggle_habit_completion(
        &self,
        id: RecordId,
        date: NaiveDate,
    ) -> AppResult<Option<bool>> {
        self.call(move |ledger| ledger.toggle_habit_completion(id, date))
            .await
    }

    pub async fn clear_checked_shopping_items(&self) -> AppResult<usize> {
        self.call(|ledger| ledger.clear_checked_shopping_items())
            .await
    }

    pub async fn settings(&self) -> AppResult<Settings> {
        self.call(|ledger| ledger.settings()).await
    }

    pub async fn update_settings(&self, settings: Settings) -> AppResult<()> {
        self.call(move |ledger| ledger.update_settings(settings))
            .await
    }

    pub async fn budget_setup(&self) -> AppResult<BudgetSetup> {
        self.call(|ledger| ledger.budget_setup()).await
    }

    pub async fn update_budget_setup(&self, setup: BudgetSetup) -> AppResult<()> {
        self.call(move |ledger| ledger.update_budget_setup(setup))
            .await
    }

    /// Events on the clock's today, ascending by start.
    pub async fn events_today(&self) -> AppResult<Vec<Event>> {
        self.call(|ledger| {
            let today = ledger.today();
            ledger.events_on(today)
        })
        .await
    }

    pub async fn events_on(&self, date: NaiveDate) -> AppResult<Vec<Event>> {
        self.call(move |ledger| ledger.events_on(date)).await
    }

    pub async fn habits_due_on(&self, date: NaiveDate) -> AppResult<Vec<Habit>> {
        self.call(move |ledger| ledger.habits_due_on(date)).await
    }

    pub async fn habit_streak(&self, id: RecordId) -> AppResult<Option<u32>> {
        self.call(move |ledger| ledger.habit_streak(id)).await
    }

    pub async fn journal_on(&self, date: NaiveDate) -> AppResult<Vec<JournalEntry>> {
        self.call(move |ledger| ledger.journal_on(date)).await
    }

    pub async fn journal_with_tag(&self, tag: impl Into<String>) -> AppResult<Vec<JournalEntry>> {
        let tag = tag.into();
        self.call(move |ledger| ledger.journal_with_tag(&tag)).await
    }

    pub async fn meal_plan_for(&self, date: NaiveDate) -> AppResult<Option<MealPlan>> {
        self.call(move |ledger| ledger.meal_plan_for(date)).await
    }

    pub async fn month_summary(&self, month: MonthKey) -> AppResult<MonthlySummary> {
        self.call(move |ledger| ledger.month_summary(month)).await
    }

    pub async fn collection_counts(&self) -> AppResult<BTreeMap<&'static str, usize>> {
        self.call(|ledger| ledger.collection_counts()).await
    }

    /// Runs the recurring-expense catch-up against the clock's today.
    pub async fn run_catch_up(&self) -> AppResult<CatchUpReport> {
        self.call(|ledger| ledger.run_catch_up()).await
    }

    /// Report of the most recent catch-up run, including the one at start.
    pub async fn last_catch_up(&self) -> AppResult<Option<CatchUpReport>> {
        self.call(|ledger| ledger.last_catch_up()).await
    }

    pub async fn request_notification_permission(&self) -> bool {
        self.notifier.request_permission().await
    }

    pub fn side_effect_counts(&self) -> SideEffectCounts {
        self.stats.snapshot()
    }

    /// Waits until every detached side effect has finished and its patch, if
    /// any, has been applied. Effects queued by those patches are awaited too.
    pub async fn settle(&self) -> AppResult<()> {
        loop {
            self.in_flight.wait_idle().await;
            self.call(|_| ()).await?;
            if self.in_flight.is_idle() {
                return Ok(());
            }
        }
    }

    /// Stops the owner task. Later calls on any handle fail with
    /// `ORCHESTRATOR/CLOSED`; patches from still-running effects are discarded.
    pub async fn shutdown(&self) -> AppResult<()> {
        let (done, stopped) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(done))
            .map_err(|_| AppError::closed())?;
        stopped.await.map_err(|_| AppError::closed())
    }
}
