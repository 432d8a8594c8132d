//! Detached side effects and the patches they send back to the owner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::stats::SideEffectStats;
use super::Command;
use crate::calendar::{CalendarConnector, CalendarConnectors, ConnectorSlot};
use crate::model::{Event, Habit, RecordId};
use crate::notify::NotificationScheduler;
use crate::util::dispatch_async_app_result;
use crate::AppResult;

/// Work queued by a mutation and started only after the mutation has replied.
#[derive(Debug, Clone)]
pub(crate) enum SideEffect {
    /// Create when the event has no back-link for `slot`, update otherwise.
    SyncEvent { event: Event, slot: ConnectorSlot },
    DeleteCalendarEvent {
        slot: ConnectorSlot,
        external_id: String,
    },
    ScheduleEventReminder {
        event: Event,
        cancel: Option<String>,
    },
    CancelEventReminder { id: String },
    ScheduleHabitReminders { habit: Habit, cancel: Vec<String> },
    CancelHabitReminders { ids: Vec<String> },
}

impl SideEffect {
    fn name(&self) -> &'static str {
        match self {
            SideEffect::SyncEvent { .. } => "sync_event",
            SideEffect::DeleteCalendarEvent { .. } => "delete_calendar_event",
            SideEffect::ScheduleEventReminder { .. } => "schedule_event_reminder",
            SideEffect::CancelEventReminder { .. } => "cancel_event_reminder",
            SideEffect::ScheduleHabitReminders { .. } => "schedule_habit_reminders",
            SideEffect::CancelHabitReminders { .. } => "cancel_habit_reminders",
        }
    }

    fn touches_calendar(&self) -> bool {
        matches!(
            self,
            SideEffect::SyncEvent { .. } | SideEffect::DeleteCalendarEvent { .. }
        )
    }

    fn schedules_reminder(&self) -> bool {
        matches!(
            self,
            SideEffect::ScheduleEventReminder { .. } | SideEffect::ScheduleHabitReminders { .. }
        )
    }
}

/// A single-field write produced by a completed side effect. Applied by the
/// owner after re-locating the record by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Patch {
    CalendarId {
        event_id: RecordId,
        slot: ConnectorSlot,
        external_id: String,
    },
    EventNotification {
        event_id: RecordId,
        notification_id: String,
    },
    HabitNotifications {
        habit_id: RecordId,
        ids: Vec<String>,
    },
}

enum Outcome {
    Done(Option<Patch>),
    Skipped,
}

/// Counts detached tasks that have not yet delivered their patch.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

pub(crate) struct InFlightGuard(Arc<InFlight>);

impl InFlight {
    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.count.load(Ordering::SeqCst) == 0
    }

    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub(crate) struct Dispatcher {
    pub(crate) connectors: CalendarConnectors,
    pub(crate) notifier: Arc<dyn NotificationScheduler>,
    pub(crate) stats: Arc<SideEffectStats>,
    pub(crate) in_flight: Arc<InFlight>,
    pub(crate) patches: mpsc::WeakUnboundedSender<Command>,
}

impl Dispatcher {
    pub(crate) fn spawn(&self, effect: SideEffect) {
        let guard = self.in_flight.enter();
        let this = self.clone();
        tokio::spawn(async move {
            let result = dispatch_async_app_result(|| this.execute(&effect)).await;
            match result {
                Ok(Outcome::Done(patch)) => {
                    if effect.touches_calendar() {
                        SideEffectStats::bump(&this.stats.calendar_succeeded);
                    } else if effect.schedules_reminder() {
                        SideEffectStats::bump(&this.stats.reminders_scheduled);
                    }
                    if let Some(patch) = patch {
                        this.send_patch(patch);
                    }
                }
                Ok(Outcome::Skipped) => {
                    SideEffectStats::bump(&this.stats.calendar_skipped_unavailable);
                    debug!(
                        target: "daybook",
                        event = "calendar_unavailable",
                        effect = effect.name()
                    );
                }
                Err(err) => {
                    if effect.touches_calendar() {
                        SideEffectStats::bump(&this.stats.calendar_failed);
                    } else if effect.schedules_reminder() {
                        SideEffectStats::bump(&this.stats.reminders_failed);
                    }
                    warn!(
                        target: "daybook",
                        event = "side_effect_failed",
                        effect = effect.name(),
                        code = %err.code(),
                        error = %err
                    );
                }
            }
            // Released only after the patch is queued so settle() sees it.
            drop(guard);
        });
    }

    fn connector(&self, slot: ConnectorSlot) -> Option<Arc<dyn CalendarConnector>> {
        self.connectors
            .get(slot)
            .filter(|connector| connector.is_available())
    }

    async fn execute(&self, effect: &SideEffect) -> AppResult<Outcome> {
        match effect {
            SideEffect::SyncEvent { event, slot } => {
                let Some(connector) = self.connector(*slot) else {
                    return Ok(Outcome::Skipped);
                };
                SideEffectStats::bump(&self.stats.calendar_attempted);
                match event.external_id(*slot) {
                    Some(external_id) => {
                        connector.update_event(event, external_id).await?;
                        Ok(Outcome::Done(None))
                    }
                    None => {
                        let external_id = connector.create_event(event).await?;
                        Ok(Outcome::Done(Some(Patch::CalendarId {
                            event_id: event.id,
                            slot: *slot,
                            external_id,
                        })))
                    }
                }
            }
            SideEffect::DeleteCalendarEvent { slot, external_id } => {
                let Some(connector) = self.connector(*slot) else {
                    return Ok(Outcome::Skipped);
                };
                SideEffectStats::bump(&self.stats.calendar_attempted);
                connector.delete_event(external_id).await?;
                Ok(Outcome::Done(None))
            }
            SideEffect::ScheduleEventReminder { event, cancel } => {
                if let Some(stale) = cancel {
                    self.notifier.cancel_event_reminder(stale).await;
                }
                let notification_id = self.notifier.schedule_event_reminder(event).await?;
                Ok(Outcome::Done(Some(Patch::EventNotification {
                    event_id: event.id,
                    notification_id,
                })))
            }
            SideEffect::CancelEventReminder { id } => {
                self.notifier.cancel_event_reminder(id).await;
                Ok(Outcome::Done(None))
            }
            SideEffect::ScheduleHabitReminders { habit, cancel } => {
                if !cancel.is_empty() {
                    self.notifier.cancel_reminders(cancel).await;
                }
                let ids = self.notifier.schedule_habit_reminders(habit).await?;
                Ok(Outcome::Done(Some(Patch::HabitNotifications {
                    habit_id: habit.id,
                    ids,
                })))
            }
            SideEffect::CancelHabitReminders { ids } => {
                self.notifier.cancel_reminders(ids).await;
                Ok(Outcome::Done(None))
            }
        }
    }

    fn send_patch(&self, patch: Patch) {
        let delivered = self
            .patches
            .upgrade()
            .map(|sender| sender.send(Command::Patch(patch)).is_ok())
            .unwrap_or(false);
        if !delivered {
            SideEffectStats::bump(&self.stats.patches_dropped);
            debug!(target: "daybook", event = "patch_discarded", reason = "owner_stopped");
        }
    }
}
