//! Local notification scheduling boundary.

use futures::future::{self, BoxFuture, FutureExt};

use crate::model::{Event, Habit};
use crate::AppResult;

/// All calls run on detached tasks. Cancelling an unknown or already cancelled
/// identifier is a no-op.
pub trait NotificationScheduler: Send + Sync {
    fn request_permission(&self) -> BoxFuture<'_, bool>;

    fn schedule_habit_reminders<'a>(&'a self, habit: &'a Habit)
        -> BoxFuture<'a, AppResult<Vec<String>>>;

    fn cancel_reminders<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, ()>;

    fn schedule_event_reminder<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, AppResult<String>>;

    fn cancel_event_reminder<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()>;
}

/// Scheduler for headless use: grants nothing and schedules nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationScheduler for NoopNotifier {
    fn request_permission(&self) -> BoxFuture<'_, bool> {
        future::ready(false).boxed()
    }

    fn schedule_habit_reminders<'a>(
        &'a self,
        _habit: &'a Habit,
    ) -> BoxFuture<'a, AppResult<Vec<String>>> {
        future::ready(Ok(Vec::new())).boxed()
    }

    fn cancel_reminders<'a>(&'a self, _ids: &'a [String]) -> BoxFuture<'a, ()> {
        future::ready(()).boxed()
    }

    fn schedule_event_reminder<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, AppResult<String>> {
        future::ready(Err(crate::AppError::new(
            "NOTIFY/UNAVAILABLE",
            "No notification backend configured",
        )
        .with_context("event_id", event.id.to_string())))
        .boxed()
    }

    fn cancel_event_reminder<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, ()> {
        future::ready(()).boxed()
    }
}
