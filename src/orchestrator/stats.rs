use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters at the side-effect boundary. Failures here are never surfaced to
/// callers, so these are the only record that they happened.
#[derive(Debug, Default)]
pub struct SideEffectStats {
    pub(crate) calendar_attempted: AtomicU64,
    pub(crate) calendar_succeeded: AtomicU64,
    pub(crate) calendar_failed: AtomicU64,
    pub(crate) calendar_skipped_unavailable: AtomicU64,
    pub(crate) reminders_scheduled: AtomicU64,
    pub(crate) reminders_failed: AtomicU64,
    pub(crate) patches_applied: AtomicU64,
    pub(crate) patches_dropped: AtomicU64,
    pub(crate) persist_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideEffectCounts {
    pub calendar_attempted: u64,
    pub calendar_succeeded: u64,
    pub calendar_failed: u64,
    pub calendar_skipped_unavailable: u64,
    pub reminders_scheduled: u64,
    pub reminders_failed: u64,
    pub patches_applied: u64,
    pub patches_dropped: u64,
    pub persist_failures: u64,
}

impl SideEffectStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SideEffectCounts {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        SideEffectCounts {
            calendar_attempted: read(&self.calendar_attempted),
            calendar_succeeded: read(&self.calendar_succeeded),
            calendar_failed: read(&self.calendar_failed),
            calendar_skipped_unavailable: read(&self.calendar_skipped_unavailable),
            reminders_scheduled: read(&self.reminders_scheduled),
            reminders_failed: read(&self.reminders_failed),
            patches_applied: read(&self.patches_applied),
            patches_dropped: read(&self.patches_dropped),
            persist_failures: read(&self.persist_failures),
        }
    }
}
