#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Semaphore;

use daybook_lib::calendar::CalendarConnector;
use daybook_lib::model::{Event, Habit, RecordId};
use daybook_lib::notify::NotificationScheduler;
use daybook_lib::store::SnapshotStore;
use daybook_lib::{AppError, AppResult};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    Create(RecordId),
    Update(RecordId, String),
    Delete(String),
}

/// In-memory calendar that records every call. Creates can be held on a gate
/// until the test releases them.
pub struct RecordingConnector {
    prefix: &'static str,
    available: AtomicBool,
    failing: AtomicBool,
    next: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<ConnectorCall>>,
}

impl RecordingConnector {
    pub fn new(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            next: AtomicUsize::new(1),
            gate: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A connector whose creates wait for `gate` permits.
    pub fn gated(prefix: &'static str) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let connector = Arc::new(Self {
            prefix,
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            next: AtomicUsize::new(1),
            gate: Some(Arc::clone(&gate)),
            calls: Mutex::new(Vec::new()),
        });
        (connector, gate)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ConnectorCall> {
        self.calls.lock().unwrap().clone()
    }

    fn fail_if_requested(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::new("CALENDAR/UNREACHABLE", "connector offline"))
        } else {
            Ok(())
        }
    }
}

impl CalendarConnector for RecordingConnector {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn create_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, AppResult<String>> {
        async move {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.calls.lock().unwrap().push(ConnectorCall::Create(event.id));
            self.fail_if_requested()?;
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}-{n}", self.prefix))
        }
        .boxed()
    }

    fn update_event<'a>(
        &'a self,
        event: &'a Event,
        external_id: &'a str,
    ) -> BoxFuture<'a, AppResult<()>> {
        async move {
            self.calls
                .lock()
                .unwrap()
                .push(ConnectorCall::Update(event.id, external_id.to_string()));
            self.fail_if_requested()
        }
        .boxed()
    }

    fn delete_event<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, AppResult<()>> {
        async move {
            self.calls
                .lock()
                .unwrap()
                .push(ConnectorCall::Delete(external_id.to_string()));
            self.fail_if_requested()
        }
        .boxed()
    }
}

/// Notification scheduler tracking which identifiers are live. Scheduling can
/// be held on a gate like [`RecordingConnector::gated`].
#[derive(Default)]
pub struct RecordingNotifier {
    gate: Option<Arc<Semaphore>>,
    next: AtomicUsize,
    granted: AtomicBool,
    fail_events: AtomicBool,
    active: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let notifier = Arc::new(Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        });
        (notifier, gate)
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub fn fail_event_reminders(&self) {
        self.fail_events.store(true, Ordering::SeqCst);
    }

    pub fn active(&self) -> Vec<String> {
        self.active.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn issue(&self, kind: &str) -> String {
        let id = format!("{kind}-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.active.lock().unwrap().push(id.clone());
        id
    }

    fn cancel(&self, id: &str) {
        self.active.lock().unwrap().retain(|live| live != id);
        self.cancelled.lock().unwrap().push(id.to_string());
    }
}

impl NotificationScheduler for RecordingNotifier {
    fn request_permission(&self) -> BoxFuture<'_, bool> {
        let granted = self.granted.load(Ordering::SeqCst);
        async move { granted }.boxed()
    }

    fn schedule_habit_reminders<'a>(
        &'a self,
        habit: &'a Habit,
    ) -> BoxFuture<'a, AppResult<Vec<String>>> {
        async move {
            self.pass_gate().await;
            Ok(habit
                .weekdays
                .iter()
                .map(|_| self.issue("habit"))
                .collect())
        }
        .boxed()
    }

    fn cancel_reminders<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, ()> {
        async move {
            for id in ids {
                self.cancel(id);
            }
        }
        .boxed()
    }

    fn schedule_event_reminder<'a>(&'a self, _event: &'a Event) -> BoxFuture<'a, AppResult<String>> {
        async move {
            self.pass_gate().await;
            if self.fail_events.load(Ordering::SeqCst) {
                return Err(AppError::new("NOTIFY/DENIED", "permission denied"));
            }
            Ok(self.issue("event"))
        }
        .boxed()
    }

    fn cancel_event_reminder<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()> {
        async move { self.cancel(id) }.boxed()
    }
}

/// Store that reads as empty and rejects every write.
#[derive(Default)]
pub struct FailingStore {
    pub attempts: AtomicUsize,
}

impl SnapshotStore for FailingStore {
    fn load(&self, _collection: &str) -> AppResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn save(&self, collection: &str, _snapshot: &[u8]) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::new("STORE/READ_ONLY", "disk full").with_context("collection", collection))
    }

    fn collections(&self) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }
}
