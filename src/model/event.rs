use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{new_id, RecordId};
use crate::calendar::ConnectorSlot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: RecordId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// Minutes before the start at which the local reminder fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    /// Back-link written by the on-device calendar connector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_calendar_id: Option<String>,
    /// Back-link written by the cloud calendar connector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_calendar_id: Option<String>,
}

impl Event {
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            date,
            time: None,
            end_time: None,
            all_day: false,
            notes: None,
            completed: false,
            reminder_minutes: None,
            notification_id: None,
            device_calendar_id: None,
            cloud_calendar_id: None,
        }
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self.all_day = false;
        self
    }

    pub fn with_reminder(mut self, minutes: u32) -> Self {
        self.reminder_minutes = Some(minutes);
        self
    }

    pub fn all_day(mut self) -> Self {
        self.all_day = true;
        self.normalize();
        self
    }

    /// All-day events carry neither a time of day nor a reminder.
    pub fn normalize(&mut self) {
        if self.all_day {
            self.time = None;
            self.end_time = None;
            self.reminder_minutes = None;
        }
    }

    /// Date combined with the time of day, or the start of the day when unset.
    pub fn effective_start(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }

    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        self.date == date
    }

    pub fn wants_reminder(&self) -> bool {
        !self.all_day && !self.completed && self.reminder_minutes.is_some()
    }

    pub fn external_id(&self, slot: ConnectorSlot) -> Option<&str> {
        match slot {
            ConnectorSlot::Device => self.device_calendar_id.as_deref(),
            ConnectorSlot::Cloud => self.cloud_calendar_id.as_deref(),
        }
    }

    pub fn set_external_id(&mut self, slot: ConnectorSlot, external_id: Option<String>) {
        match slot {
            ConnectorSlot::Device => self.device_calendar_id = external_id,
            ConnectorSlot::Cloud => self.cloud_calendar_id = external_id,
        }
    }
}
