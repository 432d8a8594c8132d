use serde::{Deserialize, Serialize};

use crate::calendar::ConnectorSlot;

/// User preferences consulted by the orchestrator. Calendar sync is opt-in per
/// connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub currency_code: String,
    pub sync_device_calendar: bool,
    pub sync_cloud_calendar: bool,
    pub default_reminder_minutes: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency_code: "USD".to_string(),
            sync_device_calendar: false,
            sync_cloud_calendar: false,
            default_reminder_minutes: None,
        }
    }
}

impl Settings {
    pub fn sync_enabled(&self, slot: ConnectorSlot) -> bool {
        match slot {
            ConnectorSlot::Device => self.sync_device_calendar,
            ConnectorSlot::Cloud => self.sync_cloud_calendar,
        }
    }

    pub fn with_sync(mut self, slot: ConnectorSlot, enabled: bool) -> Self {
        match slot {
            ConnectorSlot::Device => self.sync_device_calendar = enabled,
            ConnectorSlot::Cloud => self.sync_cloud_calendar = enabled,
        }
        self
    }
}
