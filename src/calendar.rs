//! External calendar connectors.
//!
//! Two independent connectors can be attached: one for the on-device calendar
//! and one for a cloud calendar account. Each owns its own back-link field on
//! [`Event`].

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::model::Event;
use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorSlot {
    Device,
    Cloud,
}

impl ConnectorSlot {
    pub const ALL: [ConnectorSlot; 2] = [ConnectorSlot::Device, ConnectorSlot::Cloud];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorSlot::Device => "device",
            ConnectorSlot::Cloud => "cloud",
        }
    }
}

impl fmt::Display for ConnectorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait CalendarConnector: Send + Sync {
    /// Enabled and authenticated. Checked before every call.
    fn is_available(&self) -> bool;

    /// Creates the event remotely and returns the provider identifier.
    fn create_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, AppResult<String>>;

    fn update_event<'a>(&'a self, event: &'a Event, external_id: &'a str)
        -> BoxFuture<'a, AppResult<()>>;

    fn delete_event<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, AppResult<()>>;
}

/// The connectors attached to an orchestrator, by slot.
#[derive(Clone, Default)]
pub struct CalendarConnectors {
    device: Option<Arc<dyn CalendarConnector>>,
    cloud: Option<Arc<dyn CalendarConnector>>,
}

impl CalendarConnectors {
    pub fn set(&mut self, slot: ConnectorSlot, connector: Arc<dyn CalendarConnector>) {
        match slot {
            ConnectorSlot::Device => self.device = Some(connector),
            ConnectorSlot::Cloud => self.cloud = Some(connector),
        }
    }

    pub fn get(&self, slot: ConnectorSlot) -> Option<Arc<dyn CalendarConnector>> {
        match slot {
            ConnectorSlot::Device => self.device.clone(),
            ConnectorSlot::Cloud => self.cloud.clone(),
        }
    }
}
