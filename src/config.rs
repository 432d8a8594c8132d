use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::recurrence::{BiweeklyInterval, RecurrenceConfig};
use crate::store::{JsonDirStore, SqliteStore, StoreHandle};
use crate::{AppError, AppResult};

pub const FAKE_APPDATA_ENV: &str = "DAYBOOK_FAKE_APPDATA";
pub const STORE_ENV: &str = "DAYBOOK_STORE";
pub const LOG_ENV: &str = "DAYBOOK_LOG";
pub const BIWEEKLY_ENV: &str = "DAYBOOK_BIWEEKLY";

pub const APP_IDENTIFIER: &str = "com.daybook.app";
pub const SQLITE_FILE_NAME: &str = "daybook.sqlite3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StoreBackend::Json),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(AppError::new(
                "CONFIG/INVALID",
                format!("Unknown store backend '{other}'"),
            )
            .with_context("variable", STORE_ENV)),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreBackend::Json => "json",
            StoreBackend::Sqlite => "sqlite",
        })
    }
}

fn parse_biweekly(value: &str) -> AppResult<BiweeklyInterval> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fortnight" | "two_weeks" => Ok(BiweeklyInterval::TwoWeeks),
        "weekly" | "one_week" => Ok(BiweeklyInterval::OneWeek),
        other => Err(AppError::new(
            "CONFIG/INVALID",
            format!("Unknown biweekly interval '{other}'"),
        )
        .with_context("variable", BIWEEKLY_ENV)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaybookConfig {
    pub data_dir: PathBuf,
    pub backend: StoreBackend,
    pub recurrence: RecurrenceConfig,
}

impl DaybookConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let data_dir = match lookup(FAKE_APPDATA_ENV) {
            Some(fake) => PathBuf::from(fake),
            None => default_data_dir()?,
        };
        let backend = lookup(STORE_ENV)
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();
        let biweekly = lookup(BIWEEKLY_ENV)
            .map(|value| parse_biweekly(&value))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            data_dir,
            backend,
            recurrence: RecurrenceConfig { biweekly },
        })
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn open_store(&self) -> AppResult<StoreHandle> {
        debug!(
            target: "daybook",
            event = "store_open",
            backend = %self.backend,
            path = %self.data_dir.display()
        );
        match self.backend {
            StoreBackend::Json => Ok(StoreHandle::new(JsonDirStore::open(&self.data_dir)?)),
            StoreBackend::Sqlite => {
                std::fs::create_dir_all(&self.data_dir).map_err(|err| {
                    AppError::from(err)
                        .with_context("operation", "create_data_dir")
                        .with_context("path", self.data_dir.display().to_string())
                })?;
                let store = SqliteStore::open(&self.data_dir.join(SQLITE_FILE_NAME))?;
                Ok(StoreHandle::new(store))
            }
        }
    }
}

fn default_data_dir() -> AppResult<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| {
            AppError::new(
                "CONFIG/NO_DATA_DIR",
                "Failed to resolve application data directory",
            )
        })?;
    Ok(base.join(APP_IDENTIFIER))
}
