//! Local-first personal records with best-effort external side effects.
//!
//! The [`Orchestrator`] owns every collection, persists each mutation before
//! replying, and then fans out calendar and reminder work on detached tasks
//! whose results are patched back by record id. Recurring expenses are caught
//! up on start and on demand.

pub mod budget_summary;
pub mod calendar;
pub mod config;
mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod recurrence;
pub mod secrets;
pub mod store;
pub mod time;
pub mod util;

pub use error::{AppError, AppResult};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, SideEffectCounts, Stored};

pub const GIT_HASH: &str = env!("DAYBOOK_GIT_HASH");
