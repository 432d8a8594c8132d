use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{new_id, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Low,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: RecordId,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl JournalEntry {
    pub fn new(date: NaiveDate, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            date,
            mood: None,
            text: text.into(),
            tags: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}
