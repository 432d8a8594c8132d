use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{new_id, RecordId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            ingredients: Vec::new(),
            steps: Vec::new(),
            prep_minutes: None,
            servings: None,
            tags: Vec::new(),
            favorite: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

/// Recipes planned for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealPlan {
    pub id: RecordId,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakfast: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dinner: Option<RecordId>,
}

impl MealPlan {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: new_id(),
            date,
            breakfast: None,
            lunch: None,
            dinner: None,
        }
    }

    pub fn slot(&self, slot: MealSlot) -> Option<RecordId> {
        match slot {
            MealSlot::Breakfast => self.breakfast,
            MealSlot::Lunch => self.lunch,
            MealSlot::Dinner => self.dinner,
        }
    }

    pub fn set_slot(&mut self, slot: MealSlot, recipe: Option<RecordId>) {
        match slot {
            MealSlot::Breakfast => self.breakfast = recipe,
            MealSlot::Lunch => self.lunch = recipe,
            MealSlot::Dinner => self.dinner = recipe,
        }
    }

    /// Empties every slot pointing at `recipe`. Returns whether anything changed.
    pub fn forget_recipe(&mut self, recipe: RecordId) -> bool {
        let mut changed = false;
        for slot in [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner] {
            if self.slot(slot) == Some(recipe) {
                self.set_slot(slot, None);
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<RecordId>,
}

impl ShoppingItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            quantity: None,
            checked: false,
            recipe_id: None,
        }
    }
}
