use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::{new_id, RecordId};

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitFrequency {
    Daily,
    SpecificDays,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    pub frequency: HabitFrequency,
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
    #[serde(default)]
    pub completions: Vec<NaiveDate>,
    #[serde(default)]
    pub reminder_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<NaiveTime>,
    #[serde(default)]
    pub notification_ids: Vec<String>,
}

impl Habit {
    pub fn daily(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            icon: String::new(),
            color: String::new(),
            frequency: HabitFrequency::Daily,
            weekdays: ALL_WEEKDAYS.to_vec(),
            completions: Vec::new(),
            reminder_enabled: false,
            reminder_time: None,
            notification_ids: Vec::new(),
        }
    }

    pub fn on_days(name: impl Into<String>, days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut habit = Self::daily(name);
        habit.frequency = HabitFrequency::SpecificDays;
        habit.weekdays = days.into_iter().collect();
        habit.normalize();
        habit
    }

    pub fn with_reminder(mut self, at: NaiveTime) -> Self {
        self.reminder_enabled = true;
        self.reminder_time = Some(at);
        self
    }

    /// Completion days and weekday sets are kept sorted and free of duplicates.
    /// Daily habits are active on all seven days.
    pub fn normalize(&mut self) {
        self.completions.sort();
        self.completions.dedup();
        if self.frequency == HabitFrequency::Daily {
            self.weekdays = ALL_WEEKDAYS.to_vec();
            return;
        }
        self.weekdays.sort_by_key(|day| day.num_days_from_monday());
        self.weekdays.dedup();
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        match self.frequency {
            HabitFrequency::Daily => true,
            HabitFrequency::SpecificDays => self.weekdays.contains(&date.weekday()),
        }
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completions.contains(&date)
    }

    /// Flips completion for a calendar day. Removing clears every entry for that
    /// day. Returns whether the day is completed afterwards.
    pub fn toggle_completion(&mut self, date: NaiveDate) -> bool {
        if self.is_completed_on(date) {
            self.completions.retain(|day| *day != date);
            false
        } else {
            self.completions.push(date);
            true
        }
    }

    /// Consecutive completed days ending today, or ending yesterday when today
    /// has not been completed yet.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        let mut cursor = if self.is_completed_on(today) {
            Some(today)
        } else {
            today.pred_opt()
        };
        let mut streak = 0;
        while let Some(day) = cursor {
            if !self.is_completed_on(day) {
                break;
            }
            streak += 1;
            cursor = day.pred_opt();
        }
        streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn streak_includes_today_when_completed() {
        let mut habit = Habit::daily("Read");
        habit.completions = vec![d(10), d(9), d(8), d(6)];
        assert_eq!(habit.current_streak(d(10)), 3);
    }

    #[test]
    fn streak_counts_from_yesterday_when_today_open() {
        let mut habit = Habit::daily("Read");
        habit.completions = vec![d(9), d(8), d(6)];
        assert_eq!(habit.current_streak(d(10)), 2);
    }

    #[test]
    fn streak_is_zero_without_recent_completions() {
        let mut habit = Habit::daily("Read");
        habit.completions = vec![d(1)];
        assert_eq!(habit.current_streak(d(10)), 0);
    }

    #[test]
    fn toggle_removes_every_entry_for_the_day() {
        let mut habit = Habit::daily("Stretch");
        habit.completions = vec![d(3), d(3), d(4)];
        assert!(!habit.toggle_completion(d(3)));
        assert_eq!(habit.completions, vec![d(4)]);
        assert!(habit.toggle_completion(d(3)));
        assert!(habit.is_completed_on(d(3)));
    }

    #[test]
    fn daily_normalizes_to_all_weekdays() {
        let mut habit = Habit::on_days("Gym", [Weekday::Mon]);
        habit.frequency = HabitFrequency::Daily;
        habit.normalize();
        assert_eq!(habit.weekdays.len(), 7);
    }

    #[test]
    fn normalize_keeps_each_completion_day_once() {
        let mut habit = Habit::daily("Walk");
        habit.completions = vec![d(5), d(3), d(5), d(3), d(4)];
        habit.normalize();
        assert_eq!(habit.completions, vec![d(3), d(4), d(5)]);
    }

    #[test]
    fn specific_days_filter_due_dates() {
        let habit = Habit::on_days("Gym", [Weekday::Fri, Weekday::Mon, Weekday::Mon]);
        assert_eq!(habit.weekdays, vec![Weekday::Mon, Weekday::Fri]);
        // 2024-05-10 is a Friday, 2024-05-11 a Saturday.
        assert!(habit.is_due_on(d(10)));
        assert!(!habit.is_due_on(d(11)));
    }

    proptest! {
        #[test]
        fn streak_matches_run_length(run in 0u32..40, gap in 2u32..6) {
            let today = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
            let mut habit = Habit::daily("p");
            for offset in 0..run {
                habit.completions.push(today - chrono::Days::new(offset as u64));
            }
            // An older completion separated by a gap never extends the streak.
            habit.completions.push(today - chrono::Days::new((run + gap) as u64));
            prop_assert_eq!(habit.current_streak(today), run);
        }
    }
}
