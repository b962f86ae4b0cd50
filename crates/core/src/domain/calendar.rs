use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    /// Canonical slot order within a day.
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl std::str::FromStr for MealType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(format!("unknown meal type `{other}`")),
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendee names for each meal of a single day.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealAttendees {
    #[serde(default)]
    pub breakfast: Vec<String>,
    #[serde(default)]
    pub lunch: Vec<String>,
    #[serde(default)]
    pub dinner: Vec<String>,
}

impl MealAttendees {
    pub fn for_meal(&self, meal_type: MealType) -> &[String] {
        match meal_type {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    fn normalized(self) -> Self {
        Self {
            breakfast: normalize_names(self.breakfast),
            lunch: normalize_names(self.lunch),
            dinner: normalize_names(self.dinner),
        }
    }
}

fn normalize_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Day-keyed attendance map. Keys may be ISO dates (`2025-06-02`) or
/// weekday names (`Monday`); both forms are accepted and resolved per key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeCalendar {
    pub days: BTreeMap<String, MealAttendees>,
}

impl AttendeeCalendar {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Case-folds every attendee name to lowercase.
    pub fn normalized(self) -> Self {
        let days = self.days.into_iter().map(|(day, meals)| (day, meals.normalized())).collect();
        Self { days }
    }

    /// Resolves the attendance entry for a concrete date. An ISO date key
    /// wins over a weekday-name key when both are present.
    pub fn entry_for_date(&self, date: NaiveDate) -> Option<&MealAttendees> {
        let iso = date.format("%Y-%m-%d").to_string();
        if let Some(meals) = self.days.get(&iso) {
            return Some(meals);
        }

        self.days
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(weekday_name(date.weekday())))
            .map(|(_, meals)| meals)
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
