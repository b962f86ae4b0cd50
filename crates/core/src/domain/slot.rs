use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::calendar::{weekday_name, AttendeeCalendar, MealType};

/// One plannable meal: a concrete date, a meal type, and the attendees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSlot {
    pub day: String,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub attendees: Vec<String>,
}

/// Expands a confirmed calendar into the ordered slot list: date-major,
/// meal-type-minor (breakfast, lunch, dinner). Days absent from the
/// calendar and meals with nobody attending produce no slots.
pub fn expand_slots(
    calendar: &AttendeeCalendar,
    start_date: NaiveDate,
    days_to_generate: u32,
) -> Vec<MealSlot> {
    let mut slots = Vec::new();

    for offset in 0..days_to_generate {
        let Some(date) = start_date.checked_add_days(Days::new(offset as u64)) else {
            break;
        };
        let day = weekday_name(date.weekday());

        let Some(meals) = calendar.entry_for_date(date) else {
            tracing::debug!(date = %date, day, "no calendar entry for day, skipping");
            continue;
        };

        for meal_type in MealType::ALL {
            let attendees = meals.for_meal(meal_type);
            if attendees.is_empty() {
                continue;
            }
            slots.push(MealSlot {
                day: day.to_string(),
                date,
                meal_type,
                attendees: attendees.to_vec(),
            });
        }
    }

    slots
}
