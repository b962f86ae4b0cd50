use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};

use nestplan_core::domain::calendar::{weekday_name, AttendeeCalendar, MealAttendees};
use nestplan_core::retry::{retry_with_backoff, RetryPolicy};

use crate::llm::{parse_structured, LlmClient, LlmError};

/// Turns a free-form plan description into a day-keyed attendance map.
pub struct CalendarExtractor {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl CalendarExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn extract(
        &self,
        description: &str,
        start_date: NaiveDate,
        days_to_generate: u32,
    ) -> Result<AttendeeCalendar, LlmError> {
        let prompt = build_prompt(description, start_date, days_to_generate);

        let completion =
            retry_with_backoff(self.retry, "calendar_extraction", || self.llm.complete(&prompt))
                .await?;

        let calendar = parse_calendar(&completion)?;
        Ok(calendar.normalized())
    }
}

fn build_prompt(description: &str, start_date: NaiveDate, days_to_generate: u32) -> String {
    let mut dates = String::new();
    for offset in 0..days_to_generate {
        if let Some(date) = start_date.checked_add_days(Days::new(u64::from(offset))) {
            let _ = writeln!(
                dates,
                "- {} ({})",
                weekday_name(date.weekday()),
                date.format("%Y-%m-%d")
            );
        }
    }

    format!(
        "Extract who is present for each meal from this description of the \
         household's week:\n\n{description}\n\nThe plan covers these days:\n{dates}\n\
         Respond with strict JSON only, in this shape:\n\
         {{\"days\": {{\"2025-06-02\": {{\"breakfast\": [\"alice\"], \"lunch\": [], \
         \"dinner\": [\"alice\", \"bob\"]}}}}}}\n\
         Use ISO dates as keys when the description names specific dates, weekday \
         names otherwise. List attendees by first name. Omit days nobody mentioned."
    )
}

fn parse_calendar(completion: &str) -> Result<AttendeeCalendar, LlmError> {
    // Preferred shape is the wrapped form; some completions return the bare
    // day map instead, which is accepted as-is.
    parse_structured::<AttendeeCalendar>(completion).or_else(|_| {
        parse_structured::<BTreeMap<String, MealAttendees>>(completion)
            .map(|days| AttendeeCalendar { days })
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use nestplan_core::retry::RetryPolicy;
    use nestplan_core::MealType;

    use super::CalendarExtractor;
    use crate::llm::{LlmClient, LlmError};

    struct FixedLlm {
        completion: String,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.completion.clone())
        }
    }

    fn extractor(completion: &str) -> CalendarExtractor {
        CalendarExtractor::new(
            Arc::new(FixedLlm { completion: completion.to_string() }),
            RetryPolicy::none(),
        )
    }

    #[tokio::test]
    async fn extracts_and_normalizes_the_wrapped_shape() {
        let completion = r#"```json
{"days": {"Monday": {"breakfast": [], "lunch": ["Alice "], "dinner": ["Alice", "BOB"]}}}
```"#;
        let calendar = extractor(completion)
            .extract("alice and bob are home monday evening", date("2025-06-02"), 3)
            .await
            .expect("extract");

        let monday = calendar.days.get("Monday").expect("monday entry");
        assert_eq!(monday.for_meal(MealType::Dinner), ["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn accepts_the_bare_day_map() {
        let completion = r#"{"2025-06-02": {"dinner": ["carol"]}}"#;
        let calendar = extractor(completion)
            .extract("carol eats dinner at home", date("2025-06-02"), 1)
            .await
            .expect("extract");

        let entry = calendar.entry_for_date(date("2025-06-02")).expect("entry");
        assert_eq!(entry.for_meal(MealType::Dinner), ["carol".to_string()]);
    }

    #[tokio::test]
    async fn surfaces_unparseable_completions() {
        let result = extractor("Sorry, I had trouble with that.")
            .extract("whatever", date("2025-06-02"), 1)
            .await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }
}
