use crate::domain::models::{DisplayStatus, TodoRecord};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;

pub const ALL_DISPLAY_STATUSES: [DisplayStatus; 5] = [
    DisplayStatus::Pending,
    DisplayStatus::InProgress,
    DisplayStatus::Completed,
    DisplayStatus::Cancelled,
    DisplayStatus::Overdue,
];

/// List filter over display status and a free-text keyword. The default filter matches
/// everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoFilter {
    statuses: HashSet<DisplayStatus>,
    keyword: String,
}

impl Default for TodoFilter {
    fn default() -> Self {
        Self {
            statuses: ALL_DISPLAY_STATUSES.into_iter().collect(),
            keyword: String::new(),
        }
    }
}

impl TodoFilter {
    /// Builds a filter from the `status` (comma separated) and `q` query values.
    pub fn parse(status: Option<&str>, keyword: Option<&str>) -> Result<Self, String> {
        let mut filter = Self::default().with_keyword(keyword.unwrap_or_default());
        if let Some(raw) = status.map(str::trim).filter(|raw| !raw.is_empty()) {
            let statuses = raw
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| {
                    DisplayStatus::parse(token).ok_or_else(|| format!("unknown status filter '{token}'"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            filter = filter.with_statuses(statuses);
        }
        Ok(filter)
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = DisplayStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into().trim().to_string();
        self
    }

    pub fn includes(&self, status: DisplayStatus) -> bool {
        self.statuses.contains(&status)
    }

    pub fn matches(&self, record: &TodoRecord, tz: Tz, now: DateTime<Utc>) -> bool {
        self.includes(display_status_or_stored(record, tz, now)) && record.matches_keyword(&self.keyword)
    }

    pub fn apply<'a>(
        &self,
        records: &'a [TodoRecord],
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Vec<&'a TodoRecord> {
        records
            .iter()
            .filter(|record| self.matches(record, tz, now))
            .collect()
    }
}

/// Display status, falling back to the stored status when the record's due fields no longer
/// resolve (for example a legacy custom slot with no time).
pub fn display_status_or_stored(record: &TodoRecord, tz: Tz, now: DateTime<Utc>) -> DisplayStatus {
    record
        .display_status(tz, now)
        .unwrap_or_else(|_| record.status.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{TimeSlot, TodoStatus};
    use crate::domain::reminder::default_reminders;

    const TAIPEI: Tz = chrono_tz::Asia::Taipei;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn todo(id: &str, title: &str, due_date: &str, status: TodoStatus) -> TodoRecord {
        TodoRecord {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title} details"),
            due_date: due_date.to_string(),
            time_slot: TimeSlot::Morning,
            custom_time: None,
            location: String::new(),
            status,
            reminders: default_reminders(),
            google_event_id: None,
            created_at: fixed_time("2026-01-01T00:00:00Z"),
            updated_at: fixed_time("2026-01-01T00:00:00Z"),
        }
    }

    fn ids(records: Vec<&TodoRecord>) -> Vec<&str> {
        records.into_iter().map(|record| record.id.as_str()).collect()
    }

    fn sample() -> Vec<TodoRecord> {
        vec![
            todo("a", "Renew passport", "2026-02-01", TodoStatus::Pending),
            todo("b", "Book dentist", "2026-09-01", TodoStatus::InProgress),
            todo("c", "Pay rent", "2026-02-01", TodoStatus::Completed),
            todo("d", "Return parcel", "2026-02-01", TodoStatus::Cancelled),
        ]
    }

    #[test]
    fn default_filter_matches_everything() {
        let records = sample();
        let now = fixed_time("2026-03-01T00:00:00Z");
        assert_eq!(ids(TodoFilter::default().apply(&records, TAIPEI, now)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn overdue_filter_uses_display_status() {
        let records = sample();
        let now = fixed_time("2026-03-01T00:00:00Z");
        let filter = TodoFilter::parse(Some("overdue"), None).expect("parse filter");
        assert_eq!(ids(filter.apply(&records, TAIPEI, now)), vec!["a"]);

        let filter = TodoFilter::parse(Some("pending"), None).expect("parse filter");
        assert!(filter.apply(&records, TAIPEI, now).is_empty());
    }

    #[test]
    fn status_list_and_keyword_combine() {
        let records = sample();
        let now = fixed_time("2026-01-15T00:00:00Z");
        let filter = TodoFilter::parse(Some("pending, in-progress"), Some("  DENTIST ")).expect("parse filter");
        assert_eq!(ids(filter.apply(&records, TAIPEI, now)), vec!["b"]);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(TodoFilter::parse(Some("pending,archived"), None).is_err());
        assert_eq!(TodoFilter::parse(Some(" "), None).expect("blank"), TodoFilter::default());
    }

    #[test]
    fn unresolvable_record_falls_back_to_stored_status() {
        let mut broken = todo("x", "Broken", "2026-01-01", TodoStatus::InProgress);
        broken.time_slot = TimeSlot::Custom;
        let now = fixed_time("2026-06-01T00:00:00Z");
        assert_eq!(display_status_or_stored(&broken, TAIPEI, now), DisplayStatus::InProgress);
    }

    #[test]
    fn builder_helpers_narrow_filter() {
        let records = sample();
        let now = fixed_time("2026-03-01T00:00:00Z");
        let filter = TodoFilter::default()
            .with_statuses([DisplayStatus::Completed, DisplayStatus::Cancelled])
            .with_keyword("r");
        assert_eq!(ids(filter.apply(&records, TAIPEI, now)), vec!["c", "d"]);
    }
}
