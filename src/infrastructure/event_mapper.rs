use crate::domain::error::CoreError;
use crate::domain::models::{Reminder, TimeSlot, TodoRecord};
use crate::domain::due_instant::parse_due_date;
use chrono::{Duration, SecondsFormat};
use chrono_tz::Tz;
use std::collections::HashMap;

const KEY_TODO_ID: &str = "todo_id";
const KEY_TIME_SLOT: &str = "todo_time_slot";
/// Google Calendar accepts at most five reminder overrides per event.
pub const MAX_REMINDER_OVERRIDES: usize = 5;
/// Four weeks, the largest lead time Google Calendar accepts.
pub const MAX_REMINDER_MINUTES: u32 = 40_320;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventExtendedProperties {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub private: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CalendarReminderOverride {
    pub method: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventReminders {
    #[serde(rename = "useDefault")]
    pub use_default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<CalendarReminderOverride>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub start: CalendarEventDateTime,
    #[serde(default)]
    pub end: CalendarEventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<CalendarEventReminders>,
    #[serde(rename = "extendedProperties", default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<CalendarEventExtendedProperties>,
}

/// Builds the calendar event for a todo. All-day todos become date events spanning the due
/// date; every other slot starts at the resolved due instant and lasts `duration_minutes`.
pub fn encode_todo_event(
    todo: &TodoRecord,
    tz: Tz,
    duration_minutes: u32,
) -> Result<GoogleCalendarEvent, CoreError> {
    let (start, end) = if todo.time_slot == TimeSlot::AllDay {
        let date = parse_due_date(&todo.due_date).ok_or_else(|| {
            CoreError::InvalidDueDateInput(format!("dueDate '{}' is not YYYY-MM-DD", todo.due_date))
        })?;
        let next_day = date.succ_opt().ok_or_else(|| {
            CoreError::InvalidDueDateInput(format!("dueDate '{}' is out of range", todo.due_date))
        })?;
        (
            CalendarEventDateTime {
                date_time: None,
                date: Some(date.to_string()),
                time_zone: Some(tz.name().to_string()),
            },
            CalendarEventDateTime {
                date_time: None,
                date: Some(next_day.to_string()),
                time_zone: Some(tz.name().to_string()),
            },
        )
    } else {
        let start_at = todo.due_instant(tz)?;
        let end_at = start_at + Duration::minutes(i64::from(duration_minutes.max(1)));
        (
            CalendarEventDateTime {
                date_time: Some(start_at.to_rfc3339_opts(SecondsFormat::Secs, false)),
                date: None,
                time_zone: Some(tz.name().to_string()),
            },
            CalendarEventDateTime {
                date_time: Some(end_at.to_rfc3339_opts(SecondsFormat::Secs, false)),
                date: None,
                time_zone: Some(tz.name().to_string()),
            },
        )
    };

    let mut private = HashMap::new();
    private.insert(KEY_TODO_ID.to_string(), todo.id.clone());
    private.insert(KEY_TIME_SLOT.to_string(), todo.time_slot.as_str().to_string());

    let location = Some(todo.location.trim())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    Ok(GoogleCalendarEvent {
        id: None,
        summary: Some(todo.title.clone()),
        description: Some(todo.description.clone()),
        location,
        status: Some("confirmed".to_string()),
        start,
        end,
        reminders: Some(encode_reminders(&todo.reminders)),
        extended_properties: Some(CalendarEventExtendedProperties { private }),
    })
}

pub fn encode_reminders(reminders: &[Reminder]) -> CalendarEventReminders {
    let mut overrides: Vec<CalendarReminderOverride> = Vec::new();
    for reminder in reminders {
        let candidate = CalendarReminderOverride {
            method: reminder.reminder_type.as_str().to_string(),
            minutes: reminder.minutes.min(MAX_REMINDER_MINUTES),
        };
        if !overrides.contains(&candidate) {
            overrides.push(candidate);
        }
    }
    overrides.truncate(MAX_REMINDER_OVERRIDES);
    CalendarEventReminders {
        use_default: false,
        overrides,
    }
}
