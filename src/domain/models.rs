use crate::domain::due_instant::{is_overdue, parse_due_date, parse_wall_clock, resolve_due_instant};
use crate::domain::error::CoreError;
use crate::domain::reminder::default_reminders;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSlot {
    AllDay,
    Morning,
    Afternoon,
    Evening,
    Custom,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 5] = [
        TimeSlot::AllDay,
        TimeSlot::Morning,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
        TimeSlot::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllDay => "all-day",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str().eq_ignore_ascii_case(value))
    }

    /// Unknown or missing values yield `None`, which the resolver treats as morning.
    pub fn parse_lenient(value: Option<&str>) -> Option<Self> {
        value.and_then(Self::parse)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" | "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Closed records are never reported as overdue.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Stored status merged with the derived overdue view, as shown in list badges and filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Overdue,
}

impl DisplayStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overdue" => Some(Self::Overdue),
            other => TodoStatus::parse(other).map(Self::from),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Pending => TodoStatus::Pending.as_str(),
            Self::InProgress => TodoStatus::InProgress.as_str(),
            Self::Completed => TodoStatus::Completed.as_str(),
            Self::Cancelled => TodoStatus::Cancelled.as_str(),
        }
    }
}

impl From<TodoStatus> for DisplayStatus {
    fn from(status: TodoStatus) -> Self {
        match status {
            TodoStatus::Pending => Self::Pending,
            TodoStatus::InProgress => Self::InProgress,
            TodoStatus::Completed => Self::Completed,
            TodoStatus::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    #[default]
    Popup,
    Email,
}

impl ReminderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Popup => "popup",
            Self::Email => "email",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderUnit {
    #[default]
    Minutes,
    Hours,
    Days,
}

impl ReminderUnit {
    pub fn to_minutes(self) -> u32 {
        match self {
            Self::Minutes => 1,
            Self::Hours => 60,
            Self::Days => 1440,
        }
    }
}

/// Canonical reminder. `minutes` is a denormalized cache of `value * unit`; records written
/// before `value`/`unit` existed carry only `minutes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    #[serde(rename = "type", default)]
    pub reminder_type: ReminderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<ReminderUnit>,
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    #[serde(default = "fallback_time_slot", deserialize_with = "deserialize_stored_time_slot")]
    pub time_slot: TimeSlot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_time: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default = "default_reminders")]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub google_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored slots missing or outside the enumeration read as morning, the resolver's fallback row.
fn fallback_time_slot() -> TimeSlot {
    TimeSlot::Morning
}

fn deserialize_stored_time_slot<'de, D>(deserializer: D) -> Result<TimeSlot, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(TimeSlot::parse_lenient(raw.as_deref()).unwrap_or_else(fallback_time_slot))
}

impl TodoRecord {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "todo.id")?;
        validate_non_empty(&self.title, "todo.title")?;
        validate_non_empty(&self.description, "todo.description")?;
        validate_date(&self.due_date, "todo.dueDate")?;
        if self.time_slot == TimeSlot::Custom {
            let custom_time = self
                .custom_time
                .as_deref()
                .ok_or_else(|| "todo.customTime is required for custom time slot".to_string())?;
            validate_custom_time(custom_time, "todo.customTime")?;
        }
        if self.reminders.is_empty() {
            return Err("todo.reminders must not be empty".to_string());
        }
        Ok(())
    }

    pub fn due_instant(&self, tz: Tz) -> Result<DateTime<Tz>, CoreError> {
        resolve_due_instant(
            &self.due_date,
            Some(self.time_slot),
            self.custom_time.as_deref(),
            tz,
        )
    }

    pub fn is_overdue(&self, tz: Tz, now: DateTime<Utc>) -> Result<bool, CoreError> {
        Ok(is_overdue(&self.due_instant(tz)?, self.status, now))
    }

    pub fn display_status(&self, tz: Tz, now: DateTime<Utc>) -> Result<DisplayStatus, CoreError> {
        if self.status == TodoStatus::Cancelled {
            return Ok(DisplayStatus::Cancelled);
        }
        if self.is_overdue(tz, now)? {
            return Ok(DisplayStatus::Overdue);
        }
        Ok(self.status.into())
    }

    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return true;
        }
        [&self.title, &self.description, &self.location]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&keyword))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    parse_due_date(value).ok_or_else(|| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

/// Custom due times are picked on a ten-minute grid.
pub fn validate_custom_time(value: &str, field_name: &str) -> Result<(), String> {
    let time = parse_wall_clock(value).ok_or_else(|| format!("{field_name} must be HH:MM"))?;
    if time.minute() % 10 != 0 {
        return Err(format!("{field_name} minutes must be a multiple of 10"));
    }
    Ok(())
}
