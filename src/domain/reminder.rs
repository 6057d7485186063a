use crate::domain::error::CoreError;
use crate::domain::models::{Reminder, ReminderType, ReminderUnit};
use serde::{Deserialize, Serialize};

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_DAY: u32 = 1440;
const DEFAULT_REMINDER_MINUTES: u32 = 10;

/// Reminder as it arrives at the boundary: either the structured form or the legacy
/// minutes-only form of older records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderInput {
    Structured {
        reminder_type: ReminderType,
        value: i64,
        unit: ReminderUnit,
    },
    LegacyMinutes {
        reminder_type: ReminderType,
        minutes: i64,
    },
}

impl ReminderInput {
    /// Picks the representation from loose fields. `value` wins over `minutes` when both are
    /// present; a `value` without `unit` counts minutes.
    pub fn from_fields(
        reminder_type: Option<ReminderType>,
        value: Option<i64>,
        unit: Option<ReminderUnit>,
        minutes: Option<i64>,
    ) -> Result<Self, CoreError> {
        let reminder_type = reminder_type.unwrap_or_default();
        match (value, minutes) {
            (Some(value), _) => Ok(Self::Structured {
                reminder_type,
                value,
                unit: unit.unwrap_or_default(),
            }),
            (None, Some(minutes)) => Ok(Self::LegacyMinutes {
                reminder_type,
                minutes,
            }),
            (None, None) => Err(CoreError::InvalidReminderInput(
                "reminder needs value/unit or minutes".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "en")]
    En,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zh-tw" | "zh_tw" | "zh" => Some(Self::ZhTw),
            "en" | "en-us" | "en_us" => Some(Self::En),
            _ => None,
        }
    }
}

pub fn unit_to_minutes(unit: ReminderUnit) -> u32 {
    unit.to_minutes()
}

pub fn normalize_reminder(input: ReminderInput) -> Result<Reminder, CoreError> {
    match input {
        ReminderInput::Structured {
            reminder_type,
            value,
            unit,
        } => {
            if value <= 0 {
                return Err(CoreError::InvalidReminderInput(format!(
                    "reminder value must be positive, got {value}"
                )));
            }
            let value = u32::try_from(value).map_err(|_| {
                CoreError::InvalidReminderInput(format!("reminder value {value} is too large"))
            })?;
            let minutes = value.checked_mul(unit_to_minutes(unit)).ok_or_else(|| {
                CoreError::InvalidReminderInput(format!("reminder lead time {value} is too large"))
            })?;
            Ok(Reminder {
                reminder_type,
                value: Some(value),
                unit: Some(unit),
                minutes,
            })
        }
        ReminderInput::LegacyMinutes {
            reminder_type,
            minutes,
        } => {
            if minutes < 0 {
                return Err(CoreError::InvalidReminderInput(format!(
                    "reminder minutes must not be negative, got {minutes}"
                )));
            }
            let minutes = u32::try_from(minutes).map_err(|_| {
                CoreError::InvalidReminderInput(format!("reminder minutes {minutes} is too large"))
            })?;
            Ok(Reminder {
                reminder_type,
                value: None,
                unit: None,
                minutes,
            })
        }
    }
}

/// Recomputes the cached `minutes` of a stored reminder from `value`/`unit` when present.
pub fn renormalize(reminder: &Reminder) -> Result<Reminder, CoreError> {
    let input = match (reminder.value, reminder.unit) {
        (Some(value), unit) => ReminderInput::Structured {
            reminder_type: reminder.reminder_type,
            value: i64::from(value),
            unit: unit.unwrap_or_default(),
        },
        (None, _) => ReminderInput::LegacyMinutes {
            reminder_type: reminder.reminder_type,
            minutes: i64::from(reminder.minutes),
        },
    };
    normalize_reminder(input)
}

pub fn default_reminder() -> Reminder {
    Reminder {
        reminder_type: ReminderType::Popup,
        value: Some(DEFAULT_REMINDER_MINUTES),
        unit: Some(ReminderUnit::Minutes),
        minutes: DEFAULT_REMINDER_MINUTES,
    }
}

pub fn default_reminders() -> Vec<Reminder> {
    vec![default_reminder()]
}

pub fn describe_reminder(reminder: &Reminder, locale: Locale) -> String {
    if let (Some(value), Some(unit)) = (reminder.value, reminder.unit) {
        return before(locale, &quantity(locale, value, unit));
    }

    let minutes = reminder.minutes;
    let text = if minutes < MINUTES_PER_HOUR {
        quantity(locale, minutes, ReminderUnit::Minutes)
    } else if minutes < MINUTES_PER_DAY {
        let hours = quantity(locale, minutes / MINUTES_PER_HOUR, ReminderUnit::Hours);
        match minutes % MINUTES_PER_HOUR {
            0 => hours,
            leftover => join(locale, &hours, &quantity(locale, leftover, ReminderUnit::Minutes)),
        }
    } else {
        quantity(locale, minutes / MINUTES_PER_DAY, ReminderUnit::Days)
    };
    before(locale, &text)
}

pub fn describe_reminders(reminders: &[Reminder], locale: Locale) -> String {
    if reminders.is_empty() {
        return match locale {
            Locale::ZhTw => "無提醒".to_string(),
            Locale::En => "No reminders".to_string(),
        };
    }
    reminders
        .iter()
        .map(|reminder| describe_reminder(reminder, locale))
        .collect::<Vec<_>>()
        .join(", ")
}

fn quantity(locale: Locale, count: u32, unit: ReminderUnit) -> String {
    match locale {
        Locale::ZhTw => {
            let label = match unit {
                ReminderUnit::Minutes => "分鐘",
                ReminderUnit::Hours => "小時",
                ReminderUnit::Days => "天",
            };
            format!("{count}{label}")
        }
        Locale::En => {
            let label = match (unit, count == 1) {
                (ReminderUnit::Minutes, true) => "minute",
                (ReminderUnit::Minutes, false) => "minutes",
                (ReminderUnit::Hours, true) => "hour",
                (ReminderUnit::Hours, false) => "hours",
                (ReminderUnit::Days, true) => "day",
                (ReminderUnit::Days, false) => "days",
            };
            format!("{count} {label}")
        }
    }
}

fn join(locale: Locale, left: &str, right: &str) -> String {
    match locale {
        Locale::ZhTw => format!("{left}{right}"),
        Locale::En => format!("{left} {right}"),
    }
}

fn before(locale: Locale, text: &str) -> String {
    match locale {
        Locale::ZhTw => format!("{text}前"),
        Locale::En => format!("{text} before"),
    }
}
