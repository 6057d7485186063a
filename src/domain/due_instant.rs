//! Resolution of a todo's date, time slot and custom time into a concrete due instant.
//!
//! Every layer that needs "when is this due" or "is this overdue" goes through this module:
//! the stored record, list filtering, the pre-submission check and the calendar event builder.

use crate::domain::error::CoreError;
use crate::domain::models::{TimeSlot, TodoStatus};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

const END_OF_DAY: (u32, u32) = (23, 59);
const MORNING_DEADLINE: (u32, u32) = (12, 0);
const AFTERNOON_DEADLINE: (u32, u32) = (18, 0);

/// Wall-clock deadline of a preset slot. `None` (unknown or missing slot) uses the morning row.
/// Custom slots have no preset and return `None`.
pub fn preset_wall_clock(time_slot: Option<TimeSlot>) -> Option<NaiveTime> {
    let (hour, minute) = match time_slot {
        Some(TimeSlot::AllDay) | Some(TimeSlot::Evening) => END_OF_DAY,
        Some(TimeSlot::Morning) | None => MORNING_DEADLINE,
        Some(TimeSlot::Afternoon) => AFTERNOON_DEADLINE,
        Some(TimeSlot::Custom) => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parses `YYYY-MM-DD` exactly: zero padded, no time or offset suffix.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != 4 && *index != 7)
        .all(|(_, byte)| byte.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Parses `HH:MM` (a single-digit hour is tolerated). Any minute 00-59 is accepted here;
/// the ten-minute grid is enforced by input validation, not by resolution.
pub fn parse_wall_clock(value: &str) -> Option<NaiveTime> {
    let (hour, minute) = value.split_once(':')?;
    if hour.is_empty()
        || hour.len() > 2
        || minute.len() != 2
        || !hour.bytes().all(|byte| byte.is_ascii_digit())
        || !minute.bytes().all(|byte| byte.is_ascii_digit())
    {
        return None;
    }
    let hour = hour.parse::<u32>().ok()?;
    let minute = minute.parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Local (timezone-free) due date-time.
pub fn resolve_local_due(
    due_date: &str,
    time_slot: Option<TimeSlot>,
    custom_time: Option<&str>,
) -> Result<NaiveDateTime, CoreError> {
    let date = parse_due_date(due_date).ok_or_else(|| {
        CoreError::InvalidDueDateInput(format!("dueDate '{due_date}' is not YYYY-MM-DD"))
    })?;

    let time = match preset_wall_clock(time_slot) {
        Some(time) => time,
        None => {
            let raw = custom_time.map(str::trim).filter(|value| !value.is_empty()).ok_or_else(|| {
                CoreError::InvalidDueDateInput("customTime is required for custom time slot".to_string())
            })?;
            parse_wall_clock(raw).ok_or_else(|| {
                CoreError::InvalidDueDateInput(format!("customTime '{raw}' is not HH:MM"))
            })?
        }
    };

    Ok(date.and_time(time))
}

/// Resolves the due instant in the operating timezone `tz`.
///
/// A local time skipped by a DST transition is rejected; a repeated local time resolves to the
/// earlier instant.
pub fn resolve_due_instant(
    due_date: &str,
    time_slot: Option<TimeSlot>,
    custom_time: Option<&str>,
    tz: Tz,
) -> Result<DateTime<Tz>, CoreError> {
    let local = resolve_local_due(due_date, time_slot, custom_time)?;
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => Ok(instant),
        LocalResult::Ambiguous(first, second) => Ok(first.min(second)),
        LocalResult::None => Err(CoreError::InvalidDueDateInput(format!(
            "{local} does not exist in timezone {}",
            tz.name()
        ))),
    }
}

/// Strictly-past check against a caller-supplied `now`. Completed and cancelled items are
/// never overdue.
pub fn is_overdue(due_instant: &DateTime<Tz>, status: TodoStatus, now: DateTime<Utc>) -> bool {
    if status.is_closed() {
        return false;
    }
    due_instant.with_timezone(&Utc) < now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    const TAIPEI: Tz = chrono_tz::Asia::Taipei;

    fn utc(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn resolve(slot: Option<TimeSlot>, custom: Option<&str>) -> DateTime<Tz> {
        resolve_due_instant("2026-03-14", slot, custom, TAIPEI).expect("resolve due instant")
    }

    #[test]
    fn preset_slots_follow_resolution_table() {
        assert_eq!(resolve(Some(TimeSlot::AllDay), None).to_rfc3339(), "2026-03-14T23:59:00+08:00");
        assert_eq!(resolve(Some(TimeSlot::Morning), None).to_rfc3339(), "2026-03-14T12:00:00+08:00");
        assert_eq!(resolve(Some(TimeSlot::Afternoon), None).to_rfc3339(), "2026-03-14T18:00:00+08:00");
        assert_eq!(resolve(Some(TimeSlot::Evening), None).to_rfc3339(), "2026-03-14T23:59:00+08:00");
    }

    #[test]
    fn missing_slot_falls_back_to_morning() {
        assert_eq!(resolve(None, Some("08:30")), resolve(Some(TimeSlot::Morning), None));
    }

    #[test]
    fn custom_slot_uses_custom_time_in_operating_timezone() {
        let instant = resolve(Some(TimeSlot::Custom), Some("14:20"));
        assert_eq!(instant.to_rfc3339(), "2026-03-14T14:20:00+08:00");
        assert_eq!(instant.with_timezone(&Utc), utc("2026-03-14T06:20:00Z"));
    }

    #[test]
    fn custom_slot_resolves_off_grid_minutes() {
        let instant = resolve(Some(TimeSlot::Custom), Some("9:07"));
        assert_eq!(instant.hour(), 9);
        assert_eq!(instant.minute(), 7);
    }

    #[test]
    fn custom_slot_without_time_is_invalid_input() {
        let result = resolve_due_instant("2026-03-14", Some(TimeSlot::Custom), None, TAIPEI);
        assert!(matches!(result, Err(CoreError::InvalidDueDateInput(_))));

        let result = resolve_due_instant("2026-03-14", Some(TimeSlot::Custom), Some("25:00"), TAIPEI);
        assert!(matches!(result, Err(CoreError::InvalidDueDateInput(_))));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for raw in ["2026-3-14", "2026/03/14", "2026-03-14T10:00", "2026-02-30", "", "abcd-ef-gh"] {
            let result = resolve_due_instant(raw, Some(TimeSlot::Morning), None, TAIPEI);
            assert!(
                matches!(result, Err(CoreError::InvalidDueDateInput(_))),
                "expected rejection for {raw:?}"
            );
        }
    }

    #[test]
    fn dst_gap_is_rejected_and_overlap_uses_earliest() {
        let new_york = chrono_tz::America::New_York;
        let gap = resolve_due_instant("2026-03-08", Some(TimeSlot::Custom), Some("02:30"), new_york);
        assert!(matches!(gap, Err(CoreError::InvalidDueDateInput(_))));

        let overlap = resolve_due_instant("2026-11-01", Some(TimeSlot::Custom), Some("01:30"), new_york)
            .expect("ambiguous time resolves");
        assert_eq!(overlap.with_timezone(&Utc), utc("2026-11-01T05:30:00Z"));
    }

    #[test]
    fn overdue_uses_strict_inequality() {
        let due = resolve(Some(TimeSlot::Morning), None);
        let at_due = due.with_timezone(&Utc);
        assert!(!is_overdue(&due, TodoStatus::Pending, at_due));
        assert!(is_overdue(&due, TodoStatus::Pending, at_due + chrono::Duration::seconds(1)));
        assert!(is_overdue(&due, TodoStatus::InProgress, at_due + chrono::Duration::minutes(1)));
        assert!(!is_overdue(&due, TodoStatus::Pending, at_due - chrono::Duration::seconds(1)));
    }

    fn arb_date() -> impl Strategy<Value = String> {
        (2000i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(year, month, day)| format!("{year:04}-{month:02}-{day:02}"))
    }

    fn arb_wall_clock() -> impl Strategy<Value = String> {
        (0u32..24, 0u32..60).prop_map(|(hour, minute)| format!("{hour:02}:{minute:02}"))
    }

    proptest! {
        #[test]
        fn all_day_and_evening_end_at_2359_regardless_of_custom_time(
            date in arb_date(),
            custom in prop::option::of(arb_wall_clock()),
            evening in any::<bool>()
        ) {
            let slot = if evening { TimeSlot::Evening } else { TimeSlot::AllDay };
            let instant = resolve_due_instant(&date, Some(slot), custom.as_deref(), TAIPEI)
                .expect("resolve");
            prop_assert_eq!(instant.hour(), 23);
            prop_assert_eq!(instant.minute(), 59);
            prop_assert_eq!(instant.date_naive().to_string(), date);
        }

        #[test]
        fn custom_time_roundtrips_through_resolution(date in arb_date(), custom in arb_wall_clock()) {
            let instant = resolve_due_instant(&date, Some(TimeSlot::Custom), Some(&custom), TAIPEI)
                .expect("resolve");
            prop_assert_eq!(instant.format("%Y-%m-%d %H:%M").to_string(), format!("{date} {custom}"));
        }

        #[test]
        fn closed_statuses_are_never_overdue(
            date in arb_date(),
            margin_minutes in 1i64..5_000_000i64,
            completed in any::<bool>()
        ) {
            let status = if completed { TodoStatus::Completed } else { TodoStatus::Cancelled };
            let due = resolve_due_instant(&date, Some(TimeSlot::Morning), None, TAIPEI).expect("resolve");
            let now = due.with_timezone(&Utc) + chrono::Duration::minutes(margin_minutes);
            prop_assert!(!is_overdue(&due, status, now));
        }

        #[test]
        fn pending_overdue_iff_due_before_now(date in arb_date(), offset_seconds in -100_000i64..100_000i64) {
            let due = resolve_due_instant(&date, Some(TimeSlot::Afternoon), None, TAIPEI).expect("resolve");
            let now = due.with_timezone(&Utc) + chrono::Duration::seconds(offset_seconds);
            prop_assert_eq!(is_overdue(&due, TodoStatus::Pending, now), offset_seconds > 0);
        }
    }
}
