use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;

use crate::model::attendance::AttendanceStatus;

/// Daily cutoff for on-time arrival, server-local. Arrivals strictly after
/// this instant classify as late; an arrival at 09:00:00 sharp is present.
pub static CUTOFF: Lazy<NaiveTime> = Lazy::new(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap());

pub fn classify_check_in(now: NaiveDateTime) -> AttendanceStatus {
    if now.time() > *CUTOFF {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Half-open bounds `[00:00:00, next day 00:00:00)` of a calendar day.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_hms_opt(0, 0, 0).unwrap();
    let end = day.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap();
    (start, end)
}

/// Weekends carry no attendance requirement and are never synthesized as
/// absences.
pub fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Append `note` to `existing` under a timestamp prefix. Existing content is
/// never overwritten.
pub fn append_note(existing: Option<&str>, stamp: NaiveDateTime, note: &str) -> String {
    let entry = format!("[{}] {}", stamp.format("%Y-%m-%d %H:%M"), note);
    match existing {
        Some(prev) if !prev.is_empty() => format!("{}\n\n{}", prev, entry),
        _ => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn arrival_before_cutoff_is_present() {
        assert_eq!(
            classify_check_in(dt("2024-03-04 08:55:00")),
            AttendanceStatus::Present
        );
    }

    #[test]
    fn arrival_at_cutoff_exactly_is_present() {
        assert_eq!(
            classify_check_in(dt("2024-03-04 09:00:00")),
            AttendanceStatus::Present
        );
    }

    #[test]
    fn arrival_one_second_after_cutoff_is_late() {
        assert_eq!(
            classify_check_in(dt("2024-03-04 09:00:01")),
            AttendanceStatus::Late
        );
    }

    #[test]
    fn day_bounds_are_half_open() {
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(start, dt("2024-03-04 00:00:00"));
        assert_eq!(end, dt("2024-03-05 00:00:00"));
    }

    #[test]
    fn weekend_detection() {
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())); // Monday
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())); // Friday
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())); // Saturday
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())); // Sunday
    }

    #[test]
    fn append_note_preserves_existing_text() {
        let stamp = dt("2024-03-04 17:30:00");
        assert_eq!(
            append_note(None, stamp, "left early"),
            "[2024-03-04 17:30] left early"
        );
        assert_eq!(
            append_note(Some("doctor visit"), stamp, "left early"),
            "doctor visit\n\n[2024-03-04 17:30] left early"
        );
    }
}
