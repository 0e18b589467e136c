use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::ledger::classify::is_weekend;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceTally, DayBucket, DayRow,
};
use crate::model::employee::Employee;

/// Reconstruct the complete day-by-day grid for `employees` over
/// `[start, end]` inclusive.
///
/// Records are indexed by (employee, calendar day) in a single pass; when an
/// employee has several records on one day (multi-site case) the earliest
/// check-in wins. Every weekday gets exactly one row per employee; days
/// without a record synthesize an `absent` row. Weekends emit rows only for
/// days that actually have a record.
pub fn build_grid(
    employees: &[Employee],
    start: NaiveDate,
    end: NaiveDate,
    records: &[AttendanceRecord],
) -> Vec<DayBucket> {
    let mut index: HashMap<(u64, NaiveDate), &AttendanceRecord> = HashMap::new();
    for record in records {
        let key = (record.employee_id, record.check_in_time.date());
        match index.get(&key) {
            Some(existing) if existing.check_in_time <= record.check_in_time => {}
            _ => {
                index.insert(key, record);
            }
        }
    }

    let mut buckets = Vec::new();
    for day in start.iter_days().take_while(|d| *d <= end) {
        let mut rows = Vec::new();
        for employee in employees {
            if let Some(record) = index.get(&(employee.id, day)) {
                rows.push(DayRow {
                    employee_id: employee.id,
                    status: record.status,
                    check_in_time: Some(record.check_in_time),
                    check_out_time: record.check_out_time,
                    work_site_id: record.work_site_id,
                    notes: record.notes.clone(),
                });
            } else if !is_weekend(day) {
                rows.push(DayRow {
                    employee_id: employee.id,
                    status: AttendanceStatus::Absent,
                    check_in_time: None,
                    check_out_time: None,
                    work_site_id: None,
                    notes: None,
                });
            }
        }
        buckets.push(DayBucket { day, rows });
    }
    buckets
}

/// Tally counters over grid rows. `average_hours` covers rows carrying both
/// a check-in and a check-out.
pub fn tally_rows<'a>(rows: impl IntoIterator<Item = &'a DayRow>) -> AttendanceTally {
    let mut tally = AttendanceTally::default();
    let mut worked_seconds: i64 = 0;
    let mut completed: u32 = 0;

    for row in rows {
        tally.total_days += 1;
        match row.status {
            AttendanceStatus::Present => tally.present_days += 1,
            AttendanceStatus::Late => tally.late_days += 1,
            AttendanceStatus::Absent => tally.absent_days += 1,
            AttendanceStatus::Sick => tally.sick_days += 1,
            AttendanceStatus::Vacation => tally.vacation_days += 1,
            AttendanceStatus::BusinessTrip => tally.business_trip_days += 1,
            AttendanceStatus::NoReason => tally.no_reason_days += 1,
        }
        if let (Some(check_in), Some(check_out)) = (row.check_in_time, row.check_out_time) {
            worked_seconds += (check_out - check_in).num_seconds();
            completed += 1;
        }
    }

    if completed > 0 {
        tally.average_hours = worked_seconds as f64 / 3600.0 / completed as f64;
    }
    tally
}

/// Rows belonging to one employee, flattened across buckets.
pub fn employee_rows<'a>(
    buckets: &'a [DayBucket],
    employee_id: u64,
) -> impl Iterator<Item = &'a DayRow> {
    buckets
        .iter()
        .flat_map(|bucket| bucket.rows.iter())
        .filter(move |row| row.employee_id == employee_id)
}
