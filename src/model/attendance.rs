use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Daily classification of an attendance record.
///
/// `Present`/`Late` are assigned by the check-in classifier, `Absent` only
/// ever appears on synthesized calendar rows, the rest are administrative
/// absence reasons.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Sick,
    Vacation,
    BusinessTrip,
    NoReason,
}

/// The subset of statuses an administrative override may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbsenceReason {
    Sick,
    Vacation,
    BusinessTrip,
    NoReason,
}

impl From<AbsenceReason> for AttendanceStatus {
    fn from(reason: AbsenceReason) -> Self {
        match reason {
            AbsenceReason::Sick => AttendanceStatus::Sick,
            AbsenceReason::Vacation => AttendanceStatus::Vacation,
            AbsenceReason::BusinessTrip => AttendanceStatus::BusinessTrip,
            AbsenceReason::NoReason => AttendanceStatus::NoReason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_id": 1000,
        "work_site_id": 3,
        "check_in_time": "2024-03-04T08:55:00",
        "check_out_time": "2024-03-04T17:30:00",
        "status": "present",
        "notes": null,
        "ip_address": "10.0.0.7",
        "user_agent": "Mozilla/5.0"
    })
)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1000)]
    pub employee_id: u64,

    /// Null for pure absence-reason records with no physical check-in.
    #[schema(example = 3, nullable = true)]
    pub work_site_id: Option<u64>,

    #[schema(example = "2024-03-04T08:55:00", value_type = String, format = "date-time")]
    pub check_in_time: NaiveDateTime,

    #[schema(example = "2024-03-04T17:30:00", value_type = String, format = "date-time", nullable = true)]
    pub check_out_time: Option<NaiveDateTime>,

    #[schema(example = "present")]
    pub status: AttendanceStatus,

    pub notes: Option<String>,

    pub ip_address: Option<String>,

    pub user_agent: Option<String>,
}

/// Origin metadata recorded with self-service check-ins. Administrative
/// entries leave both fields empty.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One cell of the calendar grid: an employee's classified day. Synthesized
/// absence rows carry null times, site and notes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayRow {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "absent")]
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<NaiveDateTime>,
    pub work_site_id: Option<u64>,
    pub notes: Option<String>,
}

/// One calendar day of the reconstructed grid, rows in employee directory
/// order. Weekend buckets hold rows only for days with a real record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayBucket {
    #[schema(example = "2024-03-04", value_type = String, format = "date")]
    pub day: NaiveDate,
    pub rows: Vec<DayRow>,
}

/// Per-employee counters derived from grid rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceTally {
    #[schema(example = 21)]
    pub total_days: u32,
    #[schema(example = 17)]
    pub present_days: u32,
    #[schema(example = 2)]
    pub late_days: u32,
    #[schema(example = 1)]
    pub absent_days: u32,
    #[schema(example = 1)]
    pub sick_days: u32,
    pub vacation_days: u32,
    pub business_trip_days: u32,
    pub no_reason_days: u32,
    /// Mean worked hours across rows that have both a check-in and a
    /// check-out; 0.0 when no row is complete.
    #[schema(example = 8.2)]
    pub average_hours: f64,
}
