use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::info;

use crate::model::attendance::{
    AbsenceReason, AttendanceRecord, AttendanceTally, ClientMeta, DayBucket,
};
use crate::model::employee::Employee;
use crate::model::work_site::WorkSite;

pub mod calendar;
pub mod classify;
pub mod clock;
#[cfg(test)]
pub mod memory;
pub mod store;

use clock::Clock;
use store::{AttendanceStore, EmployeeDirectory, NewAttendanceRecord, SiteRegistry};

/// Failures of the attendance lifecycle. All variants except `Storage` are
/// recoverable and reported to the caller as-is.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unknown or inactive site token")]
    InvalidSite,
    #[error("already checked in today at this site")]
    DuplicateCheckIn,
    #[error("no open check-in to close")]
    NoOpenCheckIn,
    #[error("check-out time precedes check-in time")]
    InvalidCheckOut,
    #[error("unknown employee {0}")]
    EmployeeNotFound(u64),
    #[error("start day is after end day")]
    InvalidRange,
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

/// The attendance core: lifecycle operations over the ledger plus calendar
/// reconstruction. Collaborators are injected so the whole engine runs
/// against in-memory doubles in tests and SQL in production.
pub struct Ledger {
    sites: Arc<dyn SiteRegistry>,
    directory: Arc<dyn EmployeeDirectory>,
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(
        sites: Arc<dyn SiteRegistry>,
        directory: Arc<dyn EmployeeDirectory>,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sites,
            directory,
            store,
            clock,
        }
    }

    /// Record an arrival at the site identified by `token`.
    ///
    /// One check-in per employee per site per calendar day; the probe here
    /// gives the common case a friendly answer, the store's uniqueness
    /// constraint settles concurrent races.
    pub async fn check_in(
        &self,
        employee_id: u64,
        token: &str,
        meta: ClientMeta,
    ) -> Result<(AttendanceRecord, WorkSite), LedgerError> {
        let site = self
            .sites
            .resolve_token(token)
            .await?
            .ok_or(LedgerError::InvalidSite)?;

        let now = self.clock.now();
        if self
            .store
            .find_for_site_day(employee_id, site.id, now.date())
            .await?
            .is_some()
        {
            return Err(LedgerError::DuplicateCheckIn);
        }

        let status = classify::classify_check_in(now);
        let record = self
            .store
            .insert(NewAttendanceRecord {
                employee_id,
                work_site_id: Some(site.id),
                check_in_time: now,
                status,
                notes: None,
                meta,
            })
            .await?;

        info!(
            employee_id,
            work_site_id = site.id,
            status = %status,
            "Checked in"
        );
        Ok((record, site))
    }

    /// Close the employee's most recent open record.
    ///
    /// `time` defaults to the current instant and may not precede the
    /// check-in. Notes are appended under a timestamp, never overwritten.
    pub async fn check_out(
        &self,
        employee_id: u64,
        time: Option<NaiveDateTime>,
        notes: Option<&str>,
    ) -> Result<AttendanceRecord, LedgerError> {
        let open = self
            .store
            .latest_open(employee_id)
            .await?
            .ok_or(LedgerError::NoOpenCheckIn)?;

        let now = self.clock.now();
        let check_out_time = time.unwrap_or(now);
        if check_out_time < open.check_in_time {
            return Err(LedgerError::InvalidCheckOut);
        }

        let notes = notes.map(|n| classify::append_note(open.notes.as_deref(), now, n));
        let record = self.store.close(open.id, check_out_time, notes).await?;

        info!(employee_id, record_id = record.id, "Checked out");
        Ok(record)
    }

    /// Administrative override: classify a day as sick/vacation/business
    /// trip/no reason. Overwrites the day's earliest record in place, or
    /// creates a placeholder with no site when the day has none.
    pub async fn set_absence_reason(
        &self,
        employee_id: u64,
        day: NaiveDate,
        reason: AbsenceReason,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError> {
        if self.directory.find(employee_id).await?.is_none() {
            return Err(LedgerError::EmployeeNotFound(employee_id));
        }

        let record = match self.store.earliest_for_day(employee_id, day).await? {
            Some(existing) => {
                self.store
                    .override_status(existing.id, reason.into(), notes)
                    .await?
            }
            None => {
                let (day_start, _) = classify::day_bounds(day);
                self.store
                    .insert(NewAttendanceRecord {
                        employee_id,
                        work_site_id: None,
                        check_in_time: day_start,
                        status: reason.into(),
                        notes,
                        meta: ClientMeta::default(),
                    })
                    .await?
            }
        };

        info!(employee_id, %day, reason = %reason, "Absence reason set");
        Ok(record)
    }

    /// The employee's open record for the current calendar day, if any.
    pub async fn current_open(
        &self,
        employee_id: u64,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        let today = self.clock.now().date();
        Ok(self
            .store
            .latest_open(employee_id)
            .await?
            .filter(|r| r.check_in_time.date() == today))
    }

    /// The tracked population in directory order (last name, first name).
    pub async fn tracked_employees(&self) -> Result<Vec<Employee>, LedgerError> {
        self.directory.list_tracked().await
    }

    /// Reconstruct the day-by-day grid over `[start, end]` inclusive for the
    /// given employees, or the whole tracked population when `employee_ids`
    /// is `None`.
    pub async fn calendar_grid(
        &self,
        employee_ids: Option<&[u64]>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayBucket>, LedgerError> {
        if start > end {
            return Err(LedgerError::InvalidRange);
        }

        let mut employees = self.directory.list_tracked().await?;
        if let Some(ids) = employee_ids {
            employees.retain(|e| ids.contains(&e.id));
        }

        let (from, _) = classify::day_bounds(start);
        let (_, to) = classify::day_bounds(end);
        let records = self.store.in_range(from, to).await?;

        Ok(calendar::build_grid(&employees, start, end, &records))
    }

    /// Per-employee counters over `[start, end]`.
    pub async fn employee_tally(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AttendanceTally, LedgerError> {
        if self.directory.find(employee_id).await?.is_none() {
            return Err(LedgerError::EmployeeNotFound(employee_id));
        }
        let grid = self.calendar_grid(Some(&[employee_id]), start, end).await?;
        Ok(calendar::tally_rows(calendar::employee_rows(
            &grid,
            employee_id,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::clock::FixedClock;
    use crate::ledger::memory::{MemoryDirectory, MemorySiteRegistry, MemoryStore};
    use crate::model::attendance::AttendanceStatus;
    use crate::model::employee::EmployeeRole;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn employee(id: u64, last_name: &str) -> Employee {
        Employee {
            id,
            first_name: "Test".into(),
            last_name: last_name.into(),
            email: format!("{}@example.com", last_name.to_lowercase()),
            role: EmployeeRole::Employee,
            is_active: true,
        }
    }

    fn site(id: u64, token: &str, active: bool) -> WorkSite {
        WorkSite {
            id,
            name: format!("Site {id}"),
            address: "1 Main St".into(),
            description: None,
            check_in_token: token.into(),
            is_active: active,
        }
    }

    /// Ledger over in-memory doubles, clock pinned to `now`.
    fn ledger_at(now: &str) -> (Ledger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(
            Arc::new(MemorySiteRegistry::new(vec![
                site(1, "token-one", true),
                site(2, "token-two", true),
                site(3, "token-dead", false),
            ])),
            Arc::new(MemoryDirectory::new(vec![
                employee(1, "Adler"),
                employee(2, "Berg"),
            ])),
            store.clone(),
            Arc::new(FixedClock(dt(now))),
        );
        (ledger, store)
    }

    #[actix_web::test]
    async fn check_in_before_cutoff_is_present() {
        let (ledger, _) = ledger_at("2024-03-04 08:55:00");

        let (record, resolved) = ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();

        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.check_in_time, dt("2024-03-04 08:55:00"));
        assert_eq!(record.check_out_time, None);
        assert_eq!(record.work_site_id, Some(1));
        assert_eq!(resolved.id, 1);
    }

    #[actix_web::test]
    async fn check_in_after_cutoff_is_late() {
        let (ledger, _) = ledger_at("2024-03-04 09:12:00");

        let (record, _) = ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);
    }

    #[actix_web::test]
    async fn check_in_records_client_meta() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        let meta = ClientMeta {
            ip_address: Some("10.0.0.7".into()),
            user_agent: Some("Mozilla/5.0".into()),
        };
        let (record, _) = ledger.check_in(1, "token-one", meta).await.unwrap();
        assert_eq!(record.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(record.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[actix_web::test]
    async fn unknown_token_is_rejected() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        let err = ledger
            .check_in(1, "no-such-token", ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidSite));
    }

    #[actix_web::test]
    async fn inactive_site_looks_like_unknown_token() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        let err = ledger
            .check_in(1, "token-dead", ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidSite));
    }

    #[actix_web::test]
    async fn second_check_in_same_site_same_day_is_rejected() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let err = ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateCheckIn));
    }

    #[actix_web::test]
    async fn store_uniqueness_catches_racing_inserts() {
        // Two inserts that both passed the duplicate probe: the second one
        // must lose at the store, as it would on the SQL unique key.
        let (_, store) = ledger_at("2024-03-04 08:00:00");

        let new_record = || NewAttendanceRecord {
            employee_id: 1,
            work_site_id: Some(1),
            check_in_time: dt("2024-03-04 08:00:00"),
            status: AttendanceStatus::Present,
            notes: None,
            meta: ClientMeta::default(),
        };
        store.insert(new_record()).await.unwrap();
        let err = store.insert(new_record()).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateCheckIn));
    }

    #[actix_web::test]
    async fn same_day_check_in_at_second_site_is_allowed() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let (record, _) = ledger
            .check_in(1, "token-two", ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(record.work_site_id, Some(2));
    }

    #[actix_web::test]
    async fn check_out_closes_the_open_record() {
        let (ledger, _) = ledger_at("2024-03-04 08:55:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let record = ledger
            .check_out(1, Some(dt("2024-03-04 17:30:00")), None)
            .await
            .unwrap();

        assert_eq!(record.check_out_time, Some(dt("2024-03-04 17:30:00")));
        // classification is assigned at check-in and survives check-out
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn check_out_defaults_to_the_current_instant() {
        let (ledger, store) = ledger_at("2024-03-04 08:55:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let record = ledger.check_out(1, None, None).await.unwrap();
        assert_eq!(record.check_out_time, Some(dt("2024-03-04 08:55:00")));
        assert_eq!(store.record_count(), 1);
    }

    #[actix_web::test]
    async fn check_out_without_open_record_fails() {
        let (ledger, _) = ledger_at("2024-03-04 17:00:00");

        let err = ledger.check_out(1, None, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::NoOpenCheckIn));
    }

    #[actix_web::test]
    async fn repeated_check_out_fails_rather_than_silently_succeeding() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        ledger
            .check_out(1, Some(dt("2024-03-04 17:00:00")), None)
            .await
            .unwrap();
        let err = ledger
            .check_out(1, Some(dt("2024-03-04 17:05:00")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoOpenCheckIn));
    }

    #[actix_web::test]
    async fn check_out_before_check_in_is_rejected() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let err = ledger
            .check_out(1, Some(dt("2024-03-04 07:00:00")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCheckOut));
    }

    #[actix_web::test]
    async fn check_out_picks_the_most_recent_open_record() {
        let (ledger, _) = ledger_at("2024-03-04 14:00:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        ledger
            .check_in(1, "token-two", ClientMeta::default())
            .await
            .unwrap();
        let record = ledger
            .check_out(1, Some(dt("2024-03-04 17:00:00")), None)
            .await
            .unwrap();
        // both records carry the same fixed check-in instant; the resolver
        // must still settle on exactly one of them
        assert_eq!(record.check_out_time, Some(dt("2024-03-04 17:00:00")));
    }

    #[actix_web::test]
    async fn check_out_appends_notes_without_losing_existing_text() {
        let (ledger, _) = ledger_at("2024-03-04 17:30:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let record = ledger.check_out(1, None, Some("left early")).await.unwrap();
        assert_eq!(
            record.notes.as_deref(),
            Some("[2024-03-04 17:30] left early")
        );
    }

    #[actix_web::test]
    async fn absence_override_creates_a_placeholder_without_a_site() {
        let (ledger, _) = ledger_at("2024-03-06 10:00:00");

        let record = ledger
            .set_absence_reason(1, day("2024-03-05"), AbsenceReason::Sick, None)
            .await
            .unwrap();

        assert_eq!(record.status, AttendanceStatus::Sick);
        assert_eq!(record.work_site_id, None);
        assert_eq!(record.check_in_time, dt("2024-03-05 00:00:00"));
        assert_eq!(record.check_out_time, None);
    }

    #[actix_web::test]
    async fn absence_override_is_idempotent() {
        let (ledger, store) = ledger_at("2024-03-06 10:00:00");

        let first = ledger
            .set_absence_reason(1, day("2024-03-05"), AbsenceReason::Vacation, None)
            .await
            .unwrap();
        let second = ledger
            .set_absence_reason(1, day("2024-03-05"), AbsenceReason::Vacation, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.record_count(), 1);
    }

    #[actix_web::test]
    async fn absence_override_rewrites_an_existing_check_in_in_place() {
        let (ledger, store) = ledger_at("2024-03-04 08:30:00");

        let (original, _) = ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let overridden = ledger
            .set_absence_reason(
                1,
                day("2024-03-04"),
                AbsenceReason::BusinessTrip,
                Some("client visit".into()),
            )
            .await
            .unwrap();

        assert_eq!(overridden.id, original.id);
        assert_eq!(overridden.status, AttendanceStatus::BusinessTrip);
        assert_eq!(overridden.check_in_time, original.check_in_time);
        assert_eq!(overridden.notes.as_deref(), Some("client visit"));
        assert_eq!(store.record_count(), 1);
    }

    #[actix_web::test]
    async fn absence_override_for_unknown_employee_fails() {
        let (ledger, _) = ledger_at("2024-03-06 10:00:00");

        let err = ledger
            .set_absence_reason(99, day("2024-03-05"), AbsenceReason::Sick, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmployeeNotFound(99)));
    }

    #[actix_web::test]
    async fn current_open_sees_only_todays_record() {
        let (ledger, store) = ledger_at("2024-03-05 10:00:00");

        // yesterday's record was never closed
        store
            .insert(NewAttendanceRecord {
                employee_id: 1,
                work_site_id: Some(1),
                check_in_time: dt("2024-03-04 08:00:00"),
                status: AttendanceStatus::Present,
                notes: None,
                meta: ClientMeta::default(),
            })
            .await
            .unwrap();
        assert!(ledger.current_open(1).await.unwrap().is_none());

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        let open = ledger.current_open(1).await.unwrap().unwrap();
        assert_eq!(open.check_in_time, dt("2024-03-05 10:00:00"));
    }

    #[actix_web::test]
    async fn grid_reflects_a_completed_day_verbatim() {
        let (ledger, _) = ledger_at("2024-03-04 08:55:00");

        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        ledger
            .check_out(1, Some(dt("2024-03-04 17:30:00")), None)
            .await
            .unwrap();

        let grid = ledger
            .calendar_grid(Some(&[1]), day("2024-03-04"), day("2024-03-04"))
            .await
            .unwrap();

        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].rows.len(), 1);
        let row = &grid[0].rows[0];
        assert_eq!(row.status, AttendanceStatus::Present);
        assert_eq!(row.check_in_time, Some(dt("2024-03-04 08:55:00")));
        assert_eq!(row.check_out_time, Some(dt("2024-03-04 17:30:00")));
    }

    #[actix_web::test]
    async fn grid_defaults_to_the_whole_tracked_population() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        let grid = ledger
            .calendar_grid(None, day("2024-03-04"), day("2024-03-04"))
            .await
            .unwrap();
        assert_eq!(grid[0].rows.len(), 2);
        assert!(
            grid[0]
                .rows
                .iter()
                .all(|r| r.status == AttendanceStatus::Absent)
        );
    }

    #[actix_web::test]
    async fn inverted_range_is_rejected_before_any_work() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        let err = ledger
            .calendar_grid(None, day("2024-03-05"), day("2024-03-04"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange));
    }

    #[actix_web::test]
    async fn tally_over_a_mixed_week() {
        let (ledger, _) = ledger_at("2024-03-04 09:30:00");

        // Monday: late check-in
        ledger
            .check_in(1, "token-one", ClientMeta::default())
            .await
            .unwrap();
        // Wednesday: sick
        ledger
            .set_absence_reason(1, day("2024-03-06"), AbsenceReason::Sick, None)
            .await
            .unwrap();

        // Mon..Fri; Tue/Thu/Fri synthesize absences
        let tally = ledger
            .employee_tally(1, day("2024-03-04"), day("2024-03-08"))
            .await
            .unwrap();

        assert_eq!(tally.total_days, 5);
        assert_eq!(tally.late_days, 1);
        assert_eq!(tally.sick_days, 1);
        assert_eq!(tally.absent_days, 3);
        assert_eq!(tally.present_days, 0);
    }

    #[actix_web::test]
    async fn tally_for_unknown_employee_fails() {
        let (ledger, _) = ledger_at("2024-03-04 08:00:00");

        let err = ledger
            .employee_tally(99, day("2024-03-04"), day("2024-03-08"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmployeeNotFound(99)));
    }
}
