//! In-memory doubles for the storage seams, mirroring the SQL behavior the
//! core relies on (uniqueness key, COALESCE note updates, ordering).

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::ledger::LedgerError;
use crate::ledger::classify::day_bounds;
use crate::ledger::store::{
    AttendanceStore, EmployeeDirectory, NewAttendanceRecord, SiteRegistry,
};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use crate::model::work_site::WorkSite;

pub struct MemorySiteRegistry {
    sites: Vec<WorkSite>,
}

impl MemorySiteRegistry {
    pub fn new(sites: Vec<WorkSite>) -> Self {
        Self { sites }
    }
}

#[async_trait]
impl SiteRegistry for MemorySiteRegistry {
    async fn resolve_token(&self, token: &str) -> Result<Option<WorkSite>, LedgerError> {
        Ok(self
            .sites
            .iter()
            .find(|s| s.check_in_token == token && s.is_active)
            .cloned())
    }
}

pub struct MemoryDirectory {
    employees: Vec<Employee>,
}

impl MemoryDirectory {
    pub fn new(employees: Vec<Employee>) -> Self {
        Self { employees }
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryDirectory {
    async fn list_tracked(&self) -> Result<Vec<Employee>, LedgerError> {
        let mut tracked: Vec<Employee> = self
            .employees
            .iter()
            .filter(|e| e.is_active)
            .cloned()
            .collect();
        tracked.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str())
                .cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });
        Ok(tracked)
    }

    async fn find(&self, employee_id: u64) -> Result<Option<Employee>, LedgerError> {
        Ok(self.employees.iter().find(|e| e.id == employee_id).cloned())
    }
}

pub struct MemoryStore {
    records: Mutex<Vec<AttendanceRecord>>,
    next_id: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn update<F>(&self, id: u64, apply: F) -> Result<AttendanceRecord, LedgerError>
    where
        F: FnOnce(&mut AttendanceRecord),
    {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(sqlx::Error::RowNotFound)?;
        apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_for_site_day(
        &self,
        employee_id: u64,
        work_site_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        let (start, end) = day_bounds(day);
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.employee_id == employee_id
                    && r.work_site_id == Some(work_site_id)
                    && r.check_in_time >= start
                    && r.check_in_time < end
            })
            .cloned())
    }

    async fn insert(&self, rec: NewAttendanceRecord) -> Result<AttendanceRecord, LedgerError> {
        let mut records = self.records.lock().unwrap();

        // the (employee, site, day) unique key; NULL sites never collide,
        // matching SQL semantics
        if let Some(site_id) = rec.work_site_id {
            let day = rec.check_in_time.date();
            let clash = records.iter().any(|r| {
                r.employee_id == rec.employee_id
                    && r.work_site_id == Some(site_id)
                    && r.check_in_time.date() == day
            });
            if clash {
                return Err(LedgerError::DuplicateCheckIn);
            }
        }

        let mut next_id = self.next_id.lock().unwrap();
        let record = AttendanceRecord {
            id: *next_id,
            employee_id: rec.employee_id,
            work_site_id: rec.work_site_id,
            check_in_time: rec.check_in_time,
            check_out_time: None,
            status: rec.status,
            notes: rec.notes,
            ip_address: rec.meta.ip_address,
            user_agent: rec.meta.user_agent,
        };
        *next_id += 1;
        records.push(record.clone());
        Ok(record)
    }

    async fn latest_open(&self, employee_id: u64) -> Result<Option<AttendanceRecord>, LedgerError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.employee_id == employee_id && r.check_out_time.is_none())
            .max_by_key(|r| (r.check_in_time, r.id))
            .cloned())
    }

    async fn close(
        &self,
        id: u64,
        check_out_time: NaiveDateTime,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError> {
        self.update(id, |record| {
            record.check_out_time = Some(check_out_time);
            if notes.is_some() {
                record.notes = notes;
            }
        })
    }

    async fn earliest_for_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        let (start, end) = day_bounds(day);
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.employee_id == employee_id && r.check_in_time >= start && r.check_in_time < end
            })
            .min_by_key(|r| (r.check_in_time, r.id))
            .cloned())
    }

    async fn override_status(
        &self,
        id: u64,
        status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError> {
        self.update(id, |record| {
            record.status = status;
            record.notes = notes;
        })
    }

    async fn in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let mut records: Vec<AttendanceRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.check_in_time >= from && r.check_in_time < to)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.check_in_time, r.id));
        Ok(records)
    }
}
