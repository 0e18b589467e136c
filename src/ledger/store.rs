use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;

use crate::ledger::LedgerError;
use crate::ledger::classify::day_bounds;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, ClientMeta};
use crate::model::employee::Employee;
use crate::model::work_site::WorkSite;

const RECORD_COLUMNS: &str = "id, employee_id, work_site_id, check_in_time, check_out_time, \
                              status, notes, ip_address, user_agent";

/// Insert payload for a new ledger row.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub employee_id: u64,
    pub work_site_id: Option<u64>,
    pub check_in_time: NaiveDateTime,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub meta: ClientMeta,
}

/// Token lookup against the site registry. Inactive and unknown tokens both
/// resolve to `None` so callers cannot tell a wrong code from a disabled
/// site.
#[async_trait]
pub trait SiteRegistry: Send + Sync {
    async fn resolve_token(&self, token: &str) -> Result<Option<WorkSite>, LedgerError>;
}

/// Read access to the employee population owned by the user-management
/// collaborator.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Active employees, ordered by last name then first name.
    async fn list_tracked(&self) -> Result<Vec<Employee>, LedgerError>;

    async fn find(&self, employee_id: u64) -> Result<Option<Employee>, LedgerError>;
}

/// The append-mostly attendance table. Soft-deleted rows are invisible to
/// every query here.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// The record for (employee, site, calendar day), if any.
    async fn find_for_site_day(
        &self,
        employee_id: u64,
        work_site_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError>;

    /// Insert a new row. Must fail with `DuplicateCheckIn` when another row
    /// for the same (employee, site, day) already exists, including under
    /// concurrent inserts.
    async fn insert(&self, rec: NewAttendanceRecord) -> Result<AttendanceRecord, LedgerError>;

    /// The most recent record with no check-out yet, across all days and
    /// sites.
    async fn latest_open(&self, employee_id: u64) -> Result<Option<AttendanceRecord>, LedgerError>;

    /// Set the check-out time and, when `notes` is `Some`, replace the notes
    /// column with the given (already appended) text.
    async fn close(
        &self,
        id: u64,
        check_out_time: NaiveDateTime,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError>;

    /// The earliest record of the employee's calendar day, any site or none.
    async fn earliest_for_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError>;

    /// Administrative status override; notes are replaced wholesale.
    async fn override_status(
        &self,
        id: u64,
        status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError>;

    /// All records with a check-in inside `[from, to)`, ascending.
    async fn in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<AttendanceRecord>, LedgerError>;
}

// ---------------------------------------------------------------------------
// SQL implementations
// ---------------------------------------------------------------------------

pub struct SqlSiteRegistry {
    pool: MySqlPool,
}

impl SqlSiteRegistry {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteRegistry for SqlSiteRegistry {
    async fn resolve_token(&self, token: &str) -> Result<Option<WorkSite>, LedgerError> {
        let site = sqlx::query_as::<_, WorkSite>(
            "SELECT id, name, address, description, check_in_token, is_active \
             FROM work_sites WHERE check_in_token = ? AND is_active = TRUE",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(site)
    }
}

pub struct SqlEmployeeDirectory {
    pool: MySqlPool,
}

impl SqlEmployeeDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeDirectory for SqlEmployeeDirectory {
    async fn list_tracked(&self) -> Result<Vec<Employee>, LedgerError> {
        let employees = sqlx::query_as::<_, Employee>(
            "SELECT id, first_name, last_name, email, role, is_active \
             FROM employees WHERE is_active = TRUE \
             ORDER BY last_name, first_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn find(&self, employee_id: u64) -> Result<Option<Employee>, LedgerError> {
        let employee = sqlx::query_as::<_, Employee>(
            "SELECT id, first_name, last_name, email, role, is_active \
             FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }
}

pub struct SqlAttendanceStore {
    pool: MySqlPool,
}

impl SqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: u64) -> Result<AttendanceRecord, LedgerError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl AttendanceStore for SqlAttendanceStore {
    async fn find_for_site_day(
        &self,
        employee_id: u64,
        work_site_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        let (start, end) = day_bounds(day);
        let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance \
             WHERE employee_id = ? AND work_site_id = ? \
             AND check_in_time >= ? AND check_in_time < ? \
             AND deleted_at IS NULL \
             LIMIT 1"
        ))
        .bind(employee_id)
        .bind(work_site_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert(&self, rec: NewAttendanceRecord) -> Result<AttendanceRecord, LedgerError> {
        let result = sqlx::query(
            "INSERT INTO attendance \
             (employee_id, work_site_id, check_in_time, status, notes, ip_address, user_agent) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rec.employee_id)
        .bind(rec.work_site_id)
        .bind(rec.check_in_time)
        .bind(rec.status)
        .bind(&rec.notes)
        .bind(&rec.meta.ip_address)
        .bind(&rec.meta.user_agent)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self.fetch(done.last_insert_id()).await,
            // Unique constraint on (employee, site, day): the loser of a
            // concurrent race lands here
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                Err(LedgerError::DuplicateCheckIn)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn latest_open(&self, employee_id: u64) -> Result<Option<AttendanceRecord>, LedgerError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance \
             WHERE employee_id = ? AND check_out_time IS NULL AND deleted_at IS NULL \
             ORDER BY check_in_time DESC \
             LIMIT 1"
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn close(
        &self,
        id: u64,
        check_out_time: NaiveDateTime,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError> {
        sqlx::query(
            "UPDATE attendance SET check_out_time = ?, notes = COALESCE(?, notes) WHERE id = ?",
        )
        .bind(check_out_time)
        .bind(&notes)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.fetch(id).await
    }

    async fn earliest_for_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        let (start, end) = day_bounds(day);
        let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance \
             WHERE employee_id = ? AND check_in_time >= ? AND check_in_time < ? \
             AND deleted_at IS NULL \
             ORDER BY check_in_time ASC \
             LIMIT 1"
        ))
        .bind(employee_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn override_status(
        &self,
        id: u64,
        status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, LedgerError> {
        sqlx::query("UPDATE attendance SET status = ?, notes = ? WHERE id = ?")
            .bind(status)
            .bind(&notes)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.fetch(id).await
    }

    async fn in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance \
             WHERE check_in_time >= ? AND check_in_time < ? AND deleted_at IS NULL \
             ORDER BY check_in_time ASC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
