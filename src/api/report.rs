use std::collections::HashMap;

use crate::auth::auth::AuthUser;
use crate::ledger::calendar::{employee_rows, tally_rows};
use crate::ledger::{Ledger, LedgerError};
use crate::model::attendance::{AttendanceTally, DayBucket};
use actix_web::http::header;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct GridQuery {
    /// Range start, inclusive
    pub start_date: NaiveDate,
    /// Range end, inclusive
    pub end_date: NaiveDate,
    /// Restrict to a single employee
    pub employee_id: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct RangeQuery {
    /// Range start, inclusive
    pub start_date: NaiveDate,
    /// Range end, inclusive
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct GridResponse {
    #[schema(example = "2024-03-04", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2024-03-08", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub days: Vec<DayBucket>,
}

/// The reconstructed day-by-day attendance grid (manager only).
#[utoipa::path(
    get,
    path = "/api/v1/report/grid",
    params(GridQuery),
    responses(
        (status = 200, description = "One bucket per day, one row per employee per working day", body = GridResponse),
        (status = 400, description = "Inverted date range", body = Object, example = json!({
            "message": "start day is after end day"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Report"
)]
pub async fn grid(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    query: web::Query<GridQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let selection = query.employee_id.map(|id| vec![id]);
    let result = ledger
        .calendar_grid(selection.as_deref(), query.start_date, query.end_date)
        .await;

    match result {
        Ok(days) => Ok(HttpResponse::Ok().json(GridResponse {
            start_date: query.start_date,
            end_date: query.end_date,
            days,
        })),
        Err(e @ LedgerError::InvalidRange) => {
            Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build attendance grid");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Attendance counters for one employee (manager, or the employee itself).
#[utoipa::path(
    get,
    path = "/api/v1/report/tally/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        RangeQuery
    ),
    responses(
        (status = 200, description = "Counters over the range", body = AttendanceTally),
        (status = 400, description = "Inverted date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "unknown employee 99"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Report"
)]
pub async fn tally(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<u64>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view(employee_id) {
        return Err(actix_web::error::ErrorForbidden("Not your report"));
    }

    let result = ledger
        .employee_tally(employee_id, query.start_date, query.end_date)
        .await;

    match result {
        Ok(tally) => Ok(HttpResponse::Ok().json(tally)),
        Err(e @ LedgerError::InvalidRange) => {
            Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })))
        }
        Err(e @ LedgerError::EmployeeNotFound(_)) => {
            Ok(HttpResponse::NotFound().json(json!({ "message": e.to_string() })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Failed to compute tally");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeStats {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "Anna Keller")]
    pub full_name: String,
    pub tally: AttendanceTally,
}

#[derive(Serialize, ToSchema)]
pub struct AllStatsResponse {
    pub data: Vec<EmployeeStats>,
}

/// Per-employee counters for the whole tracked population (manager only).
#[utoipa::path(
    get,
    path = "/api/v1/report/all-stats",
    params(RangeQuery),
    responses(
        (status = 200, description = "One tally per tracked employee", body = AllStatsResponse),
        (status = 400, description = "Inverted date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Report"
)]
pub async fn all_stats(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let grid = match ledger
        .calendar_grid(None, query.start_date, query.end_date)
        .await
    {
        Ok(grid) => grid,
        Err(e @ LedgerError::InvalidRange) => {
            return Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build grid for stats");
            return Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ));
        }
    };

    let employees = ledger.tracked_employees().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list employees for stats");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data: Vec<EmployeeStats> = employees
        .iter()
        .map(|e| EmployeeStats {
            employee_id: e.id,
            full_name: e.full_name(),
            tally: tally_rows(employee_rows(&grid, e.id)),
        })
        .collect();

    Ok(HttpResponse::Ok().json(AllStatsResponse { data }))
}

/// The grid rendered as a spreadsheet-friendly CSV attachment (manager only).
#[utoipa::path(
    get,
    path = "/api/v1/report/export/csv",
    params(RangeQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 400, description = "Inverted date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Report"
)]
pub async fn export_csv(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    pool: web::Data<MySqlPool>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let grid = match ledger
        .calendar_grid(None, query.start_date, query.end_date)
        .await
    {
        Ok(grid) => grid,
        Err(e @ LedgerError::InvalidRange) => {
            return Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build grid for export");
            return Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ));
        }
    };

    let employees = ledger.tracked_employees().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list employees for export");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    let names: HashMap<u64, String> = employees
        .iter()
        .map(|e| (e.id, format!("{}, {}", e.last_name, e.first_name)))
        .collect();

    let sites: HashMap<u64, String> =
        sqlx::query_as::<_, (u64, String)>("SELECT id, name FROM work_sites")
            .fetch_all(pool.get_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list sites for export");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?
            .into_iter()
            .collect();

    let csv = render_csv(&grid, &names, &sites);
    let filename = format!(
        "attendance_{}_{}.csv",
        query.start_date.format("%Y-%m-%d"),
        query.end_date.format("%Y-%m-%d")
    );

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/csv; charset=utf-8"))
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(csv))
}

/// Flatten the grid into CSV. Starts with a UTF-8 BOM so spreadsheet tools
/// pick the right encoding.
fn render_csv(
    grid: &[DayBucket],
    names: &HashMap<u64, String>,
    sites: &HashMap<u64, String>,
) -> String {
    let mut out = String::from("\u{feff}");
    out.push_str("Date,Employee,Status,Check-in,Check-out,Site,Notes\r\n");

    for bucket in grid {
        for row in &bucket.rows {
            let name = names
                .get(&row.employee_id)
                .cloned()
                .unwrap_or_else(|| row.employee_id.to_string());
            let site = row
                .work_site_id
                .and_then(|id| sites.get(&id).cloned())
                .unwrap_or_default();
            let fields = [
                bucket.day.format("%Y-%m-%d").to_string(),
                name,
                row.status.to_string(),
                row.check_in_time
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default(),
                row.check_out_time
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default(),
                site,
                row.notes.clone().unwrap_or_default(),
            ];
            let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            out.push_str(&line.join(","));
            out.push_str("\r\n");
        }
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
