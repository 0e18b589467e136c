use crate::auth::auth::AuthUser;
use crate::ledger::{Ledger, LedgerError};
use crate::model::attendance::{
    AbsenceReason, AttendanceRecord, AttendanceTally, ClientMeta, DayRow,
};
use crate::model::work_site::WorkSite;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    /// Site token scanned from the QR code.
    #[schema(example = "3e2c0b68-7a31-4b41-9a5f-d2f4c9a8e011")]
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    pub record: AttendanceRecord,
    pub site: WorkSite,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutRequest {
    /// Defaults to the current server time.
    #[schema(example = "2024-03-04T17:30:00", format = "date-time", value_type = Option<String>)]
    pub check_out_time: Option<NaiveDateTime>,
    #[schema(example = "left early, doctor appointment")]
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AbsenceRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2024-03-05", format = "date", value_type = String)]
    pub day: NaiveDate,
    #[schema(example = "sick")]
    pub reason: AbsenceReason,
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct StatsQuery {
    /// Range start, inclusive
    pub start_date: NaiveDate,
    /// Range end, inclusive
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct MyStatsResponse {
    pub tally: AttendanceTally,
    pub rows: Vec<DayRow>,
}

fn client_meta(req: &HttpRequest) -> ClientMeta {
    ClientMeta {
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_owned),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned),
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in successfully", body = CheckInResponse),
        (status = 400, description = "Unknown site code or already checked in", body = Object, example = json!({
            "message": "already checked in today at this site"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    payload: web::Json<CheckInRequest>,
    req: HttpRequest,
) -> actix_web::Result<impl Responder> {
    let result = ledger
        .check_in(auth.employee_id, &payload.token, client_meta(&req))
        .await;

    match result {
        Ok((record, site)) => {
            Ok(HttpResponse::Created().json(CheckInResponse { record, site }))
        }
        Err(e @ (LedgerError::InvalidSite | LedgerError::DuplicateCheckIn)) => {
            Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id = auth.employee_id, "Check-in failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceRecord),
        (status = 400, description = "Nothing to check out of", body = Object, example = json!({
            "message": "no open check-in to close"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    payload: web::Json<CheckOutRequest>,
) -> actix_web::Result<impl Responder> {
    let result = ledger
        .check_out(
            auth.employee_id,
            payload.check_out_time,
            payload.notes.as_deref(),
        )
        .await;

    match result {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(e @ (LedgerError::NoOpenCheckIn | LedgerError::InvalidCheckOut)) => {
            Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id = auth.employee_id, "Check-out failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// The caller's open check-in for today, or null.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/current",
    responses(
        (status = 200, description = "The open record, or null when there is none", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn current(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
) -> actix_web::Result<impl Responder> {
    let record = ledger.current_open(auth.employee_id).await.map_err(|e| {
        tracing::error!(error = %e, employee_id = auth.employee_id, "Failed to fetch open record");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    Ok(HttpResponse::Ok().json(record))
}

/// The caller's own attendance counters and day rows over a range.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/my-stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Tally and day rows", body = MyStatsResponse),
        (status = 400, description = "Inverted date range"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn my_stats(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    query: web::Query<StatsQuery>,
) -> actix_web::Result<impl Responder> {
    let result = ledger
        .calendar_grid(
            Some(&[auth.employee_id]),
            query.start_date,
            query.end_date,
        )
        .await;

    match result {
        Ok(grid) => {
            let rows: Vec<DayRow> = grid
                .iter()
                .flat_map(|bucket| bucket.rows.iter().cloned())
                .collect();
            let tally = crate::ledger::calendar::tally_rows(&rows);
            Ok(HttpResponse::Ok().json(MyStatsResponse { tally, rows }))
        }
        Err(e @ LedgerError::InvalidRange) => {
            Ok(HttpResponse::BadRequest().json(json!({ "message": e.to_string() })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id = auth.employee_id, "Failed to compute stats");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Administrative absence-reason override (manager only).
#[utoipa::path(
    put,
    path = "/api/v1/attendance/absence",
    request_body = AbsenceRequest,
    responses(
        (status = 200, description = "Day classified", body = AttendanceRecord),
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
    tag = "Attendance"
)]
pub async fn set_absence(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    payload: web::Json<AbsenceRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let payload = payload.into_inner();
    let result = ledger
        .set_absence_reason(payload.employee_id, payload.day, payload.reason, payload.notes)
        .await;

    match result {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(e @ LedgerError::EmployeeNotFound(_)) => {
            Ok(HttpResponse::NotFound().json(json!({ "message": e.to_string() })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id = payload.employee_id, "Absence override failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}
