use crate::api::attendance::{
    AbsenceRequest, CheckInRequest, CheckInResponse, CheckOutRequest, MyStatsResponse,
};
use crate::api::report::{AllStatsResponse, EmployeeStats, GridResponse};
use crate::api::work_site::{CreateWorkSite, UpdateWorkSite, WorkSiteListResponse};
use crate::model::attendance::{
    AbsenceReason, AttendanceRecord, AttendanceStatus, AttendanceTally, DayBucket, DayRow,
};
use crate::model::work_site::WorkSite;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rollcall API",
        version = "1.0.0",
        description = r#"
## Work-site attendance tracking

This API tracks employee physical presence at registered work sites and
reconstructs complete per-day attendance reports over arbitrary date ranges.

### 🔹 Key Features
- **Attendance**
  - QR-token check-in and check-out with automatic present/late classification
  - Administrative absence reasons (sick, vacation, business trip, no reason)
- **Work Sites**
  - Register sites, rotate their check-in tokens, flip them inactive
- **Reporting**
  - Day-by-day calendar grid including synthesized absences
  - Per-employee tallies and CSV export

### 🔐 Security
All endpoints require **JWT Bearer authentication**; administrative
operations are restricted to the **Manager** role.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::current,
        crate::api::attendance::my_stats,
        crate::api::attendance::set_absence,

        crate::api::work_site::list_sites,
        crate::api::work_site::create_site,
        crate::api::work_site::get_site,
        crate::api::work_site::update_site,
        crate::api::work_site::toggle_status,
        crate::api::work_site::regenerate_token,

        crate::api::report::grid,
        crate::api::report::tally,
        crate::api::report::all_stats,
        crate::api::report::export_csv
    ),
    components(
        schemas(
            CheckInRequest,
            CheckInResponse,
            CheckOutRequest,
            AbsenceRequest,
            MyStatsResponse,
            CreateWorkSite,
            UpdateWorkSite,
            WorkSiteListResponse,
            GridResponse,
            AllStatsResponse,
            EmployeeStats,
            WorkSite,
            AttendanceRecord,
            AttendanceStatus,
            AbsenceReason,
            AttendanceTally,
            DayRow,
            DayBucket
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Check-in/check-out lifecycle APIs"),
        (name = "WorkSite", description = "Work site administration APIs"),
        (name = "Report", description = "Calendar grid and export APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
