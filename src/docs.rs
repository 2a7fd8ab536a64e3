use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::admin::{CutoffRequest, DailyRosterResponse, FlagRequest};
use crate::api::attendance::{CheckInRequest, DayResponse};
use crate::api::uploads::PhotoUploadRequest;
use crate::auth::handlers::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest, TokenResponse,
};
use crate::model::attendance::{AttendanceRecord, Status};
use crate::model::user::{PublicUser, RosterUser};
use crate::utils::netloc::NetworkLocation;
use crate::utils::report::MonthlyStats;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Employee Attendance System

Records one geolocated, timestamped check-in per employee per calendar day
and classifies each as on-time or late against an admin-configurable cutoff
evaluated in the employee's local timezone.

### Key Features
- **Check-ins**
  - One record per user per day, enforced at the storage layer
  - Timezone derived from GPS coordinates, location label reverse-geocoded
- **Reporting**
  - Daily rosters, per-user monthly histories with punctuality stats
  - Spreadsheet exports over arbitrary date ranges with `Missing` rows
- **Administration**
  - Cutoff configuration, record flagging, photo-backed check-ins

### Security
Endpoints under `/api` require a **JWT Bearer** access token.
Admin-only operations additionally check the caller's role.

Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::signup,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::me,

        crate::api::attendance::check_in,
        crate::api::attendance::today,
        crate::api::attendance::by_date,
        crate::api::attendance::delete_record,

        crate::api::admin::get_settings,
        crate::api::admin::put_settings,
        crate::api::admin::daily_roster,
        crate::api::admin::flag_attendance,
        crate::api::admin::list_users,
        crate::api::admin::user_month,
        crate::api::admin::export_range,
        crate::api::admin::export_user_month,

        crate::api::location::ip_location,
        crate::api::uploads::upload_photo
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            TokenResponse,
            PublicUser,
            RosterUser,
            AttendanceRecord,
            Status,
            CheckInRequest,
            DayResponse,
            DailyRosterResponse,
            CutoffRequest,
            FlagRequest,
            MonthlyStats,
            NetworkLocation,
            PhotoUploadRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Account and session APIs"),
        (name = "Attendance", description = "Check-in and record APIs"),
        (name = "Admin", description = "Reporting and configuration APIs"),
        (name = "Location", description = "Network location APIs"),
        (name = "Uploads", description = "Check-in photo APIs"),
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
