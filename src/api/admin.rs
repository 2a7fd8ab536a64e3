use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::api::attendance::{ATTENDANCE_COLUMNS, fetch_record};
use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceRecord;
use crate::model::role::Role;
use crate::model::user::RosterUser;
use crate::utils::report::{
    EXPORT_HEADERS, apply_current_status, current_month_key, is_valid_month_key, monthly_stats,
    range_export_rows, resolve_export_range, today_key, user_month_rows,
};
use crate::utils::settings::{get_cutoff_time, set_cutoff_time};
use crate::utils::time_rules::{parse_cutoff_time, status_for_record};
use crate::utils::xlsx::build_workbook;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CutoffRequest {
    #[schema(example = "08:00")]
    pub cutoff_time: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DayQuery {
    pub date: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ExportQuery {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyRosterResponse {
    pub date: String,
    pub cutoff_time: String,
    pub items: Vec<AttendanceRecord>,
    pub users: Vec<RosterUser>,
}

async fn fetch_roster(pool: &MySqlPool) -> Result<Vec<RosterUser>, sqlx::Error> {
    sqlx::query_as::<_, RosterUser>(
        "SELECT id, name, email FROM users WHERE role_id = ? ORDER BY name ASC",
    )
    .bind(Role::User as u8)
    .fetch_all(pool)
    .await
}

async fn fetch_user_month(
    pool: &MySqlPool,
    user_id: u64,
    month: &str,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
         WHERE user_id = ? AND date_key LIKE ? ORDER BY captured_at ASC"
    ))
    .bind(user_id)
    .bind(format!("{month}-%"))
    .fetch_all(pool)
    .await
}

async fn fetch_roster_user(pool: &MySqlPool, id: u64) -> Result<Option<RosterUser>, sqlx::Error> {
    sqlx::query_as::<_, RosterUser>("SELECT id, name, email FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Current cutoff setting
#[utoipa::path(
    get,
    path = "/api/admin/settings",
    responses((status = 200, description = "Current cutoff", body = Object, example = json!({"cutoffTime": "08:00"}))),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_settings(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    match get_cutoff_time(pool.get_ref()).await {
        Ok(cutoff_time) => Ok(HttpResponse::Ok().json(json!({"cutoffTime": cutoff_time}))),
        Err(e) => {
            error!(error = %e, "Failed to read settings");
            Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})))
        }
    }
}

/// Update the cutoff; immediately visible to every later classification,
/// including re-classification of historical records in reports.
#[utoipa::path(
    put,
    path = "/api/admin/settings",
    request_body = CutoffRequest,
    responses(
        (status = 200, description = "Cutoff updated"),
        (status = 400, description = "Cutoff time must be HH:mm")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn put_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CutoffRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    if parse_cutoff_time(&payload.cutoff_time).is_none() {
        return Ok(
            HttpResponse::BadRequest().json(json!({"error": "Cutoff time must be HH:mm"}))
        );
    }

    match set_cutoff_time(pool.get_ref(), &payload.cutoff_time).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({"cutoffTime": payload.cutoff_time}))),
        Err(e) => {
            error!(error = %e, "Failed to update cutoff setting");
            Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})))
        }
    }
}

/// Daily roster: one day's records joined against the active-user roster.
#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    params(("date", Query, description = "Calendar day, defaults to today")),
    responses((status = 200, description = "Roster for the day", body = DailyRosterResponse)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn daily_roster(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date_key = query.date.clone().unwrap_or_else(today_key);

    let items_sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date_key = ? ORDER BY captured_at ASC"
    );
    let fetch_items = sqlx::query_as::<_, AttendanceRecord>(&items_sql)
        .bind(&date_key)
        .fetch_all(pool.get_ref());

    let (items, users, cutoff_time) = match futures::try_join!(
        fetch_items,
        fetch_roster(pool.get_ref()),
        get_cutoff_time(pool.get_ref()),
    ) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, date_key = %date_key, "Failed to load daily roster");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let mut items = items;
    for record in &mut items {
        apply_current_status(record, &cutoff_time);
    }

    Ok(HttpResponse::Ok().json(DailyRosterResponse {
        date: date_key,
        cutoff_time,
        items,
        users,
    }))
}

#[derive(Deserialize, ToSchema)]
pub struct FlagRequest {
    #[schema(example = "Checked in from outside the site")]
    pub comment: Option<String>,
}

/// Attach or clear an admin flag on a record. Comment and timestamp move
/// together: both set, or both cleared.
#[utoipa::path(
    put,
    path = "/api/admin/attendance/{id}/flag",
    params(("id", Path, description = "Attendance record ID")),
    request_body = FlagRequest,
    responses(
        (status = 200, description = "Updated record", body = AttendanceRecord),
        (status = 400, description = "Comment too long"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn flag_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<FlagRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let id = path.into_inner();
    let comment = normalize_flag_comment(payload.comment.as_deref());
    if let Some(comment) = &comment {
        if comment.chars().count() > 280 {
            return Ok(HttpResponse::BadRequest()
                .json(json!({"error": "Comment must be 280 characters or less"})));
        }
    }

    match fetch_record(pool.get_ref(), id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(json!({"error": "Record not found"})));
        }
        Err(e) => {
            error!(error = %e, id, "Failed to fetch record for flagging");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    }

    let flagged_at = comment.as_ref().map(|_| Utc::now());
    if let Err(e) = sqlx::query("UPDATE attendance SET flag_comment = ?, flagged_at = ? WHERE id = ?")
        .bind(&comment)
        .bind(flagged_at)
        .bind(id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, id, "Failed to update flag");
        return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
    }

    match fetch_record(pool.get_ref(), id).await {
        Ok(Some(record)) => Ok(HttpResponse::Ok().json(record)),
        _ => {
            error!(id, "Flagged record could not be read back");
            Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})))
        }
    }
}

fn normalize_flag_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|comment| !comment.is_empty())
        .map(str::to_string)
}

/// Active-user roster
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses((status = 200, description = "Active users", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    match fetch_roster(pool.get_ref()).await {
        Ok(users) => Ok(HttpResponse::Ok().json(json!({"users": users}))),
        Err(e) => {
            error!(error = %e, "Failed to list users");
            Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})))
        }
    }
}

/// Monthly history for one user, with punctuality statistics. Statuses are
/// re-derived against the cutoff in force right now.
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/attendance",
    params(
        ("id", Path, description = "User ID"),
        ("month", Query, description = "Month, YYYY-MM; defaults to the current month")
    ),
    responses(
        (status = 200, description = "Monthly history with stats"),
        (status = 400, description = "Invalid month format"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn user_month(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    let month = query.month.clone().unwrap_or_else(current_month_key);
    if !is_valid_month_key(&month) {
        return Ok(HttpResponse::BadRequest().json(json!({"error": "Invalid month format"})));
    }

    let user = match fetch_roster_user(pool.get_ref(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(json!({"error": "User not found"})));
        }
        Err(e) => {
            error!(error = %e, user_id, "Failed to fetch user");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let (records, cutoff_time) = match futures::try_join!(
        fetch_user_month(pool.get_ref(), user_id, &month),
        get_cutoff_time(pool.get_ref()),
    ) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, user_id, month = %month, "Failed to load monthly history");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let mut items = records;
    let statuses: Vec<_> = items
        .iter()
        .map(|record| status_for_record(record, &cutoff_time))
        .collect();
    for record in &mut items {
        apply_current_status(record, &cutoff_time);
    }
    let stats = monthly_stats(&statuses);

    Ok(HttpResponse::Ok().json(json!({
        "user": user,
        "month": month,
        "cutoffTime": cutoff_time,
        "stats": stats,
        "items": items
    })))
}

/// Range export: a dense day × user spreadsheet where user-days without a
/// record come out as `Missing`.
#[utoipa::path(
    get,
    path = "/api/admin/export",
    params(
        ("date", Query, description = "Single day shorthand for start=end"),
        ("start", Query, description = "Range start, YYYY-MM-DD"),
        ("end", Query, description = "Range end, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid date range")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn export_range(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExportQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let Some(range) = resolve_export_range(
        query.date.as_deref(),
        query.start.as_deref(),
        query.end.as_deref(),
    ) else {
        return Ok(HttpResponse::BadRequest()
            .json(json!({"error": "Invalid date range. Use YYYY-MM-DD."})));
    };

    let records_sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
         WHERE date_key >= ? AND date_key <= ? ORDER BY date_key ASC, user_name ASC"
    );
    let fetch_records = sqlx::query_as::<_, AttendanceRecord>(&records_sql)
        .bind(&range.start)
        .bind(&range.end)
        .fetch_all(pool.get_ref());

    let (records, users, cutoff_time) = match futures::try_join!(
        fetch_records,
        fetch_roster(pool.get_ref()),
        get_cutoff_time(pool.get_ref()),
    ) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Failed to load export data");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let rows = range_export_rows(&range, &users, &records, &cutoff_time);
    let buffer = match build_workbook(&EXPORT_HEADERS, &rows) {
        Ok(buffer) => buffer,
        Err(e) => {
            error!(error = %e, "Failed to build workbook");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    Ok(HttpResponse::Ok()
        .content_type(XLSX_CONTENT_TYPE)
        .insert_header((
            "Content-Disposition",
            format!(
                "attachment; filename=\"attendance-{}-to-{}.xlsx\"",
                range.start, range.end
            ),
        ))
        .body(buffer))
}

/// Per-user monthly export, rows in capture order.
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/export",
    params(
        ("id", Path, description = "User ID"),
        ("month", Query, description = "Month, YYYY-MM; defaults to the current month")
    ),
    responses(
        (status = 200, description = "Workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid month format"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn export_user_month(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    let month = query.month.clone().unwrap_or_else(current_month_key);
    if !is_valid_month_key(&month) {
        return Ok(HttpResponse::BadRequest().json(json!({"error": "Invalid month format"})));
    }

    let user = match fetch_roster_user(pool.get_ref(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(json!({"error": "User not found"})));
        }
        Err(e) => {
            error!(error = %e, user_id, "Failed to fetch user");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let (records, cutoff_time) = match futures::try_join!(
        fetch_user_month(pool.get_ref(), user_id, &month),
        get_cutoff_time(pool.get_ref()),
    ) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, user_id, month = %month, "Failed to load monthly export data");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let rows = user_month_rows(&records, &cutoff_time);
    let buffer = match build_workbook(&EXPORT_HEADERS, &rows) {
        Ok(buffer) => buffer,
        Err(e) => {
            error!(error = %e, "Failed to build workbook");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    Ok(HttpResponse::Ok()
        .content_type(XLSX_CONTENT_TYPE)
        .insert_header((
            "Content-Disposition",
            format!(
                "attachment; filename=\"attendance-{}-{}.xlsx\"",
                to_safe_filename(&user.name),
                month
            ),
        ))
        .body(buffer))
}

/// Collapse a display name into something safe for a filename.
fn to_safe_filename(value: &str) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for ch in value.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(40);
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "user".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flag_comment() {
        assert_eq!(
            normalize_flag_comment(Some("  late arrival  ")),
            Some("late arrival".to_string())
        );
        // empty and whitespace-only both clear the flag
        assert_eq!(normalize_flag_comment(Some("")), None);
        assert_eq!(normalize_flag_comment(Some("   ")), None);
        assert_eq!(normalize_flag_comment(None), None);
    }

    #[test]
    fn test_to_safe_filename() {
        assert_eq!(to_safe_filename("Jane Doe"), "jane-doe");
        assert_eq!(to_safe_filename("  !!  "), "user");
        assert_eq!(to_safe_filename("Ада Лавлейс"), "user");
        let long = "a".repeat(60);
        assert_eq!(to_safe_filename(&long).len(), 40);
    }
}
